//! KYC routes
//!
//! - POST /kyc/submissions - record a wizard submission
//! - GET /kyc/submissions - list all (admin)
//! - GET /kyc/submissions/:id - fetch one
//! - POST /kyc/submissions/:id/review - admin approve/reject

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use kyc::store::NewSubmission;
use kyc::{KycError, KycSubmission};

use crate::dto::{ApiError, KycListResponse, KycReviewRequest, KycSubmitRequest};
use crate::routes::loan::state_error_to_api;
use crate::AppState;

/// Create KYC router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submissions", post(submit).get(list))
        .route("/submissions/:id", get(get_submission))
        .route("/submissions/:id/review", post(review))
}

fn kyc_error_to_api(error: KycError) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match &error {
        KycError::Invalid { .. } => (StatusCode::BAD_REQUEST, "invalid_submission"),
        KycError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        KycError::AlreadyReviewed { .. } => (StatusCode::CONFLICT, "already_reviewed"),
        KycError::Io(_) | KycError::Serialization(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "store_error")
        }
    };
    (status, Json(ApiError::new(code, error.to_string())))
}

/// POST /kyc/submissions
async fn submit(
    State(state): State<AppState>,
    Json(request): Json<KycSubmitRequest>,
) -> Result<Json<KycSubmission>, (StatusCode, Json<ApiError>)> {
    let store = state.kyc_store().await.map_err(state_error_to_api)?;

    let submission = store
        .submit(NewSubmission {
            identity: request.identity(),
            id_card_image: request.id_card_image.clone(),
            selfie_image: request.selfie_image.clone(),
            biometric: request.biometric(),
        })
        .map_err(kyc_error_to_api)?;

    Ok(Json(submission))
}

/// GET /kyc/submissions
async fn list(
    State(state): State<AppState>,
) -> Result<Json<KycListResponse>, (StatusCode, Json<ApiError>)> {
    let store = state.kyc_store().await.map_err(state_error_to_api)?;
    let submissions = store.list().map_err(kyc_error_to_api)?;
    let count = submissions.len();
    Ok(Json(KycListResponse { submissions, count }))
}

/// GET /kyc/submissions/:id
async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<KycSubmission>, (StatusCode, Json<ApiError>)> {
    let store = state.kyc_store().await.map_err(state_error_to_api)?;
    let submission = store.get(&id).map_err(kyc_error_to_api)?;
    Ok(Json(submission))
}

/// POST /kyc/submissions/:id/review
async fn review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<KycReviewRequest>,
) -> Result<Json<KycSubmission>, (StatusCode, Json<ApiError>)> {
    let store = state.kyc_store().await.map_err(state_error_to_api)?;
    let submission = store
        .review(&id, request.decision, &request.reviewer, request.reason)
        .map_err(kyc_error_to_api)?;
    Ok(Json(submission))
}
