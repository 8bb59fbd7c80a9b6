//! Wallet session routes
//!
//! - POST /wallet/connect - attach a wallet address to the session
//! - GET /wallet/status - connection state
//! - POST /wallet/disconnect - clear the session wallet

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::dto::{ApiError, WalletConnectRequest, WalletStatusResponse};
use crate::state::ApiStateError;
use crate::AppState;

/// Create wallet router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/connect", post(connect))
        .route("/status", get(status))
        .route("/disconnect", post(disconnect))
}

/// POST /wallet/connect
async fn connect(
    State(state): State<AppState>,
    Json(request): Json<WalletConnectRequest>,
) -> Result<Json<WalletStatusResponse>, (StatusCode, Json<ApiError>)> {
    state
        .connect_wallet(request.address)
        .await
        .map_err(|e| match e {
            ApiStateError::InvalidAddress { reason } => (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new("invalid_address", reason)),
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal(other.to_string())),
            ),
        })?;

    Ok(Json(wallet_status(&state).await))
}

/// GET /wallet/status
async fn status(State(state): State<AppState>) -> Json<WalletStatusResponse> {
    Json(wallet_status(&state).await)
}

/// POST /wallet/disconnect
async fn disconnect(State(state): State<AppState>) -> Json<WalletStatusResponse> {
    state.disconnect_wallet().await;
    Json(wallet_status(&state).await)
}

async fn wallet_status(state: &AppState) -> WalletStatusResponse {
    let wallet = state.wallet().await;
    WalletStatusResponse {
        connected: wallet.is_connected(),
        address: wallet.address().map(|a| a.to_string()),
    }
}
