//! Loan flow routes
//!
//! Pure quote evaluation plus the per-session flow actions:
//! - POST /loan/quote - evaluate the calculator for preview rendering
//! - POST /loan/repay/estimate - outstanding-debt estimate
//! - GET /loan/form-config - bank directory and form bounds
//! - POST /loan/sessions - start a flow for the connected wallet
//! - GET /loan/sessions/:id - current snapshot
//! - GET /loan/sessions/:id/events - buffered flow events
//! - POST /loan/sessions/:id/amount | /ltv | /approve | /borrow |
//!   /continue | /bank-details | /submit | /retry | /close

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use aurum_core::FlowError;
use goldloan::constants::{self, bank_account, fees, ltv, timing};
use goldloan::{
    compute_loan, repay_estimate, ApproveOutcome, BankDetails, BorrowOutcome, DelayedTask,
    FlowEvent,
};

use crate::dto::{
    ApiError, BankDetailsRequest, BankDto, FlowActionResponse, FlowSessionResponse,
    LoanFormConfigResponse, QuoteRequest, QuoteResponse, RepayEstimateRequest,
    RepayEstimateResponse, SetAmountRequest, SetLtvRequest, SubmitResponse,
};
use crate::state::{ApiStateError, FlowHandle};
use crate::AppState;

/// Create loan router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quote", post(quote))
        .route("/repay/estimate", post(repay))
        .route("/form-config", get(form_config))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/events", get(get_events))
        .route("/sessions/:id/amount", post(set_amount))
        .route("/sessions/:id/ltv", post(set_ltv))
        .route("/sessions/:id/approve", post(approve))
        .route("/sessions/:id/borrow", post(borrow))
        .route("/sessions/:id/continue", post(continue_to_bank_details))
        .route("/sessions/:id/bank-details", post(set_bank_details))
        .route("/sessions/:id/submit", post(submit))
        .route("/sessions/:id/retry", post(retry))
        .route("/sessions/:id/close", post(close))
}

// =============================================================================
// Error mapping
// =============================================================================

fn flow_error_to_api(error: FlowError) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiError::new(error.error_code(), error.to_string())),
    )
}

pub(crate) fn state_error_to_api(error: ApiStateError) -> (StatusCode, Json<ApiError>) {
    match error {
        ApiStateError::SessionNotFound { .. } => {
            (StatusCode::NOT_FOUND, Json(ApiError::not_found(error.to_string())))
        }
        ApiStateError::NotConnected => (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("wallet_not_connected", error.to_string())),
        ),
        ApiStateError::InvalidAddress { .. } => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(error.to_string())),
        ),
        ApiStateError::KycStore(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(error.to_string())),
        ),
    }
}

// =============================================================================
// Pure evaluation endpoints
// =============================================================================

/// POST /loan/quote - evaluate the calculator, no session required
async fn quote(Json(request): Json<QuoteRequest>) -> Json<QuoteResponse> {
    let clamped = ltv::clamp(request.ltv_percent);
    let calculation = compute_loan(
        request.amount,
        clamped,
        request.spot_price,
        fees::LOAN_FEE_BPS,
        request.available_collateral,
    );
    Json(QuoteResponse {
        calculation,
        ltv_percent: clamped,
    })
}

/// POST /loan/repay/estimate
async fn repay(Json(request): Json<RepayEstimateRequest>) -> Json<RepayEstimateResponse> {
    Json(repay_estimate(request.principal).into())
}

/// GET /loan/form-config
async fn form_config() -> Json<LoanFormConfigResponse> {
    Json(LoanFormConfigResponse {
        banks: constants::BANKS
            .iter()
            .map(|b| BankDto {
                code: b.code.to_string(),
                name: b.name.to_string(),
            })
            .collect(),
        ltv_presets: ltv::PRESETS.to_vec(),
        ltv_min: ltv::MIN_PERCENT,
        ltv_max: ltv::MAX_PERCENT,
        min_loan: fees::MIN_LOAN,
        self_service_max: aurum_core::constants::SELF_SERVICE_MAX_RUPIAH,
    })
}

// =============================================================================
// Session lifecycle
// =============================================================================

/// POST /loan/sessions - start a flow for the connected wallet
async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<FlowSessionResponse>, (StatusCode, Json<ApiError>)> {
    let (session_id, handle) = state.create_flow().await.map_err(state_error_to_api)?;

    // Prime price, balance, and allowance; a cold gateway is not fatal here
    let snapshot = {
        let mut flow = handle.flow.lock().await;
        if let Err(e) = flow.refresh_market().await {
            tracing::warn!(session = %session_id, "initial market refresh failed: {}", e);
        }
        flow.snapshot()
    };

    Ok(Json(FlowSessionResponse {
        session_id,
        snapshot,
    }))
}

/// GET /loan/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowSessionResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;
    let snapshot = handle.flow.lock().await.snapshot();
    Ok(Json(FlowSessionResponse {
        session_id: id,
        snapshot,
    }))
}

/// GET /loan/sessions/:id/events - buffered flow events, oldest first
async fn get_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<FlowEvent>>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;
    let events = handle
        .events
        .lock()
        .map(|e| e.clone())
        .unwrap_or_default();
    Ok(Json(events))
}

// =============================================================================
// Step 1 actions
// =============================================================================

/// POST /loan/sessions/:id/amount
///
/// Stores the raw input and schedules a debounced market refresh so the
/// preview quote follows the keystrokes without hammering the gateway.
async fn set_amount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetAmountRequest>,
) -> Result<Json<FlowActionResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;

    let snapshot = {
        let mut flow = handle.flow.lock().await;
        flow.set_loan_input(&request.amount)
            .map_err(flow_error_to_api)?;
        flow.snapshot()
    };

    schedule_quote_refresh(&handle);
    Ok(Json(FlowActionResponse {
        outcome: "ok".to_string(),
        snapshot,
    }))
}

/// POST /loan/sessions/:id/ltv
async fn set_ltv(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetLtvRequest>,
) -> Result<Json<FlowActionResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;

    let snapshot = {
        let mut flow = handle.flow.lock().await;
        flow.set_ltv(request.percent).map_err(flow_error_to_api)?;
        flow.snapshot()
    };

    schedule_quote_refresh(&handle);
    Ok(Json(FlowActionResponse {
        outcome: "ok".to_string(),
        snapshot,
    }))
}

/// POST /loan/sessions/:id/approve
async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowActionResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;
    let mut flow = handle.flow.lock().await;

    let outcome = flow.approve().await.map_err(flow_error_to_api)?;
    Ok(Json(FlowActionResponse {
        outcome: match outcome {
            ApproveOutcome::Ready => "ready".to_string(),
            ApproveOutcome::AllowanceStale => "allowance_stale".to_string(),
        },
        snapshot: flow.snapshot(),
    }))
}

/// POST /loan/sessions/:id/borrow
async fn borrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowActionResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;
    let mut flow = handle.flow.lock().await;

    let outcome = flow.borrow().await.map_err(flow_error_to_api)?;
    Ok(Json(FlowActionResponse {
        outcome: match outcome {
            BorrowOutcome::ApprovalRequired => "approval_required".to_string(),
            BorrowOutcome::Confirmed(_) => "confirmed".to_string(),
        },
        snapshot: flow.snapshot(),
    }))
}

// =============================================================================
// Step 2 actions
// =============================================================================

/// POST /loan/sessions/:id/continue
async fn continue_to_bank_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowActionResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;
    let mut flow = handle.flow.lock().await;

    flow.continue_to_bank_details().map_err(flow_error_to_api)?;
    Ok(Json(FlowActionResponse {
        outcome: "ok".to_string(),
        snapshot: flow.snapshot(),
    }))
}

/// POST /loan/sessions/:id/bank-details
async fn set_bank_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BankDetailsRequest>,
) -> Result<Json<FlowActionResponse>, (StatusCode, Json<ApiError>)> {
    if request.account_number.len() > bank_account::MAX_DIGITS * 4 {
        // Cap pathological input before it reaches the form state
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request("Account number too long")),
        ));
    }

    let handle = state.flow(&id).await.map_err(state_error_to_api)?;
    let mut flow = handle.flow.lock().await;

    flow.set_bank_details(BankDetails {
        bank_code: request.bank_code,
        account_number: request.account_number,
        account_name: request.account_name,
    })
    .map_err(flow_error_to_api)?;

    Ok(Json(FlowActionResponse {
        outcome: "ok".to_string(),
        snapshot: flow.snapshot(),
    }))
}

/// POST /loan/sessions/:id/submit
///
/// On success, schedules the auto-dismiss countdown that closes the
/// session after the success screen's three seconds.
async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmitResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;

    let (reference, snapshot) = {
        let mut flow = handle.flow.lock().await;
        let reference = flow.submit().await.map_err(flow_error_to_api)?;
        (reference, flow.snapshot())
    };

    schedule_auto_dismiss(&state, &handle, &id);
    Ok(Json(SubmitResponse {
        reference,
        snapshot,
    }))
}

/// POST /loan/sessions/:id/retry
async fn retry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowActionResponse>, (StatusCode, Json<ApiError>)> {
    let handle = state.flow(&id).await.map_err(state_error_to_api)?;
    let mut flow = handle.flow.lock().await;

    flow.retry().map_err(flow_error_to_api)?;
    Ok(Json(FlowActionResponse {
        outcome: "ok".to_string(),
        snapshot: flow.snapshot(),
    }))
}

/// POST /loan/sessions/:id/close
///
/// Explicit close ends the session immediately, cancelling the
/// auto-dismiss countdown if it is still running.
async fn close(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    state.close_session(&id).await.map_err(state_error_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Timers
// =============================================================================

fn schedule_quote_refresh(handle: &FlowHandle) {
    let flow = handle.flow.clone();
    if let Ok(mut debounce) = handle.quote_debounce.lock() {
        debounce.schedule(timing::QUOTE_DEBOUNCE, async move {
            if let Err(e) = flow.lock().await.refresh_market().await {
                tracing::warn!("debounced market refresh failed: {}", e);
            }
        });
    }
}

fn schedule_auto_dismiss(state: &AppState, handle: &FlowHandle, id: &str) {
    let state = state.clone();
    let id = id.to_string();
    let task = DelayedTask::spawn(timing::SUCCESS_DISMISS, async move {
        tracing::debug!(session = %id, "success screen auto-dismiss");
        let _ = state.close_session(&id).await;
    });

    if let Ok(mut dismiss) = handle.dismiss.lock() {
        *dismiss = Some(task);
    }
}
