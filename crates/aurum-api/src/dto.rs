//! Data Transfer Objects for API requests and responses

use serde::{Deserialize, Serialize};

use goldloan::{FlowSnapshot, LoanCalculation, RepayBreakdown};
use kyc::{BiometricScores, Identity, KycSubmission, ReviewDecision};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}

// =============================================================================
// Wallet DTOs
// =============================================================================

/// Wallet connect request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConnectRequest {
    pub address: String,
}

/// Wallet status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStatusResponse {
    /// True if a wallet is connected to this session
    pub connected: bool,
    /// The connected wallet's address. Only populated when connected.
    pub address: Option<String>,
}

// =============================================================================
// Loan Flow DTOs
// =============================================================================

/// Pure quote evaluation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Requested principal in rupiah
    pub amount: u64,
    /// LTV percent; clamped into the supported range before computing
    pub ltv_percent: u8,
    /// Oracle price, rupiah per gold base unit
    pub spot_price: u64,
    /// The user's gold balance in base units
    pub available_collateral: u64,
}

/// Quote response wraps the live calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub calculation: LoanCalculation,
    pub ltv_percent: u8,
}

/// Repayment estimate request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayEstimateRequest {
    pub principal: u64,
}

/// Repayment estimate response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayEstimateResponse {
    pub principal: u64,
    pub admin_fee: u64,
    pub total_due: u64,
}

impl From<RepayBreakdown> for RepayEstimateResponse {
    fn from(b: RepayBreakdown) -> Self {
        Self {
            principal: b.principal,
            admin_fee: b.admin_fee,
            total_due: b.total_due,
        }
    }
}

/// A bank directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDto {
    pub code: String,
    pub name: String,
}

/// Bank directory plus form bounds for the amount-entry page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanFormConfigResponse {
    pub banks: Vec<BankDto>,
    pub ltv_presets: Vec<u8>,
    pub ltv_min: u8,
    pub ltv_max: u8,
    pub min_loan: u64,
    pub self_service_max: u64,
}

/// Created flow session
#[derive(Debug, Clone, Serialize)]
pub struct FlowSessionResponse {
    pub session_id: String,
    pub snapshot: FlowSnapshot,
}

/// Set-amount request (raw form input, as typed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAmountRequest {
    pub amount: String,
}

/// Set-LTV request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLtvRequest {
    pub percent: u8,
}

/// Bank details request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetailsRequest {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

/// Outcome of an action plus the refreshed snapshot
#[derive(Debug, Clone, Serialize)]
pub struct FlowActionResponse {
    /// "ready" | "approval_required" | "allowance_stale" | "confirmed" | "ok"
    pub outcome: String,
    pub snapshot: FlowSnapshot,
}

/// Submission result
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub reference: Option<String>,
    pub snapshot: FlowSnapshot,
}

// =============================================================================
// KYC DTOs
// =============================================================================

/// New KYC submission request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycSubmitRequest {
    pub nik: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub street_address: String,
    pub id_card_image: String,
    pub selfie_image: String,
    pub face_match: f64,
    pub liveness: f64,
}

impl KycSubmitRequest {
    pub fn identity(&self) -> Identity {
        Identity {
            nik: self.nik.clone(),
            full_name: self.full_name.clone(),
            date_of_birth: self.date_of_birth.clone(),
            street_address: self.street_address.clone(),
        }
    }

    pub fn biometric(&self) -> BiometricScores {
        BiometricScores {
            face_match: self.face_match,
            liveness: self.liveness,
        }
    }
}

/// Admin review request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycReviewRequest {
    pub decision: ReviewDecision,
    pub reviewer: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// KYC submission list response
#[derive(Debug, Clone, Serialize)]
pub struct KycListResponse {
    pub submissions: Vec<KycSubmission>,
    pub count: usize,
}
