//! Error types for Aurum

use thiserror::Error;

/// Core errors that can occur in Aurum
#[derive(Debug, Error)]
pub enum Error {
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Chain gateway connection and query errors
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Gateway unreachable at {url}")]
    Unreachable { url: String },

    #[error("Gateway returned error: {message}")]
    ApiError { message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Transaction not found: {tx_hash}")]
    TxNotFound { tx_hash: String },

    #[error("Transaction rejected: {reason}")]
    TxRejected { reason: String },
}

/// Loan/redemption flow errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Action not allowed in state {state}: {action}")]
    ActionNotAllowed { state: String, action: String },

    #[error("An operation is already in flight")]
    Busy,

    #[error("Insufficient allowance: need {required}, have {available}")]
    InsufficientAllowance { required: u64, available: u64 },

    #[error("Insufficient collateral: need {required}, have {available}")]
    InsufficientCollateral { required: u64, available: u64 },

    #[error("Invalid bank details: {message}")]
    InvalidBankDetails { message: String },

    #[error("Transaction failed: {message}")]
    TxFailed { message: String },

    #[error("Redeem failed: {message}")]
    SubmissionFailed { message: String },
}

/// Redemption backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend unreachable at {url}")]
    Unreachable { url: String },

    #[error("Redeem failed: {message}")]
    Rejected { message: String },

    #[error("Failed to parse backend response: {0}")]
    ParseError(String),
}

/// Result type alias for Aurum operations
pub type Result<T> = std::result::Result<T, Error>;

impl FlowError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "wallet_not_connected",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::ActionNotAllowed { .. } => "action_not_allowed",
            Self::Busy => "operation_in_flight",
            Self::InsufficientAllowance { .. } => "insufficient_allowance",
            Self::InsufficientCollateral { .. } => "insufficient_collateral",
            Self::InvalidBankDetails { .. } => "invalid_bank_details",
            Self::TxFailed { .. } => "tx_failed",
            Self::SubmissionFailed { .. } => "redeem_failed",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotConnected => 401,
            Self::InvalidAmount { .. } | Self::InvalidBankDetails { .. } => 400,
            Self::ActionNotAllowed { .. } | Self::Busy => 409,
            Self::InsufficientAllowance { .. } | Self::InsufficientCollateral { .. } => 422,
            Self::TxFailed { .. } | Self::SubmissionFailed { .. } => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_codes() {
        let err = FlowError::InvalidAmount {
            message: "test".into(),
        };
        assert_eq!(err.error_code(), "invalid_amount");
        assert_eq!(err.status_code(), 400);

        let err = FlowError::InsufficientAllowance {
            required: 100,
            available: 50,
        };
        assert_eq!(err.error_code(), "insufficient_allowance");
        assert_eq!(err.status_code(), 422);

        assert_eq!(FlowError::Busy.status_code(), 409);
    }
}
