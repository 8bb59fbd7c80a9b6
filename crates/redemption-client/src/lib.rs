//! redemption-client: HTTP client for the redemption backend
//!
//! Submits cash-out requests after an on-chain burn. Two processing tiers
//! exist, selected by principal size: self-service submissions settle
//! near-instantly and return a customer reference number; treasury-assisted
//! submissions are queued and settle within a 24-hour window, with no
//! reference number guaranteed in the synchronous response.
//!
//! The backend answers in one of two wire shapes (a legacy `success`
//! boolean, or a `statusCode` envelope). Both are parsed here, once, into a
//! normalized [`SubmissionResult`] so nothing downstream branches on shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aurum_core::{constants::SELF_SERVICE_MAX_RUPIAH, Address, BackendError, Rupiah, TxHash};

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Default timeout for backend calls (30 seconds)
const BACKEND_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Processing tier for a redemption, selected by principal size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedeemMode {
    /// At or below the threshold: synchronous acceptance, near-instant settlement
    SelfService,
    /// Above the threshold: queued acceptance, 24-hour settlement window
    TreasuryAssisted,
}

impl RedeemMode {
    /// Select the tier for a redemption amount
    pub fn for_amount(amount: Rupiah) -> Self {
        if amount <= SELF_SERVICE_MAX_RUPIAH {
            Self::SelfService
        } else {
            Self::TreasuryAssisted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfService => "self-service",
            Self::TreasuryAssisted => "treasury-assisted",
        }
    }
}

/// A cash-out request, constructed just before submission.
///
/// In self-service mode the request may only be constructed from a burn
/// transaction that has reached confirmed status; [`RedeemRequest::after_burn`]
/// takes the hash by value to make an absent hash unrepresentable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub amount: Rupiah,
    pub bank_code: String,
    pub bank_name: String,
    pub bank_account_number: String,
    pub bank_account_name: String,
    pub wallet_address: Address,
    pub tx_hash: TxHash,
}

impl RedeemRequest {
    /// Build a request from a confirmed burn transaction
    #[allow(clippy::too_many_arguments)]
    pub fn after_burn(
        amount: Rupiah,
        bank_code: impl Into<String>,
        bank_name: impl Into<String>,
        bank_account_number: impl Into<String>,
        bank_account_name: impl Into<String>,
        wallet_address: Address,
        burn_tx: TxHash,
    ) -> Self {
        Self {
            amount,
            bank_code: bank_code.into(),
            bank_name: bank_name.into(),
            bank_account_number: bank_account_number.into(),
            bank_account_name: bank_account_name.into(),
            wallet_address,
            tx_hash: burn_tx,
        }
    }

    pub fn mode(&self) -> RedeemMode {
        RedeemMode::for_amount(self.amount)
    }
}

/// Normalized outcome of a backend submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub ok: bool,
    /// Customer reference number; absent for queued treasury submissions
    pub reference: Option<String>,
    /// Server message, if any
    pub message: Option<String>,
}

/// Wire shapes the backend is known to answer with.
///
/// `Legacy` is the original `{success, data}` envelope; `StatusCode` is the
/// newer `{statusCode, message}` one. Kept as an untagged union so either
/// deserializes from the same endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Legacy {
        success: bool,
        #[serde(default)]
        data: Option<LegacyData>,
        #[serde(default)]
        message: Option<String>,
    },
    StatusCode {
        #[serde(rename = "statusCode")]
        status_code: u16,
        #[serde(default)]
        message: Option<String>,
        #[serde(rename = "custRefNumber", default)]
        cust_ref_number: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyData {
    #[serde(rename = "custRefNumber", default)]
    cust_ref_number: Option<String>,
}

impl WireResponse {
    /// Collapse either wire shape into the normalized result.
    ///
    /// Legacy success and `statusCode` 201 (or 202, the queued variant) are
    /// equivalent acceptance signals.
    fn normalize(self) -> SubmissionResult {
        match self {
            Self::Legacy {
                success,
                data,
                message,
            } => SubmissionResult {
                ok: success,
                reference: data.and_then(|d| d.cust_ref_number),
                message,
            },
            Self::StatusCode {
                status_code,
                message,
                cust_ref_number,
            } => SubmissionResult {
                ok: status_code == 201 || status_code == 202,
                reference: cust_ref_number,
                message,
            },
        }
    }
}

/// The redemption backend collaborator
#[async_trait]
pub trait RedemptionBackend: Send + Sync {
    /// Submit a cash-out request on the tier selected by its amount
    async fn submit(&self, request: &RedeemRequest) -> Result<SubmissionResult>;
}

/// HTTP client for the redemption service
#[derive(Clone)]
pub struct RedemptionClient {
    http: reqwest::Client,
    base_url: String,
}

impl RedemptionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, mode: RedeemMode) -> String {
        let path = match mode {
            RedeemMode::SelfService => "/redemptions/self-service",
            RedeemMode::TreasuryAssisted => "/redemptions/treasury",
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl RedemptionBackend for RedemptionClient {
    async fn submit(&self, request: &RedeemRequest) -> Result<SubmissionResult> {
        let mode = request.mode();
        tracing::info!(
            amount = request.amount,
            mode = mode.as_str(),
            tx_hash = %request.tx_hash,
            "submitting redemption"
        );

        let response = self
            .http
            .post(self.endpoint(mode))
            .timeout(BACKEND_REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    BackendError::Unreachable {
                        url: self.base_url.clone(),
                    }
                } else {
                    BackendError::Rejected {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        let wire: WireResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                BackendError::ParseError(format!("unrecognized response shape: {}", e))
            } else {
                BackendError::Rejected {
                    message: format!("{}: {}", status, body),
                }
            }
        })?;

        let result = wire.normalize();
        if result.ok {
            Ok(result)
        } else {
            Err(BackendError::Rejected {
                message: result
                    .message
                    .unwrap_or_else(|| "redemption was not accepted".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn request(amount: Rupiah) -> RedeemRequest {
        RedeemRequest::after_burn(
            amount,
            "014",
            "BCA",
            "1234567890",
            "Siti Rahayu",
            Address::new("0x2aE4e9CBce0a2ea8371c2f0c1d16b552a4262a91"),
            TxHash::new("0xabc"),
        )
    }

    #[test]
    fn test_mode_selection_by_threshold() {
        assert_eq!(RedeemMode::for_amount(10_000_000), RedeemMode::SelfService);
        assert_eq!(
            RedeemMode::for_amount(SELF_SERVICE_MAX_RUPIAH),
            RedeemMode::SelfService
        );
        assert_eq!(
            RedeemMode::for_amount(SELF_SERVICE_MAX_RUPIAH + 1),
            RedeemMode::TreasuryAssisted
        );
        assert_eq!(
            RedeemMode::for_amount(300_000_000),
            RedeemMode::TreasuryAssisted
        );
    }

    #[test]
    fn test_legacy_shape_normalizes_with_reference() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"success": true, "data": {"custRefNumber": "CRN-881"}}"#,
        )
        .unwrap();
        let result = wire.normalize();
        assert!(result.ok);
        assert_eq!(result.reference.as_deref(), Some("CRN-881"));
    }

    #[test]
    fn test_status_code_shape_without_reference_is_success() {
        let wire: WireResponse =
            serde_json::from_str(r#"{"statusCode": 201, "message": "queued"}"#).unwrap();
        let result = wire.normalize();
        assert!(result.ok);
        assert!(result.reference.is_none());
        assert_eq!(result.message.as_deref(), Some("queued"));
    }

    #[test]
    fn test_legacy_failure_normalizes_to_not_ok() {
        let wire: WireResponse =
            serde_json::from_str(r#"{"success": false, "message": "account blocked"}"#).unwrap();
        let result = wire.normalize();
        assert!(!result.ok);
        assert_eq!(result.message.as_deref(), Some("account blocked"));
    }

    #[tokio::test]
    async fn test_self_service_submission_hits_self_service_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/redemptions/self-service")
                .json_body_partial(r#"{"bankAccountNumber": "1234567890"}"#);
            then.status(200).json_body(serde_json::json!({
                "success": true,
                "data": { "custRefNumber": "CRN-1" }
            }));
        });

        let client = RedemptionClient::new(server.base_url());
        let result = client.submit(&request(10_000_000)).await.unwrap();

        mock.assert();
        assert!(result.ok);
        assert_eq!(result.reference.as_deref(), Some("CRN-1"));
    }

    #[tokio::test]
    async fn test_treasury_submission_routes_above_threshold() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/redemptions/treasury");
            then.status(201)
                .json_body(serde_json::json!({ "statusCode": 201 }));
        });

        let client = RedemptionClient::new(server.base_url());
        let result = client.submit(&request(300_000_000)).await.unwrap();

        mock.assert();
        assert!(result.ok);
        assert!(result.reference.is_none());
    }

    #[tokio::test]
    async fn test_server_rejection_surfaces_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(serde_json::json!({
                "success": false,
                "message": "bank account not found"
            }));
        });

        let client = RedemptionClient::new(server.base_url());
        let err = client.submit(&request(10_000_000)).await.unwrap_err();
        match err {
            BackendError::Rejected { message } => {
                assert_eq!(message, "bank account not found")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).body("<html>gateway timeout</html>");
        });

        let client = RedemptionClient::new(server.base_url());
        let err = client.submit(&request(10_000_000)).await.unwrap_err();
        assert!(matches!(err, BackendError::ParseError(_)));
    }
}
