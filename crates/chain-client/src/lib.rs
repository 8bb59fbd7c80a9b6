//! chain-client: Gateway client for token and vault operations
//!
//! This crate provides the on-chain collaborator surface used by the loan
//! flow: token balances and allowances, the approve / deposit-and-borrow /
//! burn write operations, and transaction status polling. Writes follow a
//! submit-then-poll shape: the gateway accepts the signed operation and
//! returns a hash, then the transaction moves through pending and
//! confirming before it is confirmed in a block.

pub mod confirm;
pub mod mock;
pub mod wallet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use aurum_core::{Address, ChainConfig, ChainError, GoldUnits, Rupiah, TokenId, TxHash};

pub use confirm::await_confirmed;
pub use mock::MockChain;
pub use wallet::WalletSession;

/// Default timeout for gateway API calls (30 seconds).
/// Long enough for slow gateways, short enough to avoid perpetual spinners.
const GATEWAY_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Result type for chain client operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Lifecycle phase of a submitted transaction.
///
/// On-chain writes have two asynchronous stages: acceptance by the network
/// (pending) and block inclusion (confirming, then confirmed). Callers must
/// surface the two stages distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxPhase {
    Pending,
    Confirming,
    Confirmed,
    Failed,
}

impl TxPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirming => "confirming",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

/// Status snapshot of a submitted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatus {
    pub phase: TxPhase,
    /// Populated when phase is Failed
    pub error: Option<String>,
}

/// On-chain collaborator: token reads, vault writes, status polling.
///
/// All write operations return the submission hash immediately; callers
/// drive confirmation through [`tx_status`](ChainGateway::tx_status) or the
/// [`await_confirmed`] helper.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Latest posted gold price in rupiah per gold base unit
    async fn gold_spot_price(&self) -> Result<Rupiah>;

    async fn balance_of(&self, token: &TokenId, owner: &Address) -> Result<u64>;

    async fn allowance(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
    ) -> Result<u64>;

    async fn approve(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
        amount: u64,
    ) -> Result<TxHash>;

    async fn deposit_and_borrow(
        &self,
        owner: &Address,
        collateral: GoldUnits,
        principal: Rupiah,
    ) -> Result<TxHash>;

    async fn burn_with_memo(
        &self,
        token: &TokenId,
        owner: &Address,
        amount: u64,
        memo: &str,
    ) -> Result<TxHash>;

    async fn tx_status(&self, hash: &TxHash) -> Result<TxStatus>;
}

/// HTTP client for a chain gateway node
#[derive(Clone)]
pub struct HttpChainClient {
    http: reqwest::Client,
    config: ChainConfig,
}

impl HttpChainClient {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Get the current gateway configuration
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Check if the gateway is reachable
    pub async fn is_online(&self) -> bool {
        self.get_json("/status").await.is_ok()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let request = self
            .http
            .get(self.url(path))
            .header("x-api-key", &self.config.api_key)
            .timeout(GATEWAY_REQUEST_TIMEOUT);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ChainError::Unreachable {
                    url: self.config.url.clone(),
                }
            } else {
                ChainError::ApiError {
                    message: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::ApiError {
                message: format!("{}: {}", status, body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ChainError::ParseError(e.to_string()))
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let request = self
            .http
            .post(self.url(path))
            .header("x-api-key", &self.config.api_key)
            .timeout(GATEWAY_REQUEST_TIMEOUT)
            .json(&body);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ChainError::Unreachable {
                    url: self.config.url.clone(),
                }
            } else {
                ChainError::ApiError {
                    message: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::TxRejected {
                reason: format!("{}: {}", status, body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ChainError::ParseError(e.to_string()))
    }

    /// Extract an amount field that the gateway may encode as string or number
    fn parse_amount(value: &serde_json::Value, field: &str) -> Result<u64> {
        match &value[field] {
            serde_json::Value::String(s) => s
                .parse()
                .map_err(|_| ChainError::ParseError(format!("invalid {}: {}", field, s))),
            serde_json::Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| ChainError::ParseError(format!("invalid {}", field))),
            _ => Err(ChainError::ParseError(format!("missing {}", field))),
        }
    }

    fn parse_tx_hash(value: &serde_json::Value) -> Result<TxHash> {
        value["txHash"]
            .as_str()
            .map(TxHash::new)
            .ok_or_else(|| ChainError::ParseError("missing txHash".to_string()))
    }
}

#[async_trait]
impl ChainGateway for HttpChainClient {
    async fn gold_spot_price(&self) -> Result<Rupiah> {
        let json = self.get_json("/oracle/gold-price").await?;
        Self::parse_amount(&json, "price")
    }

    async fn balance_of(&self, token: &TokenId, owner: &Address) -> Result<u64> {
        let json = self
            .get_json(&format!("/tokens/{}/balance/{}", token, owner))
            .await?;
        Self::parse_amount(&json, "balance")
    }

    async fn allowance(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
    ) -> Result<u64> {
        let json = self
            .get_json(&format!("/tokens/{}/allowance/{}/{}", token, owner, spender))
            .await?;
        Self::parse_amount(&json, "allowance")
    }

    async fn approve(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
        amount: u64,
    ) -> Result<TxHash> {
        tracing::debug!(%token, %owner, %spender, amount, "submitting approve");
        let json = self
            .post_json(
                &format!("/tokens/{}/approve", token),
                json!({
                    "owner": owner,
                    "spender": spender,
                    "amount": amount.to_string(),
                }),
            )
            .await?;
        Self::parse_tx_hash(&json)
    }

    async fn deposit_and_borrow(
        &self,
        owner: &Address,
        collateral: GoldUnits,
        principal: Rupiah,
    ) -> Result<TxHash> {
        tracing::debug!(%owner, collateral, principal, "submitting deposit-and-borrow");
        let json = self
            .post_json(
                "/vault/deposit-and-borrow",
                json!({
                    "owner": owner,
                    "collateral": collateral.to_string(),
                    "principal": principal.to_string(),
                }),
            )
            .await?;
        Self::parse_tx_hash(&json)
    }

    async fn burn_with_memo(
        &self,
        token: &TokenId,
        owner: &Address,
        amount: u64,
        memo: &str,
    ) -> Result<TxHash> {
        tracing::debug!(%token, %owner, amount, "submitting burn");
        let json = self
            .post_json(
                &format!("/tokens/{}/burn", token),
                json!({
                    "owner": owner,
                    "amount": amount.to_string(),
                    "memo": memo,
                }),
            )
            .await?;
        Self::parse_tx_hash(&json)
    }

    async fn tx_status(&self, hash: &TxHash) -> Result<TxStatus> {
        let json = self.get_json(&format!("/transactions/{}", hash)).await?;

        let phase = match json["status"].as_str() {
            Some("pending") => TxPhase::Pending,
            Some("confirming") => TxPhase::Confirming,
            Some("confirmed") => TxPhase::Confirmed,
            Some("failed") => TxPhase::Failed,
            Some(other) => {
                return Err(ChainError::ParseError(format!(
                    "unknown tx status: {}",
                    other
                )))
            }
            None => {
                return Err(ChainError::TxNotFound {
                    tx_hash: hash.to_string(),
                })
            }
        };

        Ok(TxStatus {
            phase,
            error: json["error"].as_str().map(|s| s.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> HttpChainClient {
        HttpChainClient::new(ChainConfig {
            url: server.base_url(),
            api_key: String::new(),
        })
    }

    fn token() -> TokenId {
        TokenId::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
    }

    fn owner() -> Address {
        Address::new("0x2aE4e9CBce0a2ea8371c2f0c1d16b552a4262a91")
    }

    #[tokio::test]
    async fn test_balance_parses_string_amount() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path(format!("/tokens/{}/balance/{}", token(), owner()));
            then.status(200).json_body(serde_json::json!({
                "balance": "1500000"
            }));
        });

        let balance = client_for(&server)
            .balance_of(&token(), &owner())
            .await
            .unwrap();
        assert_eq!(balance, 1_500_000);
    }

    #[tokio::test]
    async fn test_allowance_parses_numeric_amount() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(serde_json::json!({
                "allowance": 42u64
            }));
        });

        let allowance = client_for(&server)
            .allowance(&token(), &owner(), &owner())
            .await
            .unwrap();
        assert_eq!(allowance, 42);
    }

    #[tokio::test]
    async fn test_approve_returns_submission_hash() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path(format!("/tokens/{}/approve", token()))
                .json_body_partial(r#"{"amount": "777"}"#);
            then.status(200).json_body(serde_json::json!({
                "txHash": "0xfeed"
            }));
        });

        let hash = client_for(&server)
            .approve(&token(), &owner(), &owner(), 777)
            .await
            .unwrap();
        assert_eq!(hash.as_str(), "0xfeed");
    }

    #[tokio::test]
    async fn test_rejected_write_maps_to_tx_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(422).body("insufficient funds for gas");
        });

        let err = client_for(&server)
            .deposit_and_borrow(&owner(), 100, 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::TxRejected { .. }));
    }

    #[tokio::test]
    async fn test_tx_status_phases() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/transactions/0xabc");
            then.status(200)
                .json_body(serde_json::json!({ "status": "confirming" }));
        });

        let status = client_for(&server)
            .tx_status(&TxHash::new("0xabc"))
            .await
            .unwrap();
        assert_eq!(status.phase, TxPhase::Confirming);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn test_tx_status_failed_carries_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(serde_json::json!({
                "status": "failed",
                "error": "execution reverted"
            }));
        });

        let status = client_for(&server)
            .tx_status(&TxHash::new("0xabc"))
            .await
            .unwrap();
        assert_eq!(status.phase, TxPhase::Failed);
        assert_eq!(status.error.as_deref(), Some("execution reverted"));
    }
}
