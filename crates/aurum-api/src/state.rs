//! Application state shared across API handlers

use std::collections::HashMap;
use std::sync::Arc;

use aurum_core::{Address, AppConfig, ChainConfig};
use chain_client::{HttpChainClient, WalletSession};
use goldloan::constants::get_contracts;
use goldloan::{Debouncer, DelayedTask, FlowEvent, LoanFlow};
use kyc::KycStore;
use redemption_client::RedemptionClient;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};

/// Errors that can occur in the API layer
#[derive(Debug, Error)]
pub enum ApiStateError {
    /// Invalid wallet address format
    #[error("Invalid wallet address: {reason}")]
    InvalidAddress { reason: String },

    /// No wallet connected to this session
    #[error("Wallet not connected")]
    NotConnected,

    /// Unknown flow session id
    #[error("Flow session not found: {id}")]
    SessionNotFound { id: String },

    /// KYC store could not be opened
    #[error("KYC store error: {0}")]
    KycStore(String),
}

/// How many flow events are buffered per session for the events endpoint
const EVENT_BUFFER_CAP: usize = 256;

/// A live loan flow plus its presentation-side plumbing
#[derive(Clone)]
pub struct FlowHandle {
    pub flow: Arc<Mutex<LoanFlow<HttpChainClient, RedemptionClient>>>,
    /// Debounce window for preview-quote refreshes
    pub quote_debounce: Arc<std::sync::Mutex<Debouncer>>,
    /// Success-screen auto-dismiss countdown, cancellable by explicit close
    pub dismiss: Arc<std::sync::Mutex<Option<DelayedTask>>>,
    /// Recent flow events, drained from the flow's channel
    pub events: Arc<std::sync::Mutex<Vec<FlowEvent>>>,
}

/// Validate an account address: "0x" followed by 40 hex digits.
fn validate_account_address(address: &str) -> Result<(), ApiStateError> {
    if !address.starts_with("0x") {
        return Err(ApiStateError::InvalidAddress {
            reason: "Address must start with 0x".to_string(),
        });
    }
    if address.len() != 42 {
        return Err(ApiStateError::InvalidAddress {
            reason: format!("Address must be 42 characters, got {}", address.len()),
        });
    }
    if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiStateError::InvalidAddress {
            reason: "Address must be hexadecimal".to_string(),
        });
    }
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RwLock<AppConfig>,
    chain_client: RwLock<Option<HttpChainClient>>,
    kyc_store: RwLock<Option<Arc<KycStore>>>,
    wallet: RwLock<WalletSession>,
    flows: RwLock<HashMap<String, FlowHandle>>,
}

impl AppState {
    /// Create a new application state with default config
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create with a specific config
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config: RwLock::new(config),
                chain_client: RwLock::new(None),
                kyc_store: RwLock::new(None),
                wallet: RwLock::new(WalletSession::disconnected()),
                flows: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get current config
    pub async fn config(&self) -> AppConfig {
        self.inner.config.read().await.clone()
    }

    /// Update chain gateway configuration; drops the cached client
    pub async fn set_chain_config(&self, chain_config: ChainConfig) {
        let mut config = self.inner.config.write().await;
        config.chain = chain_config;

        let mut client = self.inner.chain_client.write().await;
        *client = None;
    }

    /// Get or create the chain client
    pub async fn chain_client(&self) -> HttpChainClient {
        {
            let client = self.inner.chain_client.read().await;
            if let Some(ref c) = *client {
                return c.clone();
            }
        }

        let config = self.inner.config.read().await;
        tracing::info!("Creating chain client for URL: {}", config.chain.url);
        let client = HttpChainClient::new(config.chain.clone());
        let mut cached = self.inner.chain_client.write().await;
        *cached = Some(client.clone());
        client
    }

    /// Get or open the KYC store
    pub async fn kyc_store(&self) -> Result<Arc<KycStore>, ApiStateError> {
        {
            let store = self.inner.kyc_store.read().await;
            if let Some(ref s) = *store {
                return Ok(s.clone());
            }
        }

        let mut store_lock = self.inner.kyc_store.write().await;
        // Double-check after acquiring write lock
        if let Some(ref s) = *store_lock {
            return Ok(s.clone());
        }

        let config = self.inner.config.read().await;
        let store = KycStore::open(&config.kyc_store_path)
            .map_err(|e| ApiStateError::KycStore(e.to_string()))?;

        tracing::info!(path = %config.kyc_store_path, "KYC store opened");
        let store = Arc::new(store);
        *store_lock = Some(store.clone());
        Ok(store)
    }

    /// Get current wallet session
    pub async fn wallet(&self) -> WalletSession {
        self.inner.wallet.read().await.clone()
    }

    /// Connect a wallet, with address format validation
    pub async fn connect_wallet(&self, address: String) -> Result<(), ApiStateError> {
        validate_account_address(&address)?;
        let mut wallet = self.inner.wallet.write().await;
        *wallet = WalletSession::connected(Address::new(address));
        Ok(())
    }

    /// Disconnect the wallet
    pub async fn disconnect_wallet(&self) {
        let mut wallet = self.inner.wallet.write().await;
        *wallet = WalletSession::disconnected();
    }

    /// Start a new loan flow session for the connected wallet.
    ///
    /// The flow's event channel is drained into a bounded per-session
    /// buffer that the events endpoint serves.
    pub async fn create_flow(&self) -> Result<(String, FlowHandle), ApiStateError> {
        let wallet = self.wallet().await;
        if !wallet.is_connected() {
            return Err(ApiStateError::NotConnected);
        }

        let chain = self.chain_client().await;
        let backend = {
            let config = self.inner.config.read().await;
            RedemptionClient::new(config.backend.url.clone())
        };

        let (flow, events_rx) = LoanFlow::new(chain, backend, &wallet, get_contracts())
            .map_err(|_| ApiStateError::NotConnected)?;

        let handle = FlowHandle {
            flow: Arc::new(Mutex::new(flow)),
            quote_debounce: Arc::new(std::sync::Mutex::new(Debouncer::new())),
            dismiss: Arc::new(std::sync::Mutex::new(None)),
            events: Arc::new(std::sync::Mutex::new(Vec::new())),
        };
        spawn_event_collector(events_rx, handle.events.clone());

        let id = uuid::Uuid::new_v4().to_string();
        let mut flows = self.inner.flows.write().await;
        flows.insert(id.clone(), handle.clone());

        tracing::info!(session = %id, "loan flow session created");
        Ok((id, handle))
    }

    /// Look up a flow session
    pub async fn flow(&self, id: &str) -> Result<FlowHandle, ApiStateError> {
        let flows = self.inner.flows.read().await;
        flows
            .get(id)
            .cloned()
            .ok_or_else(|| ApiStateError::SessionNotFound { id: id.to_string() })
    }

    /// Close and discard a flow session. Cancels the auto-dismiss
    /// countdown if one is running.
    pub async fn close_session(&self, id: &str) -> Result<(), ApiStateError> {
        let handle = {
            let mut flows = self.inner.flows.write().await;
            flows
                .remove(id)
                .ok_or_else(|| ApiStateError::SessionNotFound { id: id.to_string() })?
        };

        if let Ok(mut dismiss) = handle.dismiss.lock() {
            if let Some(task) = dismiss.take() {
                task.cancel();
            }
        }
        if let Ok(mut debounce) = handle.quote_debounce.lock() {
            debounce.cancel();
        }

        handle.flow.lock().await.close();
        tracing::info!(session = %id, "loan flow session closed");
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_event_collector(
    mut rx: mpsc::UnboundedReceiver<FlowEvent>,
    buffer: Arc<std::sync::Mutex<Vec<FlowEvent>>>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(mut events) = buffer.lock() {
                if events.len() >= EVENT_BUFFER_CAP {
                    events.remove(0);
                }
                events.push(event);
            }
        }
    });
}
