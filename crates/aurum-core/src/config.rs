//! Configuration types for Aurum

use serde::{Deserialize, Serialize};

/// Chain gateway connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Gateway URL (e.g., "http://127.0.0.1:8545")
    pub url: String,

    /// API key for authenticated endpoints (optional)
    #[serde(default)]
    pub api_key: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            api_key: String::new(),
        }
    }
}

/// Redemption backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Redemption service base URL
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8090".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chain gateway settings
    pub chain: ChainConfig,

    /// Redemption backend settings
    pub backend: BackendConfig,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Path of the KYC submission store file
    #[serde(default = "default_kyc_store_path")]
    pub kyc_store_path: String,
}

fn default_api_port() -> u16 {
    18545
}

fn default_kyc_store_path() -> String {
    "kyc-submissions.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            backend: BackendConfig::default(),
            api_port: default_api_port(),
            kyc_store_path: default_kyc_store_path(),
        }
    }
}
