//! Aurum API server entry point

use anyhow::Context;

use aurum_api::AppState;
use aurum_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aurum=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    tracing::info!("Starting Aurum server");

    let config = load_config()?;
    let port = config.api_port;
    let state = AppState::with_config(config);

    aurum_api::start_server(state, port)
        .await
        .context("API server exited")?;

    Ok(())
}

/// Load config from the file named by AURUM_CONFIG, falling back to
/// defaults when unset. Individual env overrides take precedence.
fn load_config() -> anyhow::Result<AppConfig> {
    let mut config = match std::env::var("AURUM_CONFIG") {
        Ok(path) => {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path))?;
            serde_json::from_str(&data).with_context(|| format!("parsing config file {}", path))?
        }
        Err(_) => AppConfig::default(),
    };

    if let Ok(url) = std::env::var("AURUM_CHAIN_URL") {
        config.chain.url = url;
    }
    if let Ok(key) = std::env::var("AURUM_CHAIN_API_KEY") {
        config.chain.api_key = key;
    }
    if let Ok(url) = std::env::var("AURUM_BACKEND_URL") {
        config.backend.url = url;
    }
    if let Ok(port) = std::env::var("AURUM_API_PORT") {
        config.api_port = port.parse().context("AURUM_API_PORT must be a port")?;
    }
    if let Ok(path) = std::env::var("AURUM_KYC_STORE") {
        config.kyc_store_path = path;
    }

    Ok(config)
}
