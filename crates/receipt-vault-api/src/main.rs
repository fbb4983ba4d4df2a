//! # receipt-vault-api binary
//!
//! Reads `RECEIPT_VAULT_*` configuration, wires the vault and serves it.

use anyhow::Context;
use axum::http::HeaderName;
use tracing_subscriber::EnvFilter;

use receipt_vault_api::{app, ApiConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(?config, "starting receipt vault");

    let vault = config.build_vault().context("failed to build vault")?;
    let signature_header = HeaderName::try_from(config.signature_header.as_str())
        .context("invalid signature header name")?;
    let state = AppState::new(vault).with_signature_header(signature_header);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, "receipt vault listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("receipt vault stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
