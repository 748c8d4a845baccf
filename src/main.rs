use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chat_relay::config::Config;
use chat_relay::routes;
use chat_relay::services::generator::GeminiClient;
use chat_relay::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    // Fail before binding if the provider credential is missing.
    let config = Config::from_env().context("invalid configuration")?;
    info!(?config, "configuration loaded");

    let generator = GeminiClient::from_config(&config).context("failed to build model client")?;
    let model = generator.model().to_string();
    let state = Arc::new(AppState::new(Arc::new(generator)).with_relay_api_key(config.relay_api_key.clone()));

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, model = %model, "chat relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
