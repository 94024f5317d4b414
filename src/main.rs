use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use gomoku_relay::config::Config;
use gomoku_relay::http::routes::{self, AppState};
use gomoku_relay::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = Config::from_env().context("reading configuration")?;
    let state = AppState::new();
    let sweeper = state
        .hub
        .spawn_sweeper(config.sweep_interval, config.session_idle_ttl);

    let app = routes::app(state.clone());
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    info!(addr = %config.addr, idle_ttl = ?config.session_idle_ttl, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    state.hub.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
