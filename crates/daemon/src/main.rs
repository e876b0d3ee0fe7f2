#![forbid(unsafe_code)]

//! Collaboration daemon: serves the browser API and relays job progress.

use anyhow::Context;
use collab_daemon::config::Config;
use collab_daemon::http::{self, AppState};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_args();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&cfg.log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    cfg.validate().context("invalid configuration")?;

    let app = http::router(AppState::new(&cfg))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(
        listen = %cfg.listen,
        bucket = %cfg.bucket_key,
        activity = %cfg.da.activity_alias(),
        "daemon starting"
    );
    let listener = tokio::net::TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("bind {}", cfg.listen))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
    tracing::info!("shutting down");
}
