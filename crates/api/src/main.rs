//! Amity - companion booking server
//!
//! Main entry point for the `amityd` binary.

use std::sync::Arc;

use amity_api::{router, AppContext};
use amity_infra::{ReconcilePoller, ReconcilePollerConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging FIRST so we can see .env loading
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load environment variables from .env file
    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => warn!(error = %err, "no .env file loaded"),
    }

    let config = amity_infra::config::load()?;
    info!(bind_addr = %config.server.bind_addr, "amity starting");

    let ctx = AppContext::new(config.clone())?;

    let mut poller = build_poller(&ctx);
    if let Err(err) = poller.start().await {
        // The webhook path still works without the poll; keep serving.
        error!(error = %err, "failed to start reconciliation poller");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if poller.is_running() {
        if let Err(err) = poller.stop().await {
            warn!(error = %err, "reconciliation poller did not stop cleanly");
        }
    }

    info!("amity stopped");
    Ok(())
}

fn build_poller(ctx: &Arc<AppContext>) -> ReconcilePoller {
    let config = ReconcilePollerConfig {
        cron_expression: ctx.config.webhook.poll_cron.clone(),
        ..Default::default()
    };
    ReconcilePoller::new(config, ctx.reconciler.clone(), ctx.companions.clone())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
    }
}
