//! suggest-api - Concept suggestions aggregator
//!
//! Accepts content over HTTP, asks every enabled suggestion provider for
//! concepts, canonicalizes them through the concordance service and returns
//! the merged, filtered list.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use suggest_api::api::health::current_build_info;
use suggest_api::config::{Cli, ServiceConfig};
use suggest_api::services::DenylistCache;
use suggest_api::AppState;
use suggest_common::transaction;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(&cli).context("Failed to load configuration")?;

    suggest_common::logging::init(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let build = current_build_info();
    info!(
        "Starting suggest-api v{} [{}] built {} ({})",
        build.version, build.git_hash, build.build_timestamp, build.build_profile
    );

    let state = AppState::from_config(&config).context("Failed to build HTTP client")?;
    info!(
        "Denylist refresh every {}s, max age {}s",
        config.denylist.refresh_interval_secs, config.denylist.max_age_secs
    );

    let shutdown = CancellationToken::new();
    let refresher = spawn_denylist_refresher(
        Arc::clone(&state.denylist),
        config.denylist_refresh_interval(),
        shutdown.clone(),
    );

    let app = suggest_api::build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(refresher) = refresher {
        let _ = refresher.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically refresh the denylist until `shutdown` fires
///
/// A zero interval disables the task; requests then refresh on demand.
fn spawn_denylist_refresher(
    cache: Arc<DenylistCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        info!("Periodic denylist refresh disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let tid = transaction::generate();
            if let Err(e) = cache.refresh(&shutdown, &tid).await {
                error!(tid = %tid, error = %e, "Periodic denylist refresh failed");
            }
        }
    }))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
