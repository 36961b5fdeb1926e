//! Process supervisor: listener lifecycle and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api;
use crate::config::AppConfig;
use crate::context::AppContext;

/// Main server orchestrator.
///
/// Binds the listener, serves the HTTP/WebSocket surface, and on
/// SIGTERM/SIGINT closes the listener, signals every live relay to shut
/// down, and waits for the session registry to drain — bounded by
/// `shutdown_timeout` so a hung SSH teardown cannot stall the process.
pub async fn run(config: AppConfig) -> Result<()> {
    let config = Arc::new(config);
    let ctx = Arc::new(AppContext::new(config));
    run_with_context(ctx).await
}

pub async fn run_with_context(ctx: Arc<AppContext>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening for client connections");

    let shutdown = ctx.shutdown.clone();
    tokio::spawn(handle_signals(shutdown.clone()));

    let app = api::router(ctx.clone());
    let serve_shutdown = shutdown.clone();
    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(serve_shutdown.cancelled_owned())
            .await
    });

    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => anyhow::bail!("server task failed: {e}"),
            }
        }
    }

    info!(
        timeout = ctx.config.shutdown_timeout,
        "Initiating graceful shutdown"
    );
    let deadline =
        tokio::time::Instant::now() + Duration::from_secs(ctx.config.shutdown_timeout);
    loop {
        let active = ctx.sessions.active();
        if active == 0 {
            info!("All sessions drained");
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(
                active_sessions = active,
                "Shutdown timeout reached, forcing exit"
            );
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    match tokio::time::timeout(Duration::from_secs(2), server_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "HTTP server task failed during shutdown"),
        Err(_) => warn!("HTTP server did not stop in time"),
    }

    info!("Graceful shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn handle_signals(shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
    }
    shutdown.cancel();
}

#[cfg(not(unix))]
async fn handle_signals(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received, initiating graceful shutdown");
        shutdown.cancel();
    }
}
