//! ow-server: the upload surface and presentation shell over HTTP.
//!
//! - Axum router with the page, JSON view model, upload endpoint and SSE
//! - Background engine initialization, reported on the event bus
//! - One job at a time, run as a spawned task
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod jobs;
pub mod router;
pub mod routes;
pub mod shell;
pub mod upload;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ow_core::config::Config;
use ow_core::events::EventPayload;
use ow_engine::{CodecEngine, EngineSession, FfmpegEngine, ToolRegistry};

use crate::context::AppContext;

/// Start the otoware server.
///
/// Builds the [`AppContext`], loads the codec engine in the background and
/// serves HTTP until a shutdown signal arrives.
pub async fn start(config: Config) -> ow_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = Arc::new(ToolRegistry::discover(&config.engine));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::debug!("Tool not found: {}", info.name);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| ow_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, Arc::new(EngineSession::new()), tools);
    let cancel = CancellationToken::new();

    let init_ctx = ctx.clone();
    let init_cancel = cancel.clone();
    let init_handle = tokio::spawn(async move {
        tokio::select! {
            _ = initialize_engine(&init_ctx) => {}
            _ = init_cancel.cancelled() => {}
        }
    });

    let app = router::build_router(ctx);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ow_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    let _ = init_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Load the ffmpeg engine into the session and announce the outcome.
/// Does nothing if the session was already initialized.
pub async fn initialize_engine(ctx: &AppContext) {
    let engine_config = ctx.config.engine.clone();
    let ran = ctx
        .session
        .initialize_with(|| async move {
            let engine = FfmpegEngine::initialize(&engine_config).await?;
            Ok(Arc::new(engine) as Arc<dyn CodecEngine>)
        })
        .await;
    if !ran {
        return;
    }

    let status = ctx.session.status();
    match ctx.session.failure() {
        Some(error) => ctx.event_bus.broadcast(EventPayload::EngineFailed { error }),
        None => ctx.event_bus.broadcast(EventPayload::EngineReady {
            version: status.version,
        }),
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
