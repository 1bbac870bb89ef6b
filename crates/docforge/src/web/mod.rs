//! HTTP surface for docforge.
//!
//! Handlers are thin: they stage uploads through the workspace, hand paths to
//! the compression layer and translate results into download links.

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use ephemeral_workspace::Workspace;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::{
    compression::SizeTargetedCompressor,
    config::{Config, defaults::DEFAULT_MAX_REQUEST_BYTES},
    engine::CompressionEngine,
};

pub mod extractors;
pub mod handlers;
pub mod responses;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub workspace: Workspace,
    pub engine: Arc<dyn CompressionEngine>,
    pub search: Arc<SizeTargetedCompressor>,
}

/// Assemble the application router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = match state.config.web.max_request_bytes() {
        Ok(limit) => limit,
        Err(e) => {
            tracing::warn!("{}, using {} bytes", e, DEFAULT_MAX_REQUEST_BYTES);
            DEFAULT_MAX_REQUEST_BYTES
        }
    };

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/files/{name}", get(handlers::files::serve_file))
        .route("/api/pdf/compress", post(handlers::compress::compress_pdf))
        .route("/api/pdf/batch", post(handlers::batch::batch_process))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr = state.config.web.bind_address().parse()?;
        Ok(Self {
            app: build_router(state),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until cancelled (or SIGINT/SIGTERM when no token is given).
    ///
    /// `ready_signal` fires once the listener is bound, or with the bind error.
    pub async fn serve_with_cancellation(
        self,
        ready_signal: oneshot::Sender<Result<()>>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        let listener = match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(bind_error) => {
                let message = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", message)));
                return Err(anyhow::anyhow!("{}", message));
            }
        };
        let _ = ready_signal.send(Ok(()));

        let shutdown_signal = async move {
            match cancellation_token {
                Some(token) => {
                    token.cancelled().await;
                    tracing::info!("Web server received cancellation signal, shutting down gracefully");
                }
                None => wait_for_signal().await,
            }
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("Failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down gracefully"),
        Err(e) => {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
