//! HTTP routes and server startup.

use std::sync::Arc;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::converter::Converter;
use crate::task::TaskAllocator;

use super::convert;

/// Room for multipart boundaries, headers and small text fields on top of
/// the file itself. The per-file limit is enforced while streaming.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task id counter and workspace creation
    pub tasks: TaskAllocator,
    /// The FBX2glTF executable for this host
    pub converter: Converter,
}

impl AppState {
    pub fn new(config: Config, converter: Converter) -> Self {
        let tasks = TaskAllocator::new(config.data_dir.clone());
        Self {
            config,
            tasks,
            converter,
        }
    }
}

/// Build the router: the convert endpoint, then static files from the
/// status root and the data root (in that order).
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(
        state
            .config
            .max_upload_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let convert_routes = Router::new()
        .route("/v1/convert/", post(convert::convert))
        .route("/v1/convert", post(convert::convert))
        .layer(DefaultBodyLimit::max(body_limit));

    let static_files =
        ServeDir::new(&state.config.status_dir).fallback(ServeDir::new(&state.config.data_dir));

    Router::new()
        .merge(convert_routes)
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let converter = Converter::locate(&config).context("Converter is not deployed")?;
    info!("Using converter {}", converter.program().display());
    match config.convert_timeout {
        Some(limit) => info!("Converter timeout: {} seconds", limit.as_secs()),
        None => info!("Converter timeout: none"),
    }

    let state = Arc::new(AppState::new(config.clone(), converter));
    state
        .tasks
        .prepare_root()
        .await
        .context("Failed to create task directory")?;
    info!("Data directory: {}", config.data_dir.display());
    info!("Status directory: {}", config.status_dir.display());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on port {}", config.port);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
