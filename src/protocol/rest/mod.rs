//! HTTP API Module
//!
//! Provides the HTTP server, its routes, and the background purge reconciler.

pub mod dto;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::HttpConfig;
use crate::protocol::Handler;

use self::handlers::{admin, chat, files, sessions};

/// Creates the Axum router
pub fn create_router(handler: Arc<Handler>, config: &HttpConfig) -> Router {
    // Build CORS layer
    let cors = if !config.cors_origins.is_empty() {
        // Explicit origins configured: restrict to those
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| {
                let parsed = s.parse();
                if parsed.is_err() {
                    tracing::warn!(origin = %s, "invalid CORS origin ignored");
                }
                parsed.ok()
            })
            .collect();
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if config.cors_allow_all {
        Some(CorsLayer::permissive())
    } else {
        // Default: same-origin only
        None
    };

    let mut app = Router::new()
        .route("/health", get(admin::health))
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/:id",
            axum::routing::delete(sessions::delete_session),
        )
        .route("/sessions/:id/files", get(files::list_files))
        .route(
            "/sessions/:id/files/:name",
            put(files::upload_file).delete(files::delete_file),
        )
        .route("/sessions/:id/chat", post(chat::chat))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(Extension(handler));

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app
}

/// Periodically settle purges whose vector cleanup failed earlier.
async fn run_reconciler(
    handler: Arc<Handler>,
    every: Duration,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    // The first tick fires immediately; startup already reconciled.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let settled = handler.reconcile().await;
                if settled > 0 {
                    tracing::info!(settled, "reconciler settled pending purges");
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::debug!("reconciler shutting down");
                break;
            }
        }
    }
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Listens for SIGINT (ctrl-c) and SIGTERM to trigger graceful shutdown and
/// stops the reconciler once the listener is closed.
pub async fn start_http_server(
    handler: Arc<Handler>,
    config: &HttpConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(handler.clone(), config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let reconciler = if config.reconcile_interval_secs > 0 {
        Some(tokio::spawn(run_reconciler(
            Arc::clone(&handler),
            Duration::from_secs(config.reconcile_interval_secs),
            shutdown_rx,
        )))
    } else {
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(%addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = reconciler {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "reconciler task failed");
        }
    }

    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
