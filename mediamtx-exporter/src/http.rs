//! HTTP server for the metrics and liveness endpoints.

use std::any::Any;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::HandlerError;
use crate::exposition;
use crate::refresh::SharedRefresher;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    refresher: SharedRefresher,
    refresh_on_scrape: bool,
}

/// Create the HTTP router.
fn create_router(
    refresher: SharedRefresher,
    metrics_path: &str,
    health_path: &str,
    refresh_on_scrape: bool,
) -> Router {
    let state = AppState {
        refresher,
        refresh_on_scrape,
    };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route(health_path, get(health_handler))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
///
/// Always answers 200 with a parseable body, even when the upstream is down.
async fn metrics_handler(State(state): State<AppState>) -> Result<Response, HandlerError> {
    if state.refresh_on_scrape {
        state.refresher.refresh().await;
    }

    let snapshot = state.refresher.store().read();
    let body = exposition::render(&snapshot)?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Handler for the liveness endpoint.
async fn health_handler() -> Response {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        "OK",
    )
        .into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    let err = HandlerError::Panic(message);
    error!(error = %err, "Error serving request");
    err.to_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    refresher: SharedRefresher,
    listen_addr: SocketAddr,
    metrics_path: String,
    health_path: String,
    refresh_on_scrape: bool,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        refresher: SharedRefresher,
        listen_addr: SocketAddr,
        metrics_path: String,
        health_path: String,
    ) -> Self {
        Self {
            refresher,
            listen_addr,
            metrics_path,
            health_path,
            refresh_on_scrape: true,
        }
    }

    /// Whether a scrape of the metrics path triggers a refresh first.
    pub fn refresh_on_scrape(mut self, enabled: bool) -> Self {
        self.refresh_on_scrape = enabled;
        self
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let router = create_router(
            self.refresher,
            &self.metrics_path,
            &self.health_path,
            self.refresh_on_scrape,
        );

        info!(
            addr = %addr,
            path = %self.metrics_path,
            health = %self.health_path,
            refresh_on_scrape = self.refresh_on_scrape,
            "MediaMTX exporter listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
