//! HTTP server implementation.

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers::{contact, health, limits, AppState};
use crate::error::{FormguardError, Result};

/// HTTP server for the contact endpoint.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared limiter and dispatcher
    state: Arc<AppState>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/contact", post(contact))
        .route("/api/limits", get(limits))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl HttpServer {
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Starting HTTP server for contact endpoint");

        let app = router(self.state);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            FormguardError::Serve(e.to_string())
        })
    }
}
