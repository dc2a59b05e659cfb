//! API server using Axum
//!
//! Serves the RPC surface as HTTP/JSON plus health and status endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::middleware::from_fn;
use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::ApiServerConfig;
use crate::error::{ProxyApiError, Result};
use crate::proxy::FetchDispatcher;

use super::middleware::RequestLogging;
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<FetchDispatcher>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<FetchDispatcher>) -> Self {
        Self {
            dispatcher,
            started_at: Instant::now(),
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, dispatcher: Arc<FetchDispatcher>) -> Self {
        Self {
            config,
            state: AppState::new(dispatcher),
        }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        routes::create_router(self.state.clone())
            .layer(from_fn(RequestLogging::log_request))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| {
                ProxyApiError::InvalidConfig(format!("Invalid API server address: {}", e))
            })?;

        let router = self.build_router();

        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| ProxyApiError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
