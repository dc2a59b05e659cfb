//! Proxy API - Entry Point
//!
//! Builds the initial pools, then runs the refresher and the API server with
//! graceful shutdown support.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proxy_api::api::ApiServer;
use proxy_api::config::{Config, LogConfig};
use proxy_api::error::Result;
use proxy_api::proxy::{FetchDispatcher, ProxyValidator};
use proxy_api::services::{ProxyRefresher, RefresherHandle};
use proxy_api::source::{CandidateSource, FeedSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting Proxy API");

    let profiles = config.load_profiles()?;
    info!(
        sessions = ?profiles.registry.names(),
        "Session profiles loaded"
    );

    let dispatcher = Arc::new(FetchDispatcher::new(
        Arc::new(profiles.registry),
        profiles.classifier,
        config.dispatcher_config(),
    )?);

    let source: Arc<dyn CandidateSource> = Arc::new(FeedSource::new(config.feed_config())?);
    let refresher = Arc::new(ProxyRefresher::new(
        source,
        ProxyValidator::new(config.validator_config()),
        dispatcher.clone(),
        config.refresher_config(),
    ));

    // Initial pools before serving
    refresher.refresh_once().await;

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);

    // Start refresher
    let (refresher_handle, refresher_shutdown) = RefresherHandle::new();
    let refresher_task = {
        let refresher = refresher.clone();
        tokio::spawn(async move {
            refresher.run(refresher_shutdown).await;
        })
    };

    // Start API server
    let api_server = ApiServer::new(config.api.clone(), dispatcher.clone());
    let api_shutdown = shutdown_tx.subscribe();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    info!("Server started - API: {}", config.api_addr());

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    refresher_handle.shutdown();

    let _ = tokio::join!(api_task, refresher_task);

    info!("Proxy API stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("proxy_api={},tower_http=info", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
