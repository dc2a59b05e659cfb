//! Pool refresher service
//!
//! Rebuilds the validated pools on a fixed interval: scrape candidates, run the
//! validation sweep, scrape user agents, then swap the dispatcher's snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, instrument, warn};

use crate::models::PoolSnapshot;
use crate::proxy::{FetchDispatcher, ProxyValidator};
use crate::source::CandidateSource;

/// Refresher configuration
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Seconds between refreshes
    pub interval_secs: u64,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1800, // 30 minutes
        }
    }
}

/// Summary of one refresh
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub candidates: usize,
    pub total_valid: usize,
    pub user_agents: usize,
}

pub struct ProxyRefresher {
    source: Arc<dyn CandidateSource>,
    validator: ProxyValidator,
    dispatcher: Arc<FetchDispatcher>,
    config: RefresherConfig,
}

impl ProxyRefresher {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        validator: ProxyValidator,
        dispatcher: Arc<FetchDispatcher>,
        config: RefresherConfig,
    ) -> Self {
        Self {
            source,
            validator,
            dispatcher,
            config,
        }
    }

    /// Build a fresh pool and publish it in one swap
    #[instrument(skip(self))]
    pub async fn refresh_once(&self) -> RefreshSummary {
        let candidates = self.source.fetch_candidates().await;
        let candidate_count = candidates.len();

        let report = self
            .validator
            .validate(candidates, self.dispatcher.registry())
            .await;

        let mut user_agents = self.source.fetch_user_agents().await;
        if user_agents.is_empty() {
            let previous = self.dispatcher.snapshot();
            warn!(
                kept = previous.user_agents().len(),
                "No user agents fetched, keeping the previous list"
            );
            user_agents = previous.user_agents().to_vec();
        }

        let snapshot = PoolSnapshot::new(report.pool, user_agents);
        let summary = RefreshSummary {
            candidates: candidate_count,
            total_valid: snapshot.total_valid(),
            user_agents: snapshot.user_agents().len(),
        };
        self.dispatcher.replace_snapshot(snapshot);

        info!(
            candidates = summary.candidates,
            total_valid = summary.total_valid,
            user_agents = summary.user_agents,
            "Proxy pools refreshed"
        );
        summary
    }

    /// Refresh on every tick until shutdown. The immediate first tick is skipped;
    /// startup is expected to have refreshed already.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting proxy refresher (interval: {}s)",
            self.config.interval_secs
        );

        let mut refresh_interval = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        refresh_interval.tick().await;

        loop {
            tokio::select! {
                _ = refresh_interval.tick() => {
                    self.refresh_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Proxy refresher shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle for stopping the refresher
pub struct RefresherHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl RefresherHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for RefresherHandle {
    fn default() -> Self {
        Self::new().0
    }
}
