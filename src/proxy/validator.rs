//! Validation sweep for candidate proxies
//!
//! Candidates are split into consecutive batches that all run at once. Inside a
//! batch candidates go one at a time, and each candidate is probed against every
//! session concurrently, so at most `batch_size * sessions` probes are in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::models::{SessionProfile, SessionRegistry, ValidatedPool};
use crate::proxy::address::ProxyAddress;
use crate::proxy::client::{probe_headers, proxied_client};

/// Default number of candidates per batch
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Validation engine configuration
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum candidates per batch
    pub batch_size: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Freshly built pool; every registry session is a key, possibly with no addresses
    pub pool: ValidatedPool,
    /// Batches that ran to completion
    pub batches: usize,
    /// Candidates handed to the sweep
    pub candidates: usize,
}

/// Best-effort, single-pass prober. Failures are never retried.
pub struct ProxyValidator {
    config: ValidatorConfig,
}

impl ProxyValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Probe every candidate against every session and build a new pool
    #[instrument(skip_all, fields(candidates = candidates.len(), sessions = registry.len()))]
    pub async fn validate(
        &self,
        candidates: Vec<String>,
        registry: &SessionRegistry,
    ) -> ValidationReport {
        let batch_size = self.config.batch_size.max(1);
        let candidate_count = candidates.len();
        let sessions: Arc<Vec<Arc<SessionProfile>>> = Arc::new(registry.profiles());

        let seeded: ValidatedPool = sessions
            .iter()
            .map(|session| (session.name.clone(), Vec::new()))
            .collect();
        let pool = Arc::new(Mutex::new(seeded));

        let batches: Vec<Vec<String>> = candidates
            .chunks(batch_size)
            .map(<[String]>::to_vec)
            .collect();
        let total_batches = batches.len();
        let processed = Arc::new(AtomicUsize::new(0));

        info!(
            "Validating {} candidates in {} batches of up to {}",
            candidate_count, total_batches, batch_size
        );

        let mut tasks = JoinSet::new();
        for batch in batches {
            let sessions = sessions.clone();
            let pool = pool.clone();
            let processed = processed.clone();
            tasks.spawn(async move {
                for candidate in &batch {
                    probe_candidate(candidate, &sessions, &pool).await;
                }
                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                info!("Progress: {}/{} batches processed", done, total_batches);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Validation batch task failed: {}", e);
            }
        }

        let pool = std::mem::take(&mut *pool.lock());

        let mut names: Vec<&String> = pool.keys().collect();
        names.sort();
        for name in names {
            info!(session = %name, validated = pool[name].len(), "Session validation complete");
        }

        ValidationReport {
            pool,
            batches: processed.load(Ordering::SeqCst),
            candidates: candidate_count,
        }
    }
}

/// Probe one candidate against all sessions, waiting for every probe
async fn probe_candidate(
    candidate: &str,
    sessions: &[Arc<SessionProfile>],
    pool: &Mutex<ValidatedPool>,
) {
    let address = match ProxyAddress::parse(candidate) {
        Ok(address) => address,
        Err(e) => {
            debug!(candidate = %candidate, "Skipping candidate: {}", e);
            return;
        }
    };

    let address = &address;
    join_all(sessions.iter().map(|session| async move {
        if probe(address, session).await {
            pool.lock()
                .entry(session.name.clone())
                .or_default()
                .push(address.to_string());
        }
    }))
    .await;
}

/// Success means no transport error and a 200 within the session timeout
async fn probe(address: &ProxyAddress, session: &SessionProfile) -> bool {
    let client = match proxied_client(address, session.timeout(), true) {
        Ok(client) => client,
        Err(e) => {
            debug!(proxy = %address, "Failed to build probe client: {}", e);
            return false;
        }
    };

    // The response, and with it the body, is dropped at the end of this match.
    match client
        .get(&session.url)
        .headers(probe_headers(session))
        .send()
        .await
    {
        Ok(response) if response.status() == StatusCode::OK => {
            debug!(proxy = %address, session = %session.name, "Proxy valid");
            true
        }
        Ok(response) => {
            debug!(
                proxy = %address,
                session = %session.name,
                status = %response.status(),
                "Proxy not valid"
            );
            false
        }
        Err(e) => {
            debug!(proxy = %address, session = %session.name, "Proxy not valid: {}", e);
            false
        }
    }
}
