//! Fetch dispatcher
//!
//! Serves content fetches through cached proxies and the session's validated
//! pool, falling back to a direct request. Pools are read from an atomically
//! swapped snapshot; proxy attempts run in a `JoinSet` that is torn down before
//! the call returns.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use rand::seq::SliceRandom;
use reqwest::Client;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProxyApiError, Result};
use crate::models::{PoolSnapshot, ProxyStatsResponse, RandomProxyResponse, SessionProfile, SessionRegistry};
use crate::proxy::address::ProxyAddress;
use crate::proxy::backoff::RetryBackoff;
use crate::proxy::cache::{CacheKey, CachedClient, SuccessfulProxyCache};
use crate::proxy::classify::{error_chain, Classifier};
use crate::proxy::client::{direct_client, fetch_headers};

/// Used when the user-agent pool is empty
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum direct attempts, the first one included
    pub max_direct_attempts: u32,
    /// Backoff base between timeout-class direct failures
    pub retry_base: Duration,
    /// Backoff ceiling
    pub retry_max: Duration,
    /// Per-attempt timeout for direct requests
    pub direct_timeout: Duration,
    /// Overall budget for one fetch call
    pub request_deadline: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_direct_attempts: 5,
            retry_base: Duration::from_millis(200),
            retry_max: Duration::from_secs(5),
            direct_timeout: Duration::from_secs(30),
            request_deadline: Duration::from_secs(120),
        }
    }
}

/// Clients for requests that bypass every proxy
struct DirectClients {
    follow: Client,
    no_follow: Client,
}

impl DirectClients {
    fn new() -> Result<Self> {
        Ok(Self {
            follow: direct_client(true)?,
            no_follow: direct_client(false)?,
        })
    }

    fn get(&self, follow_redirects: bool) -> &Client {
        if follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        }
    }
}

/// Answers fetch, random-proxy and stats requests
pub struct FetchDispatcher {
    registry: Arc<SessionRegistry>,
    snapshot: ArcSwap<PoolSnapshot>,
    cache: Arc<SuccessfulProxyCache>,
    classifier: Arc<Classifier>,
    direct: DirectClients,
    config: DispatcherConfig,
}

impl FetchDispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        classifier: Classifier,
        config: DispatcherConfig,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            snapshot: ArcSwap::from_pointee(PoolSnapshot::empty()),
            cache: Arc::new(SuccessfulProxyCache::new()),
            classifier: Arc::new(classifier),
            direct: DirectClients::new()?,
            config,
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &SuccessfulProxyCache {
        &self.cache
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Current pools; the returned snapshot never changes underneath the caller
    pub fn snapshot(&self) -> Arc<PoolSnapshot> {
        self.snapshot.load_full()
    }

    /// Swap in a freshly built snapshot
    pub fn replace_snapshot(&self, snapshot: PoolSnapshot) {
        info!(
            sessions = snapshot.pools().len(),
            total_valid = snapshot.total_valid(),
            user_agents = snapshot.user_agents().len(),
            "Replacing pool snapshot"
        );
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Whether fetched content is a known soft-failure page
    pub fn is_invalid_content(&self, content: &[u8]) -> bool {
        self.classifier.is_invalid_content(content)
    }

    /// Fetch `url` for `session`, through a proxy when `use_proxy` is set.
    ///
    /// The session must be a key of the loaded pool even for direct fetches.
    #[instrument(skip(self))]
    pub async fn fetch_content(
        &self,
        url: &str,
        session: &str,
        use_proxy: bool,
        allow_redirect: bool,
    ) -> Result<Bytes> {
        let snapshot = self.snapshot();
        if session.is_empty() || !snapshot.contains_session(session) {
            return Err(ProxyApiError::session_not_found(session));
        }
        let profile = self.registry.lookup(session)?;

        let deadline = Instant::now() + self.config.request_deadline;
        let user_agent = pick_user_agent(&snapshot);

        if use_proxy {
            let proxied = tokio::time::timeout_at(
                deadline,
                self.fetch_through_proxies(url, &profile, &snapshot, &user_agent, allow_redirect),
            )
            .await;

            match proxied {
                Ok(Ok(content)) => return Ok(content),
                Ok(Err(e)) => debug!("Proxy phase produced no content ({}), fetching directly", e),
                // No budget left for a direct attempt.
                Err(_) => return Err(ProxyApiError::DeadlineExceeded),
            }
        }

        self.direct_fetch(url, &profile, &user_agent, allow_redirect, deadline)
            .await
    }

    /// Race one attempt per cached address and one per pooled address; first success wins.
    ///
    /// At most `pool.len()` completions are consumed. Every remaining attempt is
    /// aborted and awaited before the cache is settled, so only the winner's
    /// handle is ever stored.
    async fn fetch_through_proxies(
        &self,
        url: &str,
        profile: &Arc<SessionProfile>,
        snapshot: &PoolSnapshot,
        user_agent: &str,
        allow_redirect: bool,
    ) -> Result<Bytes> {
        let pool = snapshot.addresses(&profile.name).unwrap_or_default();
        let expected = pool.len();
        if expected == 0 {
            return Err(ProxyApiError::NoProxiesAvailable);
        }

        let mut attempts = JoinSet::new();
        let cached = self.cache.addresses();
        debug!(
            cached = cached.len(),
            pooled = expected,
            "Starting proxy attempts"
        );

        for address in cached.into_iter().chain(pool.iter().cloned()) {
            let attempt = ProxyAttempt {
                cache: self.cache.clone(),
                profile: profile.clone(),
                address,
                url: url.to_string(),
                user_agent: user_agent.to_string(),
                follow_redirects: allow_redirect,
            };
            attempts.spawn(attempt.run());
        }

        let mut failed = HashSet::new();
        let mut outcome = None;
        let mut consumed = 0;

        while consumed < expected {
            let Some(joined) = attempts.join_next().await else {
                break;
            };
            consumed += 1;

            match joined {
                Ok((address, Ok(success))) => {
                    outcome = Some((address, success));
                    break;
                }
                Ok((address, Err(e))) => {
                    debug!(proxy = %address, "Proxy attempt failed: {}", e);
                    failed.insert(address);
                }
                Err(e) => warn!("Proxy attempt task failed: {}", e),
            }
        }

        attempts.shutdown().await;

        match outcome {
            Some((address, success)) => {
                settle_cache(&self.cache, &failed, Some((&address, &success)));
                Ok(success.content)
            }
            None => {
                settle_cache(&self.cache, &failed, None);
                Err(ProxyApiError::NoProxiesAvailable)
            }
        }
    }

    /// Direct request, retried with backoff on timeout-class errors.
    ///
    /// Stops after `max_direct_attempts` attempts or when the deadline passes.
    async fn direct_fetch(
        &self,
        url: &str,
        profile: &SessionProfile,
        user_agent: &str,
        allow_redirect: bool,
        deadline: Instant,
    ) -> Result<Bytes> {
        let client = self.direct.get(allow_redirect);
        let max_attempts = self.config.max_direct_attempts.max(1);
        let backoff = RetryBackoff::new(self.config.retry_base, self.config.retry_max);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let now = Instant::now();
            if now >= deadline {
                return Err(ProxyApiError::DeadlineExceeded);
            }
            let timeout = self.config.direct_timeout.min(deadline - now);

            let result = async {
                let response = client
                    .get(url)
                    .headers(fetch_headers(profile, user_agent))
                    .timeout(timeout)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.bytes().await?;
                Ok::<_, reqwest::Error>((status, body))
            }
            .await;

            match result {
                Ok((status, body)) => {
                    info!(
                        user_agent = %user_agent,
                        status = status.as_u16(),
                        url = %url,
                        attempt,
                        "Fetched directly"
                    );
                    return Ok(body);
                }
                Err(e) if self.classifier.is_timeout_error(&e) => {
                    let message = error_chain(&e);
                    if attempt >= max_attempts {
                        warn!(url = %url, attempt, "Direct fetch giving up: {}", message);
                        return Err(ProxyApiError::RetriesExhausted {
                            attempts: attempt,
                            last_error: message,
                        });
                    }

                    let delay = backoff.delay_after(attempt);
                    if Instant::now() + delay >= deadline {
                        return Err(ProxyApiError::DeadlineExceeded);
                    }

                    warn!(url = %url, attempt, ?delay, "Retrying direct fetch due to {}", message);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(ProxyApiError::Fetch(error_chain(&e))),
            }
        }
    }

    /// Uniformly random address from the session's pool
    pub fn random_proxy(&self, session: &str) -> Result<RandomProxyResponse> {
        if session.is_empty() {
            return Err(ProxyApiError::InvalidRequest(
                "session must not be empty".into(),
            ));
        }

        if !self.registry.contains(session) {
            return Ok(RandomProxyResponse::failed(format!(
                "Session '{}' not found in configuration",
                session
            )));
        }

        let snapshot = self.snapshot();
        let pool = snapshot.addresses(session).unwrap_or_default();
        match pool.choose(&mut rand::thread_rng()) {
            Some(proxy) => {
                info!(session = %session, proxy = %proxy, "Selected random proxy");
                Ok(RandomProxyResponse::selected(proxy.clone(), session))
            }
            None => Ok(RandomProxyResponse::failed(format!(
                "No valid proxies available for session '{}'",
                session
            ))),
        }
    }

    /// Per-session validated counts from the current snapshot
    pub fn stats(&self) -> ProxyStatsResponse {
        self.snapshot().stats()
    }
}

/// Content from a winning attempt, with the handle that fetched it
struct ProxySuccess {
    content: Bytes,
    key: CacheKey,
    handle: Arc<CachedClient>,
}

/// Bring the cache in line with a finished race.
///
/// Failed addresses other than the winner go; the winner's handle is stored
/// last, so a failing duplicate of the winning address cannot leave it out.
fn settle_cache(
    cache: &SuccessfulProxyCache,
    failed: &HashSet<String>,
    winner: Option<(&String, &ProxySuccess)>,
) {
    for address in failed {
        if winner.map_or(true, |(won, _)| won != address) {
            cache.evict(address);
        }
    }

    if let Some((_, success)) = winner {
        cache.promote(success.key.clone(), success.handle.clone());
    }
}

/// One fetch through one proxy, run as its own task
struct ProxyAttempt {
    cache: Arc<SuccessfulProxyCache>,
    profile: Arc<SessionProfile>,
    address: String,
    url: String,
    user_agent: String,
    follow_redirects: bool,
}

impl ProxyAttempt {
    async fn run(self) -> (String, Result<ProxySuccess>) {
        let result = self.fetch().await;
        (self.address, result)
    }

    async fn fetch(&self) -> Result<ProxySuccess> {
        let address = match ProxyAddress::parse(&self.address) {
            Ok(address) => address,
            Err(e) => {
                self.cache.evict(&self.address);
                return Err(e);
            }
        };

        let handle = self
            .cache
            .get_client(&address, &self.profile, self.follow_redirects)?;

        let result = async {
            let response = handle
                .client()
                .get(&self.url)
                .headers(fetch_headers(&self.profile, &self.user_agent))
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;

        match result {
            Ok((status, body)) => {
                info!(
                    proxy = %address,
                    user_agent = %self.user_agent,
                    status = status.as_u16(),
                    url = %self.url,
                    "Fetched through proxy"
                );
                Ok(ProxySuccess {
                    content: body,
                    key: CacheKey::new(&address, &self.profile.name, self.follow_redirects),
                    handle,
                })
            }
            Err(e) => {
                self.cache.evict(&self.address);
                Err(ProxyApiError::Fetch(error_chain(&e)))
            }
        }
    }
}

pub(crate) fn pick_user_agent(snapshot: &PoolSnapshot) -> String {
    let mut rng = rand::thread_rng();
    snapshot
        .user_agents()
        .choose(&mut rng)
        .cloned()
        .or_else(|| DEFAULT_USER_AGENTS.choose(&mut rng).map(|ua| ua.to_string()))
        .unwrap_or_default()
}
