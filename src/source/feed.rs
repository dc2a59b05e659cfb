//! Plain-text feed scraping
//!
//! Each feed is a newline-separated list: proxy feeds carry `host:port` lines
//! (sometimes with trailing `:field`s), user-agent feeds carry one agent per line.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::CandidateSource;
use crate::error::{ProxyApiError, Result};
use crate::proxy::client::direct_client;

pub const DEFAULT_PROXY_FEEDS: &[&str] = &[
    "https://raw.githubusercontent.com/officialputuid/KangProxy/refs/heads/KangProxy/https/https.txt",
    "https://raw.githubusercontent.com/vakhov/fresh-proxy-list/refs/heads/master/https.txt",
];

pub const DEFAULT_USER_AGENT_FEEDS: &[&str] = &[
    "https://gist.githubusercontent.com/pzb/b4b6f57144aea7827ae4/raw/cf847b76a142955b1410c8bcef3aabe221a63db1/user-agents.txt",
];

/// User agents containing any of these are dropped
const MOBILE_MARKERS: &[&str] = &["Android", "iPhone", "iPad", "compatible;"];

/// Feed source configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub proxy_feeds: Vec<String>,
    pub user_agent_feeds: Vec<String>,
    /// Overall budget for one scrape across all feeds
    pub timeout: Duration,
    /// Scrapes attempted while the user-agent result stays empty
    pub user_agent_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            proxy_feeds: DEFAULT_PROXY_FEEDS.iter().map(|s| s.to_string()).collect(),
            user_agent_feeds: DEFAULT_USER_AGENT_FEEDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: Duration::from_secs(25),
            user_agent_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Proxies,
    UserAgents,
}

impl FeedKind {
    fn label(self) -> &'static str {
        match self {
            FeedKind::Proxies => "proxies",
            FeedKind::UserAgents => "user-agents",
        }
    }
}

/// Scrapes the configured HTTP feeds
pub struct FeedSource {
    client: Client,
    config: FeedConfig,
}

impl FeedSource {
    pub fn new(config: FeedConfig) -> Result<Self> {
        Ok(Self {
            client: direct_client(true)?,
            config,
        })
    }

    /// Fetch all feeds concurrently; feeds still pending at the deadline are dropped
    async fn scrape(&self, feeds: &[String], kind: FeedKind) -> Vec<String> {
        let deadline = Instant::now() + self.config.timeout;
        let mut tasks = JoinSet::new();

        for url in feeds {
            let client = self.client.clone();
            let url = url.clone();
            tasks.spawn(async move {
                info!(feed = %url, "Fetching {}", kind.label());
                let lines = fetch_feed(&client, &url).await;
                (url, lines)
            });
        }

        let mut results = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((url, Ok(body))))) => {
                    let lines = filter_lines(&body, kind);
                    debug!(feed = %url, lines = lines.len(), "Feed fetched");
                    results.extend(lines);
                }
                Ok(Some(Ok((url, Err(e))))) => {
                    warn!(feed = %url, "Error scraping {}: {}", kind.label(), e);
                }
                Ok(Some(Err(e))) => warn!("Feed task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        "Scraping {} timed out, keeping partial results",
                        kind.label()
                    );
                    break;
                }
            }
        }

        results
    }
}

#[async_trait]
impl CandidateSource for FeedSource {
    #[instrument(skip(self))]
    async fn fetch_candidates(&self) -> Vec<String> {
        let candidates = self
            .scrape(&self.config.proxy_feeds, FeedKind::Proxies)
            .await;
        info!(candidates = candidates.len(), "Fetched candidate proxies");
        candidates
    }

    #[instrument(skip(self))]
    async fn fetch_user_agents(&self) -> Vec<String> {
        let attempts = self.config.user_agent_attempts.max(1);

        for attempt in 1..=attempts {
            let agents = self
                .scrape(&self.config.user_agent_feeds, FeedKind::UserAgents)
                .await;
            if !agents.is_empty() {
                info!(user_agents = agents.len(), "Fetched user agents");
                return agents;
            }

            warn!(attempt, "No user agents fetched");
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Vec::new()
    }
}

async fn fetch_feed(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ProxyApiError::Fetch(format!(
            "feed returned {}",
            response.status()
        )));
    }
    Ok(response.text().await?)
}

fn filter_lines(body: &str, kind: FeedKind) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match kind {
            FeedKind::Proxies => Some(host_port(line).to_string()),
            FeedKind::UserAgents => {
                if MOBILE_MARKERS.iter().any(|marker| line.contains(marker)) {
                    None
                } else {
                    Some(line.to_string())
                }
            }
        })
        .collect()
}

/// `host:port:user:pass` style lines keep only the first two fields
fn host_port(line: &str) -> &str {
    match line.match_indices(':').nth(1) {
        Some((second_colon, _)) => &line[..second_colon],
        None => line,
    }
}
