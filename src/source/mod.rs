//! Candidate sources
//!
//! Where candidate proxy addresses and user agents come from. The refresher
//! only sees the `CandidateSource` trait.

pub mod feed;

pub use feed::{FeedConfig, FeedSource};

use async_trait::async_trait;

/// Supplier of raw candidate addresses and user-agent strings
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Raw `host:port` candidates, possibly duplicated or malformed
    async fn fetch_candidates(&self) -> Vec<String>;

    /// User-agent strings; empty when none could be obtained
    async fn fetch_user_agents(&self) -> Vec<String>;
}

/// Fixed lists, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: Vec<String>,
    user_agents: Vec<String>,
}

impl StaticSource {
    pub fn new(candidates: Vec<String>, user_agents: Vec<String>) -> Self {
        Self {
            candidates,
            user_agents,
        }
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    async fn fetch_candidates(&self) -> Vec<String> {
        self.candidates.clone()
    }

    async fn fetch_user_agents(&self) -> Vec<String> {
        self.user_agents.clone()
    }
}
