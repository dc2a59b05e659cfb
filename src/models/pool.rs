use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::rpc::ProxyStatsResponse;

/// Session name -> addresses that passed that session's probe on the last sweep
pub type ValidatedPool = HashMap<String, Vec<String>>;

/// Immutable view of the pools the dispatcher reads on every request.
///
/// A refresh builds a whole new snapshot and swaps it in; nothing mutates
/// a snapshot after construction.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    pools: ValidatedPool,
    user_agents: Vec<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl PoolSnapshot {
    pub fn new(pools: ValidatedPool, user_agents: Vec<String>) -> Self {
        Self {
            pools,
            user_agents,
            refreshed_at: Some(Utc::now()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Addresses for a session, `None` when the session is not a key of the pool
    pub fn addresses(&self, session: &str) -> Option<&[String]> {
        self.pools.get(session).map(Vec::as_slice)
    }

    pub fn contains_session(&self, session: &str) -> bool {
        self.pools.contains_key(session)
    }

    pub fn pools(&self) -> &ValidatedPool {
        &self.pools
    }

    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn count_by_session(&self) -> BTreeMap<String, usize> {
        self.pools
            .iter()
            .map(|(session, addresses)| (session.clone(), addresses.len()))
            .collect()
    }

    pub fn total_valid(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> ProxyStatsResponse {
        let proxy_count_by_session = self
            .count_by_session()
            .into_iter()
            .map(|(session, count)| (session, saturating_i32(count)))
            .collect();

        ProxyStatsResponse {
            proxy_count_by_session,
            total_valid_proxies: saturating_i32(self.total_valid()),
        }
    }
}

fn saturating_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
