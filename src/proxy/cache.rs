//! Successful-proxy cache
//!
//! Process-wide store of reusable clients for proxy addresses that have served
//! real fetches. Nothing enters it except through `promote`. Handles are keyed by (address, session, redirect policy) so a
//! handle's timeout and redirect settings always belong to the session using it.
//! Eviction works by address and drops every handle bound to that proxy.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Client;
use tracing::debug;

use crate::error::Result;
use crate::models::SessionProfile;
use crate::proxy::address::ProxyAddress;
use crate::proxy::client::proxied_client;

/// Cache key: a handle's settings are fixed by the session and redirect flag it was built for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub address: String,
    pub session: String,
    pub follow_redirects: bool,
}

impl CacheKey {
    pub fn new(address: &ProxyAddress, session: &str, follow_redirects: bool) -> Self {
        Self {
            address: address.to_string(),
            session: session.to_string(),
            follow_redirects,
        }
    }
}

/// Client bound to one proxy. Never mutated after creation.
#[derive(Debug)]
pub struct CachedClient {
    address: ProxyAddress,
    client: Client,
    timeout: Duration,
    follow_redirects: bool,
    created_at: Instant,
}

impl CachedClient {
    pub fn build(address: &ProxyAddress, timeout: Duration, follow_redirects: bool) -> Result<Self> {
        Ok(Self {
            address: address.clone(),
            client: proxied_client(address, timeout, follow_redirects)?,
            timeout,
            follow_redirects,
            created_at: Instant::now(),
        })
    }

    pub fn address(&self) -> &ProxyAddress {
        &self.address
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

/// Address-evictable store of proxy clients.
///
/// Lookups take the read lock; inserts and evictions take the write lock.
#[derive(Debug, Default)]
pub struct SuccessfulProxyCache {
    clients: RwLock<HashMap<CacheKey, Arc<CachedClient>>>,
}

impl SuccessfulProxyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedClient>> {
        self.clients.read().get(key).cloned()
    }

    /// Cached handle for the key, or a fresh one built from the session's settings.
    ///
    /// A fresh handle is not stored here; it only enters the cache through
    /// `promote` once it has served a fetch.
    pub fn get_client(
        &self,
        address: &ProxyAddress,
        session: &SessionProfile,
        follow_redirects: bool,
    ) -> Result<Arc<CachedClient>> {
        let key = CacheKey::new(address, &session.name, follow_redirects);
        if let Some(handle) = self.get(&key) {
            return Ok(handle);
        }

        debug!(proxy = %address, session = %session.name, "Building proxy client");
        Ok(Arc::new(CachedClient::build(
            address,
            session.timeout(),
            follow_redirects,
        )?))
    }

    /// Store a handle that just served a fetch, replacing any handle under the same key
    pub fn promote(&self, key: CacheKey, handle: Arc<CachedClient>) {
        debug!(proxy = %key.address, session = %key.session, "Cached proxy client");
        self.clients.write().insert(key, handle);
    }

    /// Drop every handle bound to `address`; returns how many were removed
    pub fn evict(&self, address: &str) -> usize {
        let mut clients = self.clients.write();
        let before = clients.len();
        clients.retain(|key, _| key.address != address);
        let removed = before - clients.len();
        if removed > 0 {
            debug!(proxy = %address, removed, "Evicted proxy from cache");
        }
        removed
    }

    pub fn contains(&self, address: &str) -> bool {
        self.clients.read().keys().any(|key| key.address == address)
    }

    /// Distinct cached addresses, sorted
    pub fn addresses(&self) -> Vec<String> {
        self.clients
            .read()
            .keys()
            .map(|key| key.address.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}
