use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ProxyApiError, Result};

/// Default probe/fetch timeout for a session, in milliseconds
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 2000;

fn default_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

/// Named target profile used to probe candidates and to shape outbound fetches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    pub name: String,
    /// Probe target for the validation sweep
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SessionProfile {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ProxyApiError::InvalidConfig(
                "session name must not be empty".into(),
            ));
        }
        Url::parse(&self.url).map_err(|e| {
            ProxyApiError::InvalidConfig(format!(
                "session {} has an invalid url {}: {}",
                self.name, self.url, e
            ))
        })?;
        if self.timeout_ms == 0 {
            return Err(ProxyApiError::InvalidConfig(format!(
                "session {} must have a timeout greater than zero",
                self.name
            )));
        }
        Ok(())
    }
}

/// Read-only mapping from session name to profile
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: HashMap<String, Arc<SessionProfile>>,
}

impl SessionRegistry {
    /// Build a registry, rejecting invalid or duplicate profiles
    pub fn from_profiles(profiles: Vec<SessionProfile>) -> Result<Self> {
        let mut sessions = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            profile.validate()?;
            let name = profile.name.clone();
            if sessions.insert(name.clone(), Arc::new(profile)).is_some() {
                return Err(ProxyApiError::InvalidConfig(format!(
                    "duplicate session name: {}",
                    name
                )));
            }
        }
        Ok(Self { sessions })
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<SessionProfile>> {
        self.sessions
            .get(name)
            .cloned()
            .ok_or_else(|| ProxyApiError::session_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    /// Session names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn profiles(&self) -> Vec<Arc<SessionProfile>> {
        self.names()
            .iter()
            .filter_map(|name| self.sessions.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        let coinmarketcap = SessionProfile::new("CoinMarketCap", "https://coinmarketcap.com/es/")
            .with_header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .with_header("Accept-Language", "es-ES,es;q=0.9,en;q=0.8")
            .with_header("DNT", "1")
            .with_header("Upgrade-Insecure-Requests", "1");

        let mut sessions = HashMap::new();
        sessions.insert(coinmarketcap.name.clone(), Arc::new(coinmarketcap));
        Self { sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_coinmarketcap() {
        let registry = SessionRegistry::default();
        let profile = registry.lookup("CoinMarketCap").unwrap();
        assert_eq!(profile.url, "https://coinmarketcap.com/es/");
        assert_eq!(profile.timeout(), Duration::from_millis(2000));
        assert!(profile.headers.contains_key("Accept-Language"));
    }

    #[test]
    fn test_lookup_missing_session() {
        let registry = SessionRegistry::default();
        let err = registry.lookup("FlashScore").unwrap_err();
        assert!(matches!(err, ProxyApiError::SessionNotFound { name } if name == "FlashScore"));
    }

    #[test]
    fn test_from_profiles_rejects_duplicates() {
        let err = SessionRegistry::from_profiles(vec![
            SessionProfile::new("A", "http://a.test/"),
            SessionProfile::new("A", "http://b.test/"),
        ])
        .unwrap_err();
        assert!(matches!(err, ProxyApiError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_profiles_rejects_bad_url_and_zero_timeout() {
        let err = SessionRegistry::from_profiles(vec![SessionProfile::new("A", "not a url")])
            .unwrap_err();
        assert!(matches!(err, ProxyApiError::InvalidConfig(_)));

        let err = SessionRegistry::from_profiles(vec![
            SessionProfile::new("A", "http://a.test/").with_timeout_ms(0)
        ])
        .unwrap_err();
        assert!(matches!(err, ProxyApiError::InvalidConfig(_)));
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = SessionRegistry::from_profiles(vec![
            SessionProfile::new("Zeta", "http://z.test/"),
            SessionProfile::new("Alpha", "http://a.test/"),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["Alpha".to_string(), "Zeta".to_string()]);
        assert_eq!(registry.profiles()[0].name, "Alpha");
        assert_eq!(registry.len(), 2);
    }
}
