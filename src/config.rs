use crate::error::{ProxyApiError, Result};
use crate::models::{SessionProfile, SessionRegistry};
use crate::proxy::{Classifier, ClassifierConfig, DispatcherConfig, ValidatorConfig};
use crate::services::RefresherConfig;
use crate::source::feed::{FeedConfig, DEFAULT_PROXY_FEEDS, DEFAULT_USER_AGENT_FEEDS};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// RPC/API server configuration
    pub api: ApiServerConfig,
    /// Validation sweep and refresh cadence
    pub validation: ValidationConfig,
    /// Fetch dispatcher limits
    pub fetch: FetchConfig,
    /// Candidate and user-agent feeds
    pub source: SourceConfig,
    /// Optional session profile file
    pub sessions_file: Option<PathBuf>,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 5000)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Candidates per validation batch
    pub batch_size: usize,
    /// Seconds between pool refreshes
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_direct_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    /// Per-attempt timeout for direct fetches, in seconds
    pub direct_timeout_secs: u64,
    /// Overall budget for one FetchContent call, in seconds
    pub deadline_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub proxy_feeds: Vec<String>,
    pub user_agent_feeds: Vec<String>,
    pub feed_timeout_secs: u64,
    pub user_agent_attempts: u32,
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let batch_size: usize = parse_env("VALIDATION_BATCH_SIZE", "20")?;
        if batch_size == 0 {
            return Err(ProxyApiError::InvalidConfig(
                "VALIDATION_BATCH_SIZE must be at least 1".into(),
            ));
        }

        let max_direct_attempts: u32 = parse_env("FETCH_MAX_DIRECT_ATTEMPTS", "5")?;
        if max_direct_attempts == 0 {
            return Err(ProxyApiError::InvalidConfig(
                "FETCH_MAX_DIRECT_ATTEMPTS must be at least 1".into(),
            ));
        }

        let sessions_file = env::var("SESSIONS_FILE")
            .ok()
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Config {
            api: ApiServerConfig {
                port: get_env_or("API_PORT", "5000").parse().map_err(|_| {
                    ProxyApiError::InvalidConfig("API_PORT must be a valid port number".into())
                })?,
                host: get_env_or("API_HOST", "0.0.0.0"),
            },
            validation: ValidationConfig {
                batch_size,
                refresh_interval_secs: parse_env("REFRESH_INTERVAL_SECS", "1800")?,
            },
            fetch: FetchConfig {
                max_direct_attempts,
                retry_base_ms: parse_env("FETCH_RETRY_BASE_MS", "200")?,
                retry_max_ms: parse_env("FETCH_RETRY_MAX_MS", "5000")?,
                direct_timeout_secs: parse_env("FETCH_DIRECT_TIMEOUT_SECS", "30")?,
                deadline_secs: parse_env("FETCH_DEADLINE_SECS", "120")?,
            },
            source: SourceConfig {
                proxy_feeds: get_list_or("SOURCE_PROXY_FEEDS", DEFAULT_PROXY_FEEDS),
                user_agent_feeds: get_list_or("SOURCE_USER_AGENT_FEEDS", DEFAULT_USER_AGENT_FEEDS),
                feed_timeout_secs: parse_env("SOURCE_FEED_TIMEOUT_SECS", "25")?,
                user_agent_attempts: parse_env("SOURCE_USER_AGENT_ATTEMPTS", "3")?,
                retry_delay_secs: parse_env("SOURCE_RETRY_DELAY_SECS", "2")?,
            },
            sessions_file,
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "json"),
            },
        })
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            batch_size: self.validation.batch_size,
        }
    }

    pub fn refresher_config(&self) -> RefresherConfig {
        RefresherConfig {
            interval_secs: self.validation.refresh_interval_secs,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_direct_attempts: self.fetch.max_direct_attempts,
            retry_base: Duration::from_millis(self.fetch.retry_base_ms),
            retry_max: Duration::from_millis(self.fetch.retry_max_ms),
            direct_timeout: Duration::from_secs(self.fetch.direct_timeout_secs),
            request_deadline: Duration::from_secs(self.fetch.deadline_secs),
        }
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            proxy_feeds: self.source.proxy_feeds.clone(),
            user_agent_feeds: self.source.user_agent_feeds.clone(),
            timeout: Duration::from_secs(self.source.feed_timeout_secs),
            user_agent_attempts: self.source.user_agent_attempts,
            retry_delay: Duration::from_secs(self.source.retry_delay_secs),
        }
    }

    /// Session registry and classifier, from `SESSIONS_FILE` or the built-in defaults
    pub fn load_profiles(&self) -> Result<Profiles> {
        match &self.sessions_file {
            Some(path) => Profiles::from_file(path),
            None => Ok(Profiles::default()),
        }
    }
}

/// Session profiles plus classifier overrides
#[derive(Debug, Clone, Default)]
pub struct Profiles {
    pub registry: SessionRegistry,
    pub classifier: Classifier,
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default, rename = "session")]
    sessions: Vec<SessionProfile>,
    #[serde(default)]
    classifier: ClassifierConfig,
}

impl Profiles {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: ProfilesFile = toml::from_str(raw)?;
        if file.sessions.is_empty() {
            return Err(ProxyApiError::InvalidConfig(
                "sessions file must define at least one [[session]]".into(),
            ));
        }

        Ok(Self {
            registry: SessionRegistry::from_profiles(file.sessions)?,
            classifier: Classifier::from_config(&file.classifier),
        })
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| ProxyApiError::InvalidConfig(format!("{} must be a valid number", key)))
}

/// Comma-separated list, falling back to `default` when unset or blank
fn get_list_or(key: &str, default: &[&str]) -> Vec<String> {
    let list: Vec<String> = get_env_or(key, "")
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if list.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "API_PORT",
        "API_HOST",
        "VALIDATION_BATCH_SIZE",
        "REFRESH_INTERVAL_SECS",
        "FETCH_MAX_DIRECT_ATTEMPTS",
        "FETCH_RETRY_BASE_MS",
        "FETCH_RETRY_MAX_MS",
        "FETCH_DIRECT_TIMEOUT_SECS",
        "FETCH_DEADLINE_SECS",
        "SOURCE_PROXY_FEEDS",
        "SOURCE_USER_AGENT_FEEDS",
        "SOURCE_FEED_TIMEOUT_SECS",
        "SOURCE_USER_AGENT_ATTEMPTS",
        "SOURCE_RETRY_DELAY_SECS",
        "SESSIONS_FILE",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = Config::from_env().unwrap();

        assert_eq!(config.api.port, 5000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.validation.batch_size, 20);
        assert_eq!(config.validation.refresh_interval_secs, 1800);
        assert_eq!(config.fetch.max_direct_attempts, 5);
        assert_eq!(config.fetch.deadline_secs, 120);
        assert_eq!(config.source.proxy_feeds.len(), DEFAULT_PROXY_FEEDS.len());
        assert_eq!(config.source.feed_timeout_secs, 25);
        assert_eq!(config.source.user_agent_attempts, 3);
        assert!(config.sessions_file.is_none());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("API_PORT", "6000");
        env::set_var("API_HOST", "127.0.0.1");
        env::set_var("VALIDATION_BATCH_SIZE", "5");
        env::set_var("FETCH_MAX_DIRECT_ATTEMPTS", "2");
        env::set_var("FETCH_RETRY_BASE_MS", "50");
        env::set_var("SOURCE_PROXY_FEEDS", "https://a.example/list.txt, https://b.example/list.txt");
        env::set_var("SESSIONS_FILE", "/etc/proxy-api/sessions.toml");

        let config = Config::from_env().unwrap();

        assert_eq!(config.api_addr(), "127.0.0.1:6000");
        assert_eq!(config.validator_config().batch_size, 5);
        let dispatcher = config.dispatcher_config();
        assert_eq!(dispatcher.max_direct_attempts, 2);
        assert_eq!(dispatcher.retry_base, Duration::from_millis(50));
        assert_eq!(
            config.feed_config().proxy_feeds,
            vec![
                "https://a.example/list.txt".to_string(),
                "https://b.example/list.txt".to_string()
            ]
        );
        assert_eq!(
            config.sessions_file,
            Some(PathBuf::from("/etc/proxy-api/sessions.toml"))
        );
    }

    #[test]
    fn test_config_from_env_invalid_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("API_PORT", "not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ProxyApiError::InvalidConfig(_)));

        env::remove_var("API_PORT");
        env::set_var("VALIDATION_BATCH_SIZE", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ProxyApiError::InvalidConfig(_)));

        env::remove_var("VALIDATION_BATCH_SIZE");
        env::set_var("FETCH_DEADLINE_SECS", "soon");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ProxyApiError::InvalidConfig(_)));
    }

    #[test]
    fn test_profiles_default_to_builtin_registry() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let profiles = Config::from_env().unwrap().load_profiles().unwrap();
        assert_eq!(profiles.registry.names(), vec!["CoinMarketCap".to_string()]);
    }

    #[test]
    fn test_profiles_from_toml() {
        let raw = r#"
            [[session]]
            name = "Scores"
            url = "https://scores.example/feed"
            timeout_ms = 1500
            [session.headers]
            Accept = "*/*"
            Origin = "https://www.scores.example"

            [[session]]
            name = "Prices"
            url = "https://prices.example/"

            [classifier]
            timeout_patterns = ["slow"]
        "#;

        let profiles = Profiles::from_toml(raw).unwrap();

        let scores = profiles.registry.lookup("Scores").unwrap();
        assert_eq!(scores.timeout_ms, 1500);
        assert_eq!(scores.headers["Origin"], "https://www.scores.example");
        let prices = profiles.registry.lookup("Prices").unwrap();
        assert_eq!(prices.timeout_ms, 2000);

        assert!(profiles.classifier.is_timeout_message("too slow"));
        assert!(!profiles.classifier.is_timeout_message("EOF"));
        // Invalid-content set was not overridden.
        assert!(profiles.classifier.is_invalid_content(b"temporary error"));
    }

    #[test]
    fn test_profiles_reject_bad_files() {
        assert!(matches!(
            Profiles::from_toml("").unwrap_err(),
            ProxyApiError::InvalidConfig(_)
        ));
        assert!(matches!(
            Profiles::from_toml("[[session]]\nname = \"A\"\nurl = \"not a url\"\n").unwrap_err(),
            ProxyApiError::InvalidConfig(_)
        ));
        assert!(matches!(
            Profiles::from_toml(
                "[[session]]\nname = \"A\"\nurl = \"http://a/\"\n[[session]]\nname = \"A\"\nurl = \"http://b/\"\n"
            )
            .unwrap_err(),
            ProxyApiError::InvalidConfig(_)
        ));
        assert!(matches!(
            Profiles::from_toml("[[session]]\nname = 3\n").unwrap_err(),
            ProxyApiError::Toml(_)
        ));
    }
}
