//! Literal-substring classifiers for transport errors and response bodies
//!
//! Both sets are data: the defaults below can be replaced from the session
//! file without touching dispatch code.

use std::error::Error as StdError;

use serde::Deserialize;

/// Error message fragments that mark a transport error as transient
pub const DEFAULT_TIMEOUT_PATTERNS: &[&str] = &[
    "context deadline exceeded (Client.Timeout or context cancellation while reading body)",
    "EOF",
    "read tcp",
    "connection",
    "Timeout",
    "timed out",
    "Forbidden",
    "(Client.Timeout",
    "Internal Server Error",
    "Bad Gateway",
    "Service Unavailable",
    "Gateway Timeout",
    "Too many open connections",
    "unconfigured cipher suite",
    "ClientConn.Close",
    "GOAWAY",
    "proxyconnect tcp:",
    "Temporary Redirect",
    "Internal Privoxy Error",
    "certificate",
    "bad record MAC",
    "handshake",
    "lookup",
];

/// Body fragments that mark a response as a soft failure
pub const DEFAULT_INVALID_CONTENT_PATTERNS: &[&str] = &[
    "<strong>Error:</strong>",
    "Marshal",
    "error while marshaling: proto: Marshal called with nilh",
    "Servicio no",
    "GOAWAY",
    "http2: server sent GOAWAY and closed the connection;",
    r#"{"code":110,"message":"Sport API error","name":"ServiceUnavailableError"}"#,
    "http2:",
    "temporary error",
];

/// Pattern overrides as they appear in the session file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub timeout_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub invalid_content_patterns: Option<Vec<String>>,
}

/// Pure predicates over two immutable pattern sets
#[derive(Debug, Clone)]
pub struct Classifier {
    timeout_patterns: Vec<String>,
    invalid_content_patterns: Vec<String>,
}

impl Classifier {
    pub fn new(timeout_patterns: Vec<String>, invalid_content_patterns: Vec<String>) -> Self {
        Self {
            timeout_patterns,
            invalid_content_patterns,
        }
    }

    /// Defaults, with any set present in `config` replacing its default
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let defaults = Self::default();
        Self {
            timeout_patterns: config
                .timeout_patterns
                .clone()
                .unwrap_or(defaults.timeout_patterns),
            invalid_content_patterns: config
                .invalid_content_patterns
                .clone()
                .unwrap_or(defaults.invalid_content_patterns),
        }
    }

    /// Whether an error message belongs to the timeout class
    pub fn is_timeout_message(&self, message: &str) -> bool {
        contains_any(&self.timeout_patterns, message)
    }

    /// Whether a transport error belongs to the timeout class.
    ///
    /// Client-reported timeouts always match; otherwise the whole source
    /// chain is checked against the pattern set.
    pub fn is_timeout_error(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || self.is_timeout_message(&error_chain(err))
    }

    /// Whether a fetched body is a known soft-failure page
    pub fn is_invalid_content(&self, content: &[u8]) -> bool {
        let text = String::from_utf8_lossy(content);
        contains_any(&self.invalid_content_patterns, &text)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_TIMEOUT_PATTERNS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_INVALID_CONTENT_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

fn contains_any(patterns: &[String], haystack: &str) -> bool {
    patterns
        .iter()
        .any(|p| haystack == p.as_str() || haystack.contains(p.as_str()))
}

/// Flatten an error and its sources into one message
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
