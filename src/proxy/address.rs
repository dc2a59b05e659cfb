//! Candidate address parsing
//!
//! Feeds hand us bare `host:port` tokens. They are turned into forward-proxy
//! URLs only after the port has been checked.

use std::fmt;

use url::Url;

use crate::error::{ProxyApiError, Result};

/// A `host:port` token that parsed cleanly as a forward proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyAddress {
    host: String,
    port: u16,
}

impl ProxyAddress {
    /// Parse a candidate token such as `1.2.3.4:8080`
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (host, port_str) = raw
            .rsplit_once(':')
            .ok_or_else(|| ProxyApiError::InvalidProxyAddress(format!("missing port: {}", raw)))?;

        if host.is_empty() {
            return Err(ProxyApiError::InvalidProxyAddress(format!(
                "missing host: {}",
                raw
            )));
        }

        let port = port_str
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ProxyApiError::InvalidProxyAddress(format!("invalid port: {}", raw)))?;

        // Let the URL parser reject hosts with spaces, schemes and the like.
        let url = Url::parse(&format!("http://{}:{}", host, port))?;
        if url.host_str().is_none() || url.path() != "/" {
            return Err(ProxyApiError::InvalidProxyAddress(format!(
                "invalid host: {}",
                raw
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL handed to the HTTP client's proxy configuration
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
