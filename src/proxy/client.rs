//! HTTP client construction for probes and fetches

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::warn;

use crate::error::Result;
use crate::models::SessionProfile;
use crate::proxy::address::ProxyAddress;

/// Fixed user agent sent with every validation probe
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

fn redirect_policy(follow_redirects: bool) -> Policy {
    if follow_redirects {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::none()
    }
}

/// Client whose every request is forwarded through `address`
pub fn proxied_client(
    address: &ProxyAddress,
    timeout: Duration,
    follow_redirects: bool,
) -> Result<Client> {
    let proxy = reqwest::Proxy::all(address.proxy_url())?;
    let client = Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .redirect(redirect_policy(follow_redirects))
        .build()?;
    Ok(client)
}

/// Baseline client that never goes through a proxy, not even one from the environment
pub fn direct_client(follow_redirects: bool) -> Result<Client> {
    let client = Client::builder()
        .no_proxy()
        .redirect(redirect_policy(follow_redirects))
        .build()?;
    Ok(client)
}

/// Session headers as a header map. Entries that are not valid HTTP headers are skipped.
pub fn session_headers(profile: &SessionProfile) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(profile.headers.len());
    for (name, value) in &profile.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(session = %profile.name, header = %name, "Skipping invalid session header"),
        }
    }
    headers
}

/// Headers for a validation probe: session headers, then the fixed probe user agent
pub fn probe_headers(profile: &SessionProfile) -> HeaderMap {
    let mut headers = session_headers(profile);
    headers.insert(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));
    headers
}

/// Headers for a content fetch: the chosen user agent, then session headers on top
pub fn fetch_headers(profile: &SessionProfile, user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    for (name, value) in session_headers(profile) {
        if let Some(name) = name {
            headers.insert(name, value);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SessionProfile {
        SessionProfile::new("Test", "http://example.test/")
            .with_header("Accept-Language", "es-ES")
            .with_header("bad header", "x")
    }

    #[test]
    fn test_session_headers_skip_invalid_names() {
        let headers = session_headers(&profile());
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["accept-language"], "es-ES");
    }

    #[test]
    fn test_probe_headers_use_fixed_user_agent() {
        let profile = profile().with_header("User-Agent", "custom");
        let headers = probe_headers(&profile);
        assert_eq!(headers[USER_AGENT], PROBE_USER_AGENT);
    }

    #[test]
    fn test_fetch_headers_let_session_override_user_agent() {
        let headers = fetch_headers(&profile(), "picked-agent");
        assert_eq!(headers[USER_AGENT], "picked-agent");

        let overriding = profile().with_header("User-Agent", "session-agent");
        let headers = fetch_headers(&overriding, "picked-agent");
        assert_eq!(headers[USER_AGENT], "session-agent");
        assert_eq!(headers.get_all(USER_AGENT).iter().count(), 1);
    }

    #[test]
    fn test_clients_build() {
        let address = ProxyAddress::parse("127.0.0.1:3128").unwrap();
        assert!(proxied_client(&address, Duration::from_millis(500), false).is_ok());
        assert!(direct_client(true).is_ok());
    }
}
