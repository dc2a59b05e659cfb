//! Proxy API - validated proxy pools and proxied fetching
//!
//! Keeps per-session pools of free HTTP proxies that recently passed a probe
//! against each session's target, and fetches content through them.
//!
//! ## Features
//!
//! - Periodic scraping of candidate proxies and user agents from plain-text feeds
//! - Batched validation of every candidate against every configured session
//! - Successful-proxy cache reused across requests, evicted on failure
//! - Proxy racing with bounded direct fallback
//! - RPC surface served as HTTP/JSON

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod services;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{ProxyApiError, Result};
