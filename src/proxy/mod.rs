//! Proxy validation and fetch dispatch
//!
//! This module provides:
//! - Candidate address parsing
//! - The validation engine that builds per-session pools
//! - The successful-proxy cache
//! - The fetch dispatcher with proxy racing and direct fallback
//! - Error and content classification

pub mod address;
pub mod backoff;
pub mod cache;
pub mod classify;
pub mod client;
pub mod dispatcher;
pub mod validator;

pub use address::ProxyAddress;
pub use cache::{CacheKey, CachedClient, SuccessfulProxyCache};
pub use classify::{Classifier, ClassifierConfig};
pub use dispatcher::{DispatcherConfig, FetchDispatcher, DEFAULT_USER_AGENTS};
pub use validator::{ProxyValidator, ValidationReport, ValidatorConfig};
