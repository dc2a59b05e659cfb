//! Background services

pub mod refresher;

pub use refresher::{ProxyRefresher, RefreshSummary, RefresherConfig, RefresherHandle};
