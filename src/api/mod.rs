//! API server implementation
//!
//! Exposes FetchContent, GetRandomProxy and GetProxyStats as JSON endpoints.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
