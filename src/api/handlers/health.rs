//! Health check and status endpoints

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::api::server::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "proxy-api"
        })),
    )
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub last_refresh: Option<DateTime<Utc>>,
    pub sessions: BTreeMap<String, usize>,
    pub total_valid_proxies: usize,
    pub user_agents: usize,
    /// Distinct addresses in the successful-proxy cache
    pub cached_proxies: usize,
}

/// Pool and cache overview
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.dispatcher.snapshot();

    Json(StatusResponse {
        status: "running",
        uptime_secs: state.started_at.elapsed().as_secs(),
        last_refresh: snapshot.refreshed_at(),
        sessions: snapshot.count_by_session(),
        total_valid_proxies: snapshot.total_valid(),
        user_agents: snapshot.user_agents().len(),
        cached_proxies: state.dispatcher.cache().addresses().len(),
    })
}
