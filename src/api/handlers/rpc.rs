//! RPC handlers
//!
//! One POST endpoint per service method; request and response bodies mirror the
//! protobuf messages field for field.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, warn};

use crate::api::server::AppState;
use crate::error::ProxyApiError;
use crate::models::{FetchRequest, FetchResponse, RandomProxyRequest};

/// FetchContent
pub async fn fetch_content(
    State(state): State<AppState>,
    Json(req): Json<FetchRequest>,
) -> Result<impl IntoResponse, ProxyApiError> {
    if req.url.trim().is_empty() {
        return Err(ProxyApiError::InvalidRequest("url is required".to_string()));
    }

    info!(
        url = %req.url,
        session = %req.session,
        proxy = req.proxy,
        redirect = req.redirect,
        "FetchContent"
    );

    let content = state
        .dispatcher
        .fetch_content(&req.url, &req.session, req.proxy, req.redirect)
        .await?;

    if state.dispatcher.is_invalid_content(&content) {
        warn!(url = %req.url, session = %req.session, "Fetched content looks like an error page");
    }

    Ok(Json(FetchResponse { content }))
}

/// GetRandomProxy
pub async fn get_random_proxy(
    State(state): State<AppState>,
    Json(req): Json<RandomProxyRequest>,
) -> Result<impl IntoResponse, ProxyApiError> {
    let response = state.dispatcher.random_proxy(&req.session)?;
    Ok(Json(response))
}

/// GetProxyStats; the request message has no fields, so any body is accepted
pub async fn get_proxy_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.stats())
}
