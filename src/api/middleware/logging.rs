//! Request logging middleware

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Response header carrying the generated request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request logging middleware
pub struct RequestLogging;

impl RequestLogging {
    /// Log request details under a per-request id
    pub async fn log_request(req: Request<Body>, next: Next) -> Response {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let span = tracing::info_span!("request", id = %request_id);

        async move {
            debug!("{} {} - started", method, uri);

            let mut response = next.run(req).await;

            let duration = start.elapsed();
            let status = response.status();

            if status.is_server_error() {
                warn!("{} {} - {} in {:?}", method, uri, status, duration);
            } else {
                info!("{} {} - {} in {:?}", method, uri, status, duration);
            }

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        }
        .instrument(span)
        .await
    }
}
