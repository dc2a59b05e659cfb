use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the proxy API
#[derive(Error, Debug)]
pub enum ProxyApiError {
    // Session errors
    #[error("Session not found: {name}")]
    SessionNotFound { name: String },

    // Proxy errors
    #[error("No proxies available")]
    NoProxiesAvailable,

    #[error("Invalid proxy address: {0}")]
    InvalidProxyAddress(String),

    // Fetch errors
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Direct fetch gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse session file: {0}")]
    Toml(#[from] toml::de::Error),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for proxy API operations
pub type Result<T> = std::result::Result<T, ProxyApiError>;

impl ProxyApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            ProxyApiError::SessionNotFound { .. }
            | ProxyApiError::InvalidProxyAddress(_)
            | ProxyApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,

            // 502 Bad Gateway
            ProxyApiError::Fetch(_) | ProxyApiError::Http(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            ProxyApiError::NoProxiesAvailable => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            ProxyApiError::RetriesExhausted { .. } | ProxyApiError::DeadlineExceeded => {
                StatusCode::GATEWAY_TIMEOUT
            }

            // 500 Internal Server Error
            ProxyApiError::InvalidConfig(_)
            | ProxyApiError::Toml(_)
            | ProxyApiError::Io(_)
            | ProxyApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn session_not_found(name: impl Into<String>) -> Self {
        ProxyApiError::SessionNotFound { name: name.into() }
    }
}

// Implement IntoResponse for RPC error responses
impl IntoResponse for ProxyApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for ProxyApiError {
    fn from(err: url::ParseError) -> Self {
        ProxyApiError::InvalidProxyAddress(err.to_string())
    }
}
