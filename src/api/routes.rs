//! API route definitions

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::server::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .route("/api/status", get(handlers::health::status))
        // RPC methods, named after the service's protobuf definitions
        .nest("/rpc", rpc_routes())
        .with_state(state)
}

fn rpc_routes() -> Router<AppState> {
    Router::new()
        .route("/FetchContent", post(handlers::rpc::fetch_content))
        .route("/GetRandomProxy", post(handlers::rpc::get_random_proxy))
        .route("/GetProxyStats", post(handlers::rpc::get_proxy_stats))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::middleware::REQUEST_ID_HEADER;
    use crate::api::ApiServer;
    use crate::config::ApiServerConfig;
    use crate::models::{FetchResponse, PoolSnapshot, SessionProfile, SessionRegistry, ValidatedPool};
    use crate::proxy::{Classifier, DispatcherConfig, FetchDispatcher};
    use crate::test_support::FakeServer;

    fn router(pool: ValidatedPool) -> axum::Router {
        let registry = SessionRegistry::from_profiles(vec![
            SessionProfile::new("S", "http://example.test/").with_timeout_ms(2000),
            SessionProfile::new("Empty", "http://empty.example.test/"),
        ])
        .unwrap();
        let dispatcher = FetchDispatcher::new(
            Arc::new(registry),
            Classifier::default(),
            DispatcherConfig::default(),
        )
        .unwrap();
        dispatcher.replace_snapshot(PoolSnapshot::new(pool, vec!["agent".to_string()]));

        let config = ApiServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        ApiServer::new(config, Arc::new(dispatcher)).build_router()
    }

    fn pool() -> ValidatedPool {
        let mut pool = ValidatedPool::new();
        pool.insert("S".to_string(), vec!["1.2.3.4:8080".to_string()]);
        pool.insert("Empty".to_string(), Vec::new());
        pool
    }

    fn rpc(method: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/rpc/{}", method))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(pool())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            json_body(response).await,
            json!({"status": "healthy", "service": "proxy-api"})
        );
    }

    #[tokio::test]
    async fn test_status_reports_pool_counts() {
        let response = router(pool())
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["sessions"]["S"], 1);
        assert_eq!(body["sessions"]["Empty"], 0);
        assert_eq!(body["total_valid_proxies"], 1);
        assert_eq!(body["cached_proxies"], 0);
        assert!(body["last_refresh"].is_string());
    }

    #[tokio::test]
    async fn test_get_proxy_stats() {
        let response = router(pool())
            .oneshot(rpc("GetProxyStats", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "proxy_count_by_session": {"Empty": 0, "S": 1},
                "total_valid_proxies": 1
            })
        );
    }

    #[tokio::test]
    async fn test_get_random_proxy() {
        let app = router(pool());

        let picked = json_body(
            app.clone()
                .oneshot(rpc("GetRandomProxy", json!({"session": "S"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(picked["proxy"], "1.2.3.4:8080");
        assert_eq!(picked["success"], true);

        let empty = json_body(
            app.clone()
                .oneshot(rpc("GetRandomProxy", json!({"session": "Empty"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(empty["success"], false);
        assert_eq!(empty["proxy"], "");

        let missing = app
            .oneshot(rpc("GetRandomProxy", json!({"session": ""})))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fetch_content_requires_known_session() {
        let app = router(pool());

        for session in ["", "UnknownSession"] {
            let response = app
                .clone()
                .oneshot(rpc(
                    "FetchContent",
                    json!({"url": "http://example.test/", "session": session, "proxy": true}),
                ))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json_body(response).await;
            assert!(body["error"]
                .as_str()
                .unwrap()
                .starts_with("Session not found"));
        }
    }

    #[tokio::test]
    async fn test_fetch_content_direct() {
        let origin = FakeServer::respond(200, "<html>hello</html>").await;

        let response = router(pool())
            .oneshot(rpc(
                "FetchContent",
                json!({"url": origin.url(), "session": "Empty", "proxy": true, "redirect": false}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let decoded: FetchResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(&decoded.content[..], b"<html>hello</html>");
    }

    #[tokio::test]
    async fn test_fetch_content_rejects_missing_url() {
        let response = router(pool())
            .oneshot(rpc("FetchContent", json!({"url": " ", "session": "S"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
