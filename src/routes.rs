use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::api::routes::{
    cluster_routes, credential_routes, kantaloupeflow_routes, monitoring_routes, node_routes, quota_routes,
    resource_routes, storage_routes,
};
use crate::app_state::AppState;

pub const API_PREFIX: &str = "/apis/kantaloupe.dynamia.ai/v1";

/// Build the main application router
pub fn app_router() -> Router<AppState> {
    let api = Router::new()
        .merge(cluster_routes::cluster_routes())
        .merge(cluster_routes::platform_routes())
        .merge(node_routes::node_routes())
        .merge(monitoring_routes::monitoring_routes())
        .merge(resource_routes::resource_routes())
        .merge(storage_routes::storage_routes())
        .merge(quota_routes::quota_routes())
        .merge(credential_routes::credential_routes())
        .merge(kantaloupeflow_routes::kantaloupeflow_routes());

    Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(health_check))
        .nest(API_PREFIX, api)
        .fallback(handler_404)
        .layer(CorsLayer::very_permissive())
}

async fn health_check() -> &'static str {
    "ok"
}

async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": "NOT_FOUND",
            "message": "The requested resource was not found"
        })),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::app_state::build_app_state;
    use crate::core::client::cluster_client_manager::{ClusterClientManager, KubeClientFactory, DEFAULT_CLIENT_TTL};
    use crate::core::client::prometheus_client::{HttpPromClient, DEFAULT_QUERY_TIMEOUT};
    use crate::domain::context::{ServiceContext, ServiceSettings};
    use crate::domain::monitoring::metrics::MetricsQuerier;

    // Kubernetes clients are built lazily, so nothing here reaches a cluster.
    fn router() -> Router {
        let clients = Arc::new(ClusterClientManager::new(KubeClientFactory::new(None), DEFAULT_CLIENT_TTL));
        let prom = HttpPromClient::new("", DEFAULT_QUERY_TIMEOUT).unwrap();
        let ctx = ServiceContext::new(
            clients,
            MetricsQuerier::new(Arc::new(prom)),
            ServiceSettings {
                namespace: "kantaloupe-system".into(),
                ..Default::default()
            },
        );
        app_router().with_state(build_app_state(Arc::new(ctx)))
    }

    async fn send(req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        for path in ["/healthz", "/readyz"] {
            let (status, body) = send(get(path)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, b"ok");
        }
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_404() {
        let (status, body) = send(get("/apis/kantaloupe.dynamia.ai/v1/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_prometheus_address_must_be_url() {
        let req = post_json(
            "/apis/kantaloupe.dynamia.ai/v1/clusters/prometheus:validate",
            json!({"prometheusAddress": "not a url"}),
        );
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_trend_rejects_bad_window() {
        let (status, body) = send(get(
            "/apis/kantaloupe.dynamia.ai/v1/platform/resource/trend?resourceType=RESOURCE_TYPE_CPU&range=soon",
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_trend_requires_resource_type() {
        let (status, _) = send(get("/apis/kantaloupe.dynamia.ai/v1/platform/resource/trend")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
