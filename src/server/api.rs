//! REST API handlers for the search server

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::AppState;
use crate::metrics;
use crate::models::{Offer, SearchRequest};

// ============================================================================
// API Response Types
// ============================================================================

/// Search response body
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub query: String,
    pub results: Vec<Offer>,
    pub count: usize,
}

impl SearchResponse {
    pub fn success(query: String, results: Vec<Offer>) -> Self {
        Self {
            status: "success",
            query,
            count: results.len(),
            results,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub providers: Vec<String>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/search/article", post(search_article))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        providers: state
            .engine
            .providers()
            .iter()
            .map(|p| p.to_string())
            .collect(),
    })
}

async fn search_article(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    if let Err(reason) = request.validate() {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(reason))).into_response();
    }

    let results = state.engine.search_offers(&request).await;
    Json(SearchResponse::success(request.article, results)).into_response()
}

async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("metrics unavailable")),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use crate::search::{EngineSettings, SearchEngine};
    use crate::suppliers::{DynSupplier, FetchOptions, SupplierClient, SupplierError};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Instant;
    use tower::ServiceExt;

    struct OneOffer;

    #[async_trait]
    impl SupplierClient for OneOffer {
        fn provider(&self) -> Provider {
            Provider::Berg
        }

        async fn fetch(
            &self,
            article: &str,
            _brand: Option<&str>,
            _opts: &FetchOptions,
        ) -> Result<Vec<Offer>, SupplierError> {
            Ok(vec![Offer::new(Provider::Berg, article, "MAHLE", Decimal::from(100))])
        }
    }

    fn router() -> Router {
        let clients: Vec<DynSupplier> = vec![Arc::new(OneOffer)];
        let state = AppState {
            engine: Arc::new(SearchEngine::new(clients, EngineSettings::default())),
            start_time: Instant::now(),
        };
        create_router(state)
    }

    async fn post_search(body: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .oneshot(
                Request::post("/api/search/article")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let (status, body) = post_search(r#"{"article": "OC90", "markup_percent": 10}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["query"], "OC90");
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["price"], 110.0);
    }

    #[tokio::test]
    async fn test_search_rejects_empty_article() {
        let (status, body) = post_search(r#"{"article": "  "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_search_rejects_negative_markup() {
        let (status, _) = post_search(r#"{"article": "OC90", "markup_percent": -5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_rejects_huge_markup() {
        let (status, body) = post_search(r#"{"article": "OC90", "markup_percent": 1e26}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = router()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["providers"], serde_json::json!(["berg"]));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        metrics::init_metrics().unwrap();
        let response = router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
