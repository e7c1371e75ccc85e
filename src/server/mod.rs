//! HTTP server exposing the search engine
//!
//! - `POST /api/search/article` - search by article code
//! - `GET /api/health` - liveness and registered suppliers
//! - `GET /metrics` - Prometheus text exposition

pub mod api;

use axum::http::HeaderValue;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::search::SearchEngine;

pub use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub start_time: Instant,
}

// ============================================================================
// Search Server
// ============================================================================

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Search API server
pub struct SearchServer {
    config: ServerConfig,
    state: AppState,
}

impl SearchServer {
    pub fn new(config: ServerConfig, engine: SearchEngine) -> Self {
        Self {
            config,
            state: AppState {
                engine: Arc::new(engine),
                start_time: Instant::now(),
            },
        }
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        let allow_origin = if origins.is_empty() {
            AllowOrigin::from(Any)
        } else {
            AllowOrigin::list(origins)
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Build the router with all layers
    pub fn build_router(&self) -> Router {
        create_router(self.state.clone())
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.bind.clone();

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        tracing::info!(addr = %addr, "Search server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Search server shutdown complete");
        Ok(())
    }
}
