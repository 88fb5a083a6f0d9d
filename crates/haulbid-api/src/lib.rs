//! HaulBid REST API
//!
//! JSON over HTTP for the delivery marketplace.
//!
//! # API Structure
//!
//! ```text
//! /api/v1/
//! ├── /register, /login, /reset-password, /me   - Identity
//! ├── /orders                                   - Order intake and lifecycle
//! ├── /bids                                     - Bidding and acceptance
//! ├── /ratings, /reviews                        - Reputation
//! ├── /notifications                            - In-app notifications
//! ├── /users                                    - Account administration
//! └── /analytics                                - Platform totals
//! /health, /ready, /api-docs/openapi.json
//! ```
//!
//! Protected routes take `Authorization: Bearer <jwt>`.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, Method};
use axum::Router;
use serde::Deserialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use haulbid_auth::AuthLayer;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable CORS for browser clients
    pub enable_cors: bool,
    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
    /// Enable response compression
    pub enable_compression: bool,
    /// Enable request tracing
    pub enable_tracing: bool,
    /// Requests slower than this are logged at warn
    #[serde(with = "humantime_serde")]
    pub slow_request_threshold: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            enable_compression: true,
            enable_tracing: true,
            slow_request_threshold: Duration::from_secs(1),
        }
    }
}

/// Create the main API router with all middleware
pub fn create_router(state: Arc<AppState>, config: ApiConfig) -> Router {
    let identity = state.identity.clone();

    let mut router = Router::new()
        .nest("/api/v1", routes::api_v1_routes())
        .route("/health", axum::routing::get(handlers::health::health_check))
        .route("/ready", axum::routing::get(handlers::health::readiness_check))
        .merge(routes::openapi_routes())
        .with_state(state)
        .layer(AuthLayer::new(identity))
        .layer(axum::middleware::from_fn_with_state(
            config.slow_request_threshold,
            middleware::timing_middleware,
        ));

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ));
    }

    // Outside the trace layer so the span sees the generated id
    let x_request_id = HeaderName::from_static("x-request-id");
    router = router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    if config.enable_compression {
        router = router.layer(CompressionLayer::new());
    }

    if config.enable_cors {
        let cors = if config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(
                    config
                        .cors_origins
                        .iter()
                        .filter_map(|o| o.parse().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any)
        };
        router = router.layer(cors);
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.enable_cors);
        assert!(config.enable_compression);
        assert_eq!(config.slow_request_threshold, Duration::from_secs(1));
    }

    #[test]
    fn test_config_from_json() {
        let config: ApiConfig = serde_json::from_value(serde_json::json!({
            "cors_origins": ["https://haulbid.example"],
            "slow_request_threshold": "250ms"
        }))
        .unwrap();
        assert_eq!(config.cors_origins, vec!["https://haulbid.example"]);
        assert_eq!(config.slow_request_threshold, Duration::from_millis(250));
        assert!(config.enable_tracing);
    }
}
