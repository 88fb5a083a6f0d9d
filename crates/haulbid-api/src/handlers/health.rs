//! Health Check Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    /// `ready` or `not_ready`
    pub status: String,
    /// `postgres` or `memory`
    pub backend: String,
    pub database: ComponentStatus,
    pub redis: ComponentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentStatus {
    pub name: String,
    /// healthy/unhealthy
    pub status: String,
}

impl ComponentStatus {
    fn new(name: &str, healthy: bool) -> Self {
        Self {
            name: name.to_string(),
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        }
    }
}

/// Liveness. Does not touch dependencies.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().timestamp_millis(),
    })
}

/// Readiness: PostgreSQL and Redis, when configured, must answer
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service is not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let health = state.db.health_check().await;

    let (status_code, status) = if health.healthy {
        (StatusCode::OK, "ready")
    } else {
        tracing::warn!(postgres = health.postgres, redis = health.redis, "readiness check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status_code,
        Json(ReadinessResponse {
            status: status.to_string(),
            backend: state.db.backend().to_string(),
            database: ComponentStatus::new("PostgreSQL", health.postgres),
            redis: ComponentStatus::new("Redis", health.redis),
        }),
    )
}
