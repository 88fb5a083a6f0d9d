//! API Middleware

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Log every request's latency; slower than `threshold` is a warning
pub async fn timing_middleware(
    State(threshold): State<Duration>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    if elapsed > threshold {
        tracing::warn!(
            method = %method,
            uri = %uri,
            elapsed_ms = elapsed.as_millis() as u64,
            status = response.status().as_u16(),
            "Slow request detected"
        );
    } else {
        tracing::debug!(
            method = %method,
            uri = %uri,
            elapsed_ms = elapsed.as_millis() as u64,
            status = response.status().as_u16(),
            "Request completed"
        );
    }

    response
}
