//! API Routes

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use utoipa::OpenApi;

use crate::handlers::{accounts, auth, bids, notifications, orders, ratings};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Everything under `/api/v1`
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Identity
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/reset-password", post(auth::reset_password))
        .route("/me", get(auth::me))
        // Orders
        .route(
            "/orders",
            post(orders::create_order)
                .get(orders::list_orders)
                .put(orders::update_order)
                .delete(orders::delete_order),
        )
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", put(orders::update_status))
        .route("/orders/:id/approve", post(orders::approve_order))
        .route("/orders/:id/reject", post(orders::reject_order))
        .route("/orders/:id/history", get(orders::order_history))
        // Bids
        .route(
            "/bids",
            post(bids::create_bid)
                .get(bids::list_bids)
                .put(bids::update_bid)
                .delete(bids::delete_bid),
        )
        .route("/bids/accept", post(bids::accept_bid))
        .route("/bids/cancel-acceptance", post(bids::cancel_acceptance))
        .route("/bids/withdraw", post(bids::withdraw_bid))
        .route("/bids/stats", get(bids::bid_stats))
        // Reputation
        .route("/ratings", post(ratings::submit_rating).get(ratings::list_ratings))
        .route("/ratings/summary", get(ratings::rating_summary))
        .route("/reviews", post(ratings::submit_review).get(ratings::list_reviews))
        // Notifications
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::send_notification),
        )
        .route("/notifications/:id/read", put(notifications::mark_read))
        // Administration
        .route(
            "/users",
            get(accounts::list_users)
                .put(accounts::update_user)
                .delete(accounts::delete_user),
        )
        .route("/analytics", get(accounts::analytics))
}

/// Machine-readable API description
pub fn openapi_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
