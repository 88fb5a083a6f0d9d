//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

use haulbid_marketplace::PlatformStats;
use haulbid_types::{
    AccountId, AccountPatch, AccountSummary, ActorRole, Bid, BidDetails, BidId, BidPatch,
    BidStats, BidStatus, CategoryAverages, CategoryScores, Dimensions, NewNotification,
    Notification, NotificationId, NotificationKind, Order, OrderId, OrderPatch, OrderPayload,
    OrderStatus, PackageType, Priority, PublicAccount, Rating, RatingCategories, RatingId,
    RatingSummary, Review, ReviewId, Role, StatusUpdate, StatusUpdateId, Urgency,
};

use crate::dto;
use crate::error::ErrorResponse;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HaulBid API",
        description = "Delivery marketplace: customers post orders, delivery companies bid, customers accept and rate.",
        version = "1.0.0",
        license(name = "Apache-2.0")
    ),
    paths(
        // Health
        handlers::health::health_check,
        handlers::health::readiness_check,
        // Identity
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::reset_password,
        handlers::auth::me,
        // Orders
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::update_order,
        handlers::orders::delete_order,
        handlers::orders::update_status,
        handlers::orders::approve_order,
        handlers::orders::reject_order,
        handlers::orders::order_history,
        // Bids
        handlers::bids::create_bid,
        handlers::bids::list_bids,
        handlers::bids::update_bid,
        handlers::bids::delete_bid,
        handlers::bids::accept_bid,
        handlers::bids::cancel_acceptance,
        handlers::bids::withdraw_bid,
        handlers::bids::bid_stats,
        // Reputation
        handlers::ratings::submit_rating,
        handlers::ratings::list_ratings,
        handlers::ratings::rating_summary,
        handlers::ratings::submit_review,
        handlers::ratings::list_reviews,
        // Notifications
        handlers::notifications::list_notifications,
        handlers::notifications::send_notification,
        handlers::notifications::mark_read,
        // Administration
        handlers::accounts::list_users,
        handlers::accounts::update_user,
        handlers::accounts::delete_user,
        handlers::accounts::analytics,
    ),
    components(
        schemas(
            // Common
            ErrorResponse,
            dto::MessageResponse,
            handlers::health::HealthResponse,
            handlers::health::ReadinessResponse,
            handlers::health::ComponentStatus,
            // Ids
            AccountId, OrderId, BidId, RatingId, ReviewId, NotificationId, StatusUpdateId,
            // Identity
            dto::RegisterRequest, dto::RegisterResponse, dto::LoginRequest, dto::LoginResponse,
            dto::ResetPasswordRequest, Role, PublicAccount, AccountSummary, AccountPatch,
            dto::UpdateUserRequest, dto::UserIdRequest,
            // Orders
            Order, OrderStatus, Urgency, PackageType, Dimensions, OrderPayload, OrderPatch,
            StatusUpdate, ActorRole, dto::UpdateOrderRequest, dto::OrderIdRequest,
            dto::StatusRequest, dto::RejectRequest,
            // Bids
            Bid, BidStatus, BidDetails, BidPatch, BidStats, dto::CreateBidRequest,
            dto::UpdateBidRequest, dto::BidIdRequest, dto::BidDecisionRequest,
            // Reputation
            Rating, RatingCategories, CategoryScores, RatingSummary, CategoryAverages, Review,
            dto::RatingRequest, dto::ReviewRequest,
            // Notifications
            Notification, NewNotification, NotificationKind, Priority,
            // Analytics
            PlatformStats,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Authentication", description = "Registration, login and password reset"),
        (name = "Orders", description = "Order intake and lifecycle"),
        (name = "Bids", description = "Bidding, acceptance and price statistics"),
        (name = "Ratings", description = "Post-delivery ratings and company summaries"),
        (name = "Reviews", description = "Free-form reviews"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Users", description = "Account administration"),
        (name = "Analytics", description = "Platform totals")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the bearer scheme referenced by protected paths
pub struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
