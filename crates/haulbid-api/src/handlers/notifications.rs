//! Notification Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use haulbid_types::{NewNotification, Notification, NotificationId};

use crate::error::ApiResult;
use crate::extractors::{JsonBody, RequireAdmin, RequireAuth};
use crate::state::AppState;

/// The caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.market.notifications.list(user.account_id).await?))
}

/// Send a notification to any account (admin)
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer_auth" = [])),
    request_body = NewNotification,
    responses(
        (status = 201, description = "Notification stored", body = Notification),
        (status = 400, description = "Missing fields or message too long", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse)
    )
)]
pub async fn send_notification(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_admin): RequireAdmin,
    JsonBody(request): JsonBody<NewNotification>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let notification = state.market.notifications.send(request).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/{id}/read",
    tag = "Notifications",
    security(("bearer_auth" = [])),
    params(("id" = NotificationId, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked read", body = Notification),
        (status = 404, description = "Unknown notification", body = ErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<NotificationId>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.market.notifications.mark_read(user.actor(), id).await?))
}
