//! Account administration and analytics

use std::sync::Arc;

use axum::{extract::State, Json};
use haulbid_marketplace::PlatformStats;
use haulbid_types::AccountSummary;

use crate::dto::{field, MessageResponse, UpdateUserRequest, UserIdRequest};
use crate::error::ApiResult;
use crate::extractors::{JsonBody, RequireAdmin};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Accounts newest first", body = Vec<AccountSummary>),
        (status = 403, description = "Admin only", body = ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
) -> ApiResult<Json<Vec<AccountSummary>>> {
    Ok(Json(state.identity.list_accounts(&admin).await?))
}

/// Change role, activation or email
#[utoipa::path(
    put,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = AccountSummary),
        (status = 404, description = "Unknown account", body = ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> ApiResult<Json<AccountSummary>> {
    let id = field(request.user_id, "userId")?;
    Ok(Json(state.identity.update_account(&admin, id, request.patch).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 404, description = "Unknown account", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(request): JsonBody<UserIdRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let id = field(request.user_id, "userId")?;
    state.identity.delete_account(&admin, id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

/// Platform-wide counts
#[utoipa::path(
    get,
    path = "/api/v1/analytics",
    tag = "Analytics",
    responses(
        (status = 200, description = "Totals", body = PlatformStats)
    )
)]
pub async fn analytics(State(state): State<Arc<AppState>>) -> ApiResult<Json<PlatformStats>> {
    Ok(Json(state.market.analytics().await?))
}
