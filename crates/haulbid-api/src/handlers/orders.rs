//! Order Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use haulbid_types::{Order, OrderId, OrderPayload, StatusUpdate};

use crate::dto::{
    field, MessageResponse, OrderIdRequest, OrdersQuery, RejectRequest, StatusRequest,
    UpdateOrderRequest,
};
use crate::error::ApiResult;
use crate::extractors::{JsonBody, OptionalUser, QueryParams, RequireAuth};
use crate::state::AppState;

/// Create an order from either intake shape
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "Orders",
    request_body = OrderPayload,
    responses(
        (status = 201, description = "Order created", body = Order),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse)
    )
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    JsonBody(payload): JsonBody<OrderPayload>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let owner = user.map(|u| u.account_id);
    let order = state.market.orders.create(&payload, owner).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Orders newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "Orders",
    params(OrdersQuery),
    responses(
        (status = 200, description = "Orders", body = Vec<Order>)
    )
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<OrdersQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.market.orders.list(query.owner_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "Orders",
    params(("id" = OrderId, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 404, description = "Unknown order", body = ErrorResponse)
    )
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.market.orders.get(id).await?))
}

/// Edit descriptive fields of a live order and optionally move its status
#[utoipa::path(
    put,
    path = "/api/v1/orders",
    tag = "Orders",
    security(("bearer_auth" = [])),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 400, description = "Nothing to update or invalid transition", body = ErrorResponse),
        (status = 403, description = "Not the order's creator", body = ErrorResponse),
        (status = 409, description = "Order is closed", body = ErrorResponse)
    )
)]
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<UpdateOrderRequest>,
) -> ApiResult<Json<Order>> {
    let id = field(request.order_id, "orderId")?;
    let order = state
        .market
        .orders
        .edit(user.actor(), id, &request.patch, request.status, request.message)
        .await?;
    Ok(Json(order))
}

/// Admin hard delete
#[utoipa::path(
    delete,
    path = "/api/v1/orders",
    tag = "Orders",
    security(("bearer_auth" = [])),
    request_body = OrderIdRequest,
    responses(
        (status = 200, description = "Order deleted", body = MessageResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Unknown order", body = ErrorResponse)
    )
)]
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<OrderIdRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let id = field(request.order_id, "orderId")?;
    state.market.orders.delete(user.actor(), id).await?;
    Ok(Json(MessageResponse::new("Order deleted")))
}

/// Move an order along its lifecycle
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(("id" = OrderId, Path, description = "Order id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status changed", body = Order),
        (status = 400, description = "Invalid transition", body = ErrorResponse),
        (status = 403, description = "Not a party to the order", body = ErrorResponse)
    )
)]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    JsonBody(request): JsonBody<StatusRequest>,
) -> ApiResult<Json<Order>> {
    let status = field(request.status, "status")?;
    let order = state
        .market
        .orders
        .update_status(user.actor(), id, status, request.message)
        .await?;
    Ok(Json(order))
}

/// Admin approval: published to bidding
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/approve",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(("id" = OrderId, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order open for bidding", body = Order),
        (status = 403, description = "Admin only", body = ErrorResponse)
    )
)]
pub async fn approve_order(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.market.orders.approve(user.actor(), id).await?))
}

/// Admin rejection: cancels the order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/reject",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(("id" = OrderId, Path, description = "Order id")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Order cancelled", body = Order),
        (status = 403, description = "Admin only", body = ErrorResponse)
    )
)]
pub async fn reject_order(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    request: Option<Json<RejectRequest>>,
) -> ApiResult<Json<Order>> {
    let reason = request.and_then(|Json(r)| r.reason);
    Ok(Json(state.market.orders.reject(user.actor(), id, reason).await?))
}

/// Status changes, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/history",
    tag = "Orders",
    params(("id" = OrderId, Path, description = "Order id")),
    responses(
        (status = 200, description = "History", body = Vec<StatusUpdate>),
        (status = 404, description = "Unknown order", body = ErrorResponse)
    )
)]
pub async fn order_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<Vec<StatusUpdate>>> {
    Ok(Json(state.market.orders.history(id).await?))
}
