//! Bid Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use haulbid_db::BidFilter;
use haulbid_types::{Bid, BidId, BidStats, Order, OrderId};

use crate::dto::{
    field, require, BidDecisionRequest, BidIdRequest, BidsQuery, CreateBidRequest,
    MessageResponse, OrderIdRequest, UpdateBidRequest,
};
use crate::error::ApiResult;
use crate::extractors::{JsonBody, QueryParams, RequireAuth};
use crate::state::AppState;

/// Place a bid (delivery companies only)
#[utoipa::path(
    post,
    path = "/api/v1/bids",
    tag = "Bids",
    security(("bearer_auth" = [])),
    request_body = CreateBidRequest,
    responses(
        (status = 201, description = "Bid placed", body = Bid),
        (status = 400, description = "Missing fields or invalid amount", body = ErrorResponse),
        (status = 403, description = "Caller is not a delivery company", body = ErrorResponse),
        (status = 409, description = "Order not open for bids", body = ErrorResponse)
    )
)]
pub async fn create_bid(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<CreateBidRequest>,
) -> ApiResult<(StatusCode, Json<Bid>)> {
    require(&[
        ("orderId", request.order_id.is_some()),
        ("amount", request.amount.is_some()),
    ])?;
    let order_id = field(request.order_id, "orderId")?;
    let amount = field(request.amount, "amount")?;

    let bid = state
        .market
        .bids
        .submit(user.actor(), order_id, amount, request.details)
        .await?;
    Ok((StatusCode::CREATED, Json(bid)))
}

/// Bids newest first, by bidder and/or order
#[utoipa::path(
    get,
    path = "/api/v1/bids",
    tag = "Bids",
    security(("bearer_auth" = [])),
    params(BidsQuery),
    responses(
        (status = 200, description = "Bids", body = Vec<Bid>)
    )
)]
pub async fn list_bids(
    State(state): State<Arc<AppState>>,
    RequireAuth(_user): RequireAuth,
    QueryParams(query): QueryParams<BidsQuery>,
) -> ApiResult<Json<Vec<Bid>>> {
    let filter = BidFilter {
        bidder_id: query.user_id,
        order_id: query.order_id,
    };
    Ok(Json(state.market.bids.list(filter).await?))
}

/// Edit a pending bid
#[utoipa::path(
    put,
    path = "/api/v1/bids",
    tag = "Bids",
    security(("bearer_auth" = [])),
    request_body = UpdateBidRequest,
    responses(
        (status = 200, description = "Bid updated", body = Bid),
        (status = 409, description = "Bid is no longer pending", body = ErrorResponse)
    )
)]
pub async fn update_bid(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<UpdateBidRequest>,
) -> ApiResult<Json<Bid>> {
    let id = field(request.bid_id, "bidId")?;
    let bid = state
        .market
        .bids
        .update(user.actor(), id, &request.patch)
        .await?;
    Ok(Json(bid))
}

#[utoipa::path(
    delete,
    path = "/api/v1/bids",
    tag = "Bids",
    security(("bearer_auth" = [])),
    request_body = BidIdRequest,
    responses(
        (status = 200, description = "Bid deleted", body = MessageResponse),
        (status = 404, description = "Unknown bid", body = ErrorResponse),
        (status = 409, description = "Bid is accepted", body = ErrorResponse)
    )
)]
pub async fn delete_bid(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<BidIdRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let id = field(request.bid_id, "bidId")?;
    state.market.bids.delete(user.actor(), id).await?;
    Ok(Json(MessageResponse::new("Bid deleted")))
}

/// Accept one bid: siblings are rejected and the order assigned atomically
#[utoipa::path(
    post,
    path = "/api/v1/bids/accept",
    tag = "Bids",
    security(("bearer_auth" = [])),
    request_body = BidDecisionRequest,
    responses(
        (status = 200, description = "Order assigned", body = Order),
        (status = 409, description = "Order or bid no longer in an acceptable state", body = ErrorResponse)
    )
)]
pub async fn accept_bid(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<BidDecisionRequest>,
) -> ApiResult<Json<Order>> {
    let (order_id, bid_id) = decision(request)?;
    let order = state
        .market
        .bids
        .accept(user.actor(), order_id, bid_id)
        .await?;
    Ok(Json(order))
}

/// Undo an acceptance and reopen bidding
#[utoipa::path(
    post,
    path = "/api/v1/bids/cancel-acceptance",
    tag = "Bids",
    security(("bearer_auth" = [])),
    request_body = BidDecisionRequest,
    responses(
        (status = 200, description = "Order back to bidding", body = Order),
        (status = 409, description = "Bid is not the accepted bid", body = ErrorResponse)
    )
)]
pub async fn cancel_acceptance(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<BidDecisionRequest>,
) -> ApiResult<Json<Order>> {
    let (order_id, bid_id) = decision(request)?;
    let order = state
        .market
        .bids
        .cancel_acceptance(user.actor(), order_id, bid_id)
        .await?;
    Ok(Json(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/bids/withdraw",
    tag = "Bids",
    security(("bearer_auth" = [])),
    request_body = BidIdRequest,
    responses(
        (status = 200, description = "Bid withdrawn (or already closed)", body = Bid),
        (status = 404, description = "Unknown bid", body = ErrorResponse)
    )
)]
pub async fn withdraw_bid(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<BidIdRequest>,
) -> ApiResult<Json<Bid>> {
    let id = field(request.bid_id, "bidId")?;
    Ok(Json(state.market.bids.withdraw(user.actor(), id).await?))
}

/// Min, max and average over an order's live bids
#[utoipa::path(
    get,
    path = "/api/v1/bids/stats",
    tag = "Bids",
    params(("orderId" = OrderId, Query, description = "Order id")),
    responses(
        (status = 200, description = "Price statistics", body = BidStats),
        (status = 404, description = "Unknown order", body = ErrorResponse)
    )
)]
pub async fn bid_stats(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<OrderIdRequest>,
) -> ApiResult<Json<BidStats>> {
    let order_id = field(query.order_id, "orderId")?;
    Ok(Json(state.market.bids.stats(order_id).await?))
}

fn decision(request: BidDecisionRequest) -> ApiResult<(OrderId, BidId)> {
    require(&[
        ("orderId", request.order_id.is_some()),
        ("bidId", request.bid_id.is_some()),
    ])?;
    Ok((
        field(request.order_id, "orderId")?,
        field(request.bid_id, "bidId")?,
    ))
}
