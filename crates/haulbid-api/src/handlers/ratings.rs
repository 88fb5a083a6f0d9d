//! Rating and review handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use haulbid_types::{Rating, RatingSubmission, RatingSummary, Review};

use crate::dto::{field, filled, require, OwnerQuery, RatingRequest, ReviewRequest, ReviewsQuery};
use crate::error::ApiResult;
use crate::extractors::{JsonBody, QueryParams, RequireAuth, ValidatedJson};
use crate::state::AppState;

/// Rate the company that delivered an order. Resubmitting revises the rating.
#[utoipa::path(
    post,
    path = "/api/v1/ratings",
    tag = "Ratings",
    security(("bearer_auth" = [])),
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Rating stored", body = Rating),
        (status = 400, description = "Out of range, too long or order not delivered", body = ErrorResponse),
        (status = 403, description = "Not the order's creator", body = ErrorResponse)
    )
)]
pub async fn submit_rating(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    JsonBody(request): JsonBody<RatingRequest>,
) -> ApiResult<Json<Rating>> {
    require(&[
        ("orderId", request.order_id.is_some()),
        ("ownerId", request.owner_id.is_some()),
        ("rating", request.rating.is_some()),
    ])?;
    let submission = RatingSubmission {
        order_id: field(request.order_id, "orderId")?,
        user_id: user.account_id,
        owner_id: field(request.owner_id, "ownerId")?,
        rating: field(request.rating, "rating")?,
        review: request.review,
        categories: request.categories,
        is_recommended: request.is_recommended,
    };
    Ok(Json(state.market.ratings.submit(user.actor(), submission).await?))
}

/// Every rating of one company, newest first
#[utoipa::path(
    get,
    path = "/api/v1/ratings",
    tag = "Ratings",
    params(OwnerQuery),
    responses(
        (status = 200, description = "Ratings", body = Vec<Rating>)
    )
)]
pub async fn list_ratings(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<OwnerQuery>,
) -> ApiResult<Json<Vec<Rating>>> {
    let owner = field(query.owner_id, "ownerId")?;
    Ok(Json(state.market.ratings.list(owner).await?))
}

/// Derived reputation summary
#[utoipa::path(
    get,
    path = "/api/v1/ratings/summary",
    tag = "Ratings",
    params(OwnerQuery),
    responses(
        (status = 200, description = "Summary, zeroed without ratings", body = RatingSummary)
    )
)]
pub async fn rating_summary(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<OwnerQuery>,
) -> ApiResult<Json<RatingSummary>> {
    let owner = field(query.owner_id, "ownerId")?;
    Ok(Json(state.market.ratings.summarize(owner).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    tag = "Reviews",
    security(("bearer_auth" = [])),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review stored", body = Review),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse)
    )
)]
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    ValidatedJson(request): ValidatedJson<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    require(&[
        ("itemId", filled(&request.item_id)),
        ("review", filled(&request.review)),
    ])?;
    let item_id = field(request.item_id, "itemId")?;
    let text = field(request.review, "review")?;

    let review = state
        .market
        .reviews
        .submit(user.account_id, &item_id, &text, request.rating)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews",
    tag = "Reviews",
    params(ReviewsQuery),
    responses(
        (status = 200, description = "Reviews newest first", body = Vec<Review>),
        (status = 400, description = "itemId missing", body = ErrorResponse)
    )
)]
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ReviewsQuery>,
) -> ApiResult<Json<Vec<Review>>> {
    let item_id = query.item_id.unwrap_or_default();
    Ok(Json(state.market.reviews.list(&item_id).await?))
}
