//! Rating, review and notification DTOs

use haulbid_types::{AccountId, CategoryScores, OrderId};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub order_id: Option<OrderId>,
    /// Rated delivery company
    pub owner_id: Option<AccountId>,
    pub rating: Option<i64>,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub categories: CategoryScores,
    #[serde(default)]
    pub is_recommended: bool,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub owner_id: Option<AccountId>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[validate(length(max = 128, message = "itemId must be at most 128 characters"))]
    pub item_id: Option<String>,
    pub review: Option<String>,
    /// 1-5, defaults to 5
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsQuery {
    pub item_id: Option<String>,
}
