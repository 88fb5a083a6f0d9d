//! Bid DTOs

use haulbid_types::{AccountId, BidDetails, BidId, BidPatch, OrderId};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBidRequest {
    pub order_id: Option<OrderId>,
    pub amount: Option<f64>,
    #[serde(flatten)]
    pub details: BidDetails,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBidRequest {
    pub bid_id: Option<BidId>,
    #[serde(flatten)]
    pub patch: BidPatch,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BidIdRequest {
    pub bid_id: Option<BidId>,
}

/// Accept or cancel acceptance of one bid on one order
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BidDecisionRequest {
    pub order_id: Option<OrderId>,
    pub bid_id: Option<BidId>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BidsQuery {
    /// Bidder
    pub user_id: Option<AccountId>,
    pub order_id: Option<OrderId>,
}
