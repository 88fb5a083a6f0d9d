//! Order DTOs

use haulbid_types::{AccountId, OrderId, OrderPatch, OrderStatus};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OrdersQuery {
    /// Only this account's orders
    pub owner_id: Option<AccountId>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub order_id: Option<OrderId>,
    /// Lifecycle move applied after the field edits
    pub status: Option<OrderStatus>,
    /// Note recorded with the status move
    pub message: Option<String>,
    #[serde(flatten)]
    pub patch: OrderPatch,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdRequest {
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: Option<OrderStatus>,
    /// Free-text note recorded in the history
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: Option<String>,
}
