//! Platform analytics

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Headline counts for the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_orders: u64,
    pub total_bids: u64,
}
