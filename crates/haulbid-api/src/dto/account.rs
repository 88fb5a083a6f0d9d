//! Account administration DTOs

use haulbid_types::{AccountId, AccountPatch};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub user_id: Option<AccountId>,
    #[serde(flatten)]
    pub patch: AccountPatch,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    pub user_id: Option<AccountId>,
}
