//! Shared DTOs and helpers

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
    /// Present only on a reset request for a known email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reset_token: None,
        }
    }
}

/// Fail with every absent field named at once
pub fn require(fields: &[(&str, bool)]) -> ApiResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::missing(&missing))
    }
}

/// Unwrap a field already checked by [`require`]
pub fn field<T>(value: Option<T>, name: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::missing(&[name]))
}

/// Present and not blank
pub fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_lists_all_missing() {
        let err = require(&[("orderId", false), ("amount", true), ("bidId", false)]).unwrap_err();
        match err {
            ApiError::MissingFields(fields) => assert_eq!(fields, vec!["orderId", "bidId"]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(require(&[("orderId", true)]).is_ok());
    }

    #[test]
    fn test_filled() {
        assert!(filled(&Some("x".into())));
        assert!(!filled(&Some("  ".into())));
        assert!(!filled(&None));
    }
}
