//! API error handling
//!
//! Every failure leaves the API as `{code, msg}` JSON with the status from
//! the originating layer. Server-side failures are logged in full and
//! rendered with a generic message.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use haulbid_auth::AuthError;
use haulbid_marketplace::MarketError;
use haulbid_types::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Layer Errors
    // =========================================================================
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Market(#[from] MarketError),

    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Body or query could not be decoded
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Validation error: {0}")]
    Validation(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn missing(fields: &[&str]) -> Self {
        Self::MissingFields(fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Auth(e) => e.status_code(),
            Self::Market(e) => e.status_code(),
            Self::BadRequest(_) | Self::MissingFields(_) | Self::Validation(_) => 400,
            Self::Internal(_) => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.error_code(),
            Self::Market(e) => e.error_code(),
            Self::BadRequest(_) => "INVALID_REQUEST",
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand to clients
    pub fn client_message(&self) -> String {
        match self {
            Self::Auth(e) => e.client_message(),
            Self::Market(MarketError::Database(_)) | Self::Internal(_) => {
                "An internal error occurred".to_string()
            }
            Self::Market(MarketError::Timeout(_)) => "The request timed out, please retry".to_string(),
            Self::Market(MarketError::Unavailable(_)) => "Service temporarily unavailable".to_string(),
            e => e.to_string(),
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Auth(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub msg: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.error_code().to_string(),
            msg: err.client_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }

        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();

        if let Some(retry_after) = self.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Market(MarketError::Domain(err))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.as_ref().map(|m| m.as_ref()).unwrap_or("invalid")
                    )
                })
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join(", "))
    }
}
