//! Marketplace error types

use haulbid_db::DbError;
use haulbid_types::DomainError;
use thiserror::Error;

pub type MarketResult<T> = Result<T, MarketError>;

#[derive(Debug, Error)]
pub enum MarketError {
    // ========================================================================
    // Client Errors
    // ========================================================================
    /// Input or lifecycle rule violated
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Target is not in a state that allows the operation
    #[error("Conflict: {0}")]
    Conflict(String),

    // ========================================================================
    // Store Errors
    // ========================================================================
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl MarketError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Domain(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unavailable(_) => 503,
            Self::Timeout(_) => 504,
            Self::Database(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Domain(e) => e.error_code(),
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Timeout(_) => "UPSTREAM_TIMEOUT",
            Self::Unavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::Database(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DbError> for MarketError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => Self::NotFound(what),
            DbError::Duplicate(what) | DbError::Conflict(what) => Self::Conflict(what),
            DbError::Timeout(what) => Self::Timeout(what),
            e if e.is_unavailable() => Self::Unavailable(e.to_string()),
            e => Self::Database(e.to_string()),
        }
    }
}
