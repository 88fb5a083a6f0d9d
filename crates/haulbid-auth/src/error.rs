//! Authentication error types
//!
//! Errors are designed to be:
//! - Informative for logging
//! - Safe for external exposure (login and reset never reveal whether an account exists)
//! - Convertible to HTTP status codes

use haulbid_db::DbError;
use haulbid_types::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    // =========================================================================
    // Token Errors
    // =========================================================================
    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is invalid (malformed, wrong signature, etc.)
    #[error("Invalid token")]
    InvalidToken,

    // =========================================================================
    // Credential Errors
    // =========================================================================
    /// Unknown identifier, inactive account or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Reset token unknown or past its expiry
    #[error("Invalid or expired reset token")]
    InvalidOrExpiredResetToken,

    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("{0}")]
    Validation(String),

    /// Password does not meet requirements
    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    // =========================================================================
    // Registration Errors
    // =========================================================================
    #[error("An account with this username or email already exists")]
    DuplicateAccount,

    #[error("Invalid admin registration code")]
    AdminCodeMismatch,

    /// Admin registration is attempted but no code is configured
    #[error("Admin registration is not configured")]
    AdminCodeNotConfigured,

    // =========================================================================
    // Rate Limiting Errors
    // =========================================================================
    /// Rate limit exceeded
    #[error("Too many attempts, try again in {retry_after} seconds")]
    RateLimitExceeded {
        /// Seconds until the rate limit resets
        retry_after: u64,
    },

    // =========================================================================
    // Permission Errors
    // =========================================================================
    /// User is not authenticated
    #[error("Authentication required")]
    Unauthenticated,

    /// User does not have required permissions
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Token is valid but its account was deactivated or deleted
    #[error("Account is disabled")]
    AccountDisabled,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// A store call or password check exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Account or counter store unreachable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Password hashing failed
    #[error("Password hashing failed")]
    PasswordHashingFailed,

    /// Internal error (should not be exposed to clients)
    #[error("Internal error")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Validation(_) | Self::WeakPassword(_) | Self::InvalidOrExpiredResetToken => 400,

            // 401 Unauthorized
            Self::TokenExpired
            | Self::InvalidToken
            | Self::InvalidCredentials
            | Self::Unauthenticated
            | Self::AccountDisabled => 401,

            // 403 Forbidden
            Self::AdminCodeMismatch | Self::InsufficientPermissions => 403,

            // 404 Not Found
            Self::UserNotFound => 404,

            // 409 Conflict
            Self::DuplicateAccount => 409,

            // 429 Too Many Requests
            Self::RateLimitExceeded { .. } => 429,

            // 503 / 504
            Self::Unavailable(_) => 503,
            Self::Timeout(_) => 504,

            // 500 Internal Server Error
            Self::AdminCodeNotConfigured
            | Self::Database(_)
            | Self::PasswordHashingFailed
            | Self::Internal(_) => 500,
        }
    }

    /// Get an error code for the client (safe to expose)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidOrExpiredResetToken => "INVALID_OR_EXPIRED_TOKEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::DuplicateAccount => "DUPLICATE_ACCOUNT",
            Self::AdminCodeMismatch => "FORBIDDEN",
            Self::AdminCodeNotConfigured => "NOT_CONFIGURED",
            Self::RateLimitExceeded { .. } => "RATE_LIMITED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InsufficientPermissions => "FORBIDDEN",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::Timeout(_) => "UPSTREAM_TIMEOUT",
            Self::Unavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::Database(_) => "INTERNAL_ERROR",
            Self::PasswordHashingFailed => "INTERNAL_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Get safe message for client (doesn't leak internal details)
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::PasswordHashingFailed => {
                "An internal error occurred".to_string()
            }
            Self::Timeout(_) => "The request timed out, please retry".to_string(),
            Self::Unavailable(_) => "Service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// Seconds a client should wait before retrying, if any
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Create a rate limit error with retry-after duration
    pub fn rate_limited(duration: std::time::Duration) -> Self {
        Self::RateLimitExceeded {
            retry_after: duration.as_secs().max(1),
        }
    }
}

/// Error response for API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub code: String,
    /// Error message (human-readable)
    pub msg: String,
    /// Retry-after in seconds (for rate limiting)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&AuthError> for ErrorResponse {
    fn from(error: &AuthError) -> Self {
        Self {
            code: error.error_code().to_string(),
            msg: error.client_message(),
            retry_after: error.retry_after(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(_) => Self::DuplicateAccount,
            DbError::NotFound(_) => Self::UserNotFound,
            DbError::Timeout(msg) => Self::Timeout(msg),
            e if e.is_unavailable() => Self::Unavailable(e.to_string()),
            e => Self::Database(e.to_string()),
        }
    }
}

impl From<DomainError> for AuthError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::AdminCodeMismatch.status_code(), 403);
        assert_eq!(AuthError::DuplicateAccount.status_code(), 409);
        assert_eq!(AuthError::RateLimitExceeded { retry_after: 60 }.status_code(), 429);
        assert_eq!(AuthError::Timeout("db".into()).status_code(), 504);
        assert_eq!(AuthError::Unavailable("db".into()).status_code(), 503);
        assert_eq!(AuthError::AdminCodeNotConfigured.status_code(), 500);
    }

    #[test]
    fn test_client_message_hides_internal_details() {
        let err = AuthError::Database("connection string with password".to_string());
        assert!(!err.client_message().contains("password"));
        assert_eq!(err.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_db_error_mapping() {
        assert!(matches!(
            AuthError::from(DbError::Duplicate("Email".into())),
            AuthError::DuplicateAccount
        ));
        assert!(matches!(
            AuthError::from(DbError::Timeout("pool".into())),
            AuthError::Timeout(_)
        ));
        assert!(matches!(
            AuthError::from(DbError::Connection("refused".into())),
            AuthError::Unavailable(_)
        ));
    }

    #[test]
    fn test_error_response() {
        let err = AuthError::RateLimitExceeded { retry_after: 60 };
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "RATE_LIMITED");
        assert_eq!(response.retry_after, Some(60));
    }
}
