//! Domain validation errors
//!
//! Raised by the pure domain layer before anything is persisted.

use thiserror::Error;

use crate::order::OrderStatus;

/// Result type for domain validation
pub type Result<T> = std::result::Result<T, DomainError>;

/// Errors produced by domain validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    // ========================================================================
    // Input Errors
    // ========================================================================

    /// One or more required fields are absent
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// Malformed input
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Bid amount must be strictly positive
    #[error("Bid amount must be greater than zero, got {0}")]
    InvalidAmount(f64),

    /// Score outside 1..=5
    #[error("{field} must be between 1 and 5, got {value}")]
    OutOfRange { field: String, value: i64 },

    /// Free text exceeds its bound
    #[error("{field} exceeds {max} characters ({actual})")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================

    /// Requested status change is not an edge of the order state machine
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl DomainError {
    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an out of range error
    pub fn out_of_range(field: impl Into<String>, value: i64) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value,
        }
    }

    /// Get error code for logging and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::TooLong { .. } => "TOO_LONG",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

/// Check a free-text field against a character bound
pub fn ensure_max_chars(field: &str, value: &str, max: usize) -> Result<()> {
    let actual = value.chars().count();
    if actual > max {
        return Err(DomainError::TooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

/// Check a 1-5 score
pub fn ensure_score(field: &str, value: i64) -> Result<u8> {
    if (1..=5).contains(&value) {
        Ok(value as u8)
    } else {
        Err(DomainError::out_of_range(field, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DomainError::MissingFields(vec!["title".into()]).error_code(),
            "MISSING_FIELDS"
        );
        assert_eq!(DomainError::InvalidAmount(0.0).error_code(), "INVALID_AMOUNT");
        assert_eq!(
            DomainError::out_of_range("rating", 6).error_code(),
            "OUT_OF_RANGE"
        );
    }

    #[test]
    fn test_missing_fields_message() {
        let err = DomainError::MissingFields(vec!["title".into(), "weight".into()]);
        assert_eq!(err.to_string(), "Missing required fields: title, weight");
    }

    #[test]
    fn test_ensure_max_chars_counts_chars() {
        assert!(ensure_max_chars("review", &"é".repeat(1000), 1000).is_ok());
        let err = ensure_max_chars("review", &"a".repeat(1001), 1000).unwrap_err();
        assert_eq!(
            err,
            DomainError::TooLong {
                field: "review".into(),
                max: 1000,
                actual: 1001
            }
        );
    }

    #[test]
    fn test_ensure_score() {
        assert_eq!(ensure_score("rating", 1).unwrap(), 1);
        assert_eq!(ensure_score("rating", 5).unwrap(), 5);
        assert!(ensure_score("rating", 0).is_err());
        assert!(ensure_score("rating", 6).is_err());
    }
}
