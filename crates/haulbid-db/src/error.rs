//! Database error types

use thiserror::Error;

use haulbid_types::DomainError;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[source] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// The row changed under us, or is not in the state the write requires
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Store could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::Connection(_) | DbError::Redis(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => DbError::Timeout("waiting for a database connection".into()),
            sqlx::Error::Io(io) => DbError::Connection(io.to_string()),
            sqlx::Error::PoolClosed => DbError::Connection("connection pool closed".into()),
            sqlx::Error::Tls(tls) => DbError::Connection(tls.to_string()),
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                DbError::Duplicate(db_err.constraint().unwrap_or("unique").to_string())
            }
            other => DbError::Query(other),
        }
    }
}

impl From<deadpool_redis::PoolError> for DbError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        DbError::Redis(e.to_string())
    }
}

impl From<redis::RedisError> for DbError {
    fn from(e: redis::RedisError) -> Self {
        DbError::Redis(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<DomainError> for DbError {
    fn from(e: DomainError) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for DbError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DbError::Timeout("store operation exceeded its deadline".into())
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::Timeout(_)
        ));
    }

    #[test]
    fn test_pool_closed_is_unavailable() {
        let err = DbError::from(sqlx::Error::PoolClosed);
        assert!(err.is_unavailable());
        assert!(!DbError::NotFound("order".into()).is_unavailable());
    }
}
