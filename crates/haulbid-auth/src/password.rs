//! Password Service
//!
//! bcrypt hashing on the blocking pool. Both hashing and verification are
//! raced against `verify_timeout` and fail with [`AuthError::Timeout`]
//! instead of holding the request.

use std::time::Duration;

use crate::config::PasswordConfig;
use crate::error::{AuthError, AuthResult};

/// Password service for hashing and verification
#[derive(Clone)]
pub struct PasswordService {
    config: PasswordConfig,
}

impl PasswordService {
    /// Create a new password service
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    /// Validate strength, then hash
    pub async fn hash(&self, password: &str) -> AuthResult<String> {
        self.validate_strength(password)?;

        let password = password.to_string();
        let cost = self.config.bcrypt_cost;
        run_bounded(self.config.verify_timeout, "password hashing", move || {
            bcrypt::hash(password, cost).map_err(|e| {
                tracing::error!(error = %e, "bcrypt hashing failed");
                AuthError::PasswordHashingFailed
            })
        })
        .await
    }

    /// Verify a password against a stored hash. A malformed hash never matches.
    pub async fn verify(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        run_bounded(self.config.verify_timeout, "password verification", move || {
            Ok(bcrypt::verify(password, &hash).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored password hash is unreadable");
                false
            }))
        })
        .await
    }

    /// Validate password length
    pub fn validate_strength(&self, password: &str) -> AuthResult<()> {
        let length = password.chars().count();
        if length < self.config.min_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.config.min_length
            )));
        }
        if password.len() > self.config.max_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at most {} bytes",
                self.config.max_length
            )));
        }
        Ok(())
    }
}

async fn run_bounded<T, F>(limit: Duration, what: &str, work: F) -> AuthResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AuthResult<T> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(AuthError::Internal(format!("{} task failed: {}", what, join))),
        Err(_) => {
            tracing::warn!(limit_ms = limit.as_millis() as u64, "{} timed out", what);
            Err(AuthError::Timeout(what.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> PasswordService {
        PasswordService::new(PasswordConfig {
            bcrypt_cost: 4,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let service = test_service();
        let hash = service.hash("correct horse").await.unwrap();

        assert!(hash.starts_with("$2"));
        assert!(service.verify("correct horse", &hash).await.unwrap());
        assert!(!service.verify("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let service = test_service();
        assert!(matches!(
            service.hash("short").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(service.validate_strength("12345678").is_ok());
        assert!(service.validate_strength("1234567").is_err());
    }

    #[tokio::test]
    async fn test_malformed_hash_never_matches() {
        let service = test_service();
        assert!(!service.verify("anything", "not-a-bcrypt-hash").await.unwrap());
    }

    #[tokio::test]
    async fn test_verification_deadline() {
        let result: AuthResult<()> = run_bounded(Duration::from_millis(10), "slow check", || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AuthError::Timeout(_))));
    }
}
