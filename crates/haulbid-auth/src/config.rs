//! Authentication configuration
//!
//! Every section deserializes with defaults so partial config files and
//! `HAULBID__AUTH__*` overrides work.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const BCRYPT_MIN_COST: u32 = 4;
const BCRYPT_MAX_COST: u32 = 31;

/// Main authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Password hashing configuration
    pub password: PasswordConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Password reset configuration
    pub reset: ResetConfig,
    /// Upper bound on any single account-store call
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    /// Code required to register an admin. Admin registration fails closed when unset.
    pub admin_registration_code: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            password: PasswordConfig::default(),
            rate_limit: RateLimitConfig::default(),
            reset: ResetConfig::default(),
            store_timeout: Duration::from_secs(10),
            admin_registration_code: None,
        }
    }
}

/// JWT token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Secret key for signing tokens (at least 256 bits)
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub token_lifetime: Duration,
    /// Token issuer claim
    pub issuer: String,
    /// Token audience claim
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(), // Must be set
            token_lifetime: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            issuer: "haulbid".to_string(),
            audience: "haulbid-api".to_string(),
        }
    }
}

/// Password hashing configuration (bcrypt)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub bcrypt_cost: u32,
    /// Minimum password length, registration and reset alike
    pub min_length: usize,
    /// bcrypt ignores input past 72 bytes
    pub max_length: usize,
    /// Upper bound on a single hash or verify
    #[serde(with = "humantime_serde")]
    pub verify_timeout: Duration,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 10,
            min_length: 8,
            max_length: 72,
            verify_timeout: Duration::from_secs(3),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Failed logins allowed per identifier per window
    pub login_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub login_window: Duration,
    /// Registrations allowed per source IP per window
    pub registration_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub registration_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login_attempts: 5,
            login_window: Duration::from_secs(15 * 60),
            registration_attempts: 3,
            registration_window: Duration::from_secs(30 * 60),
        }
    }
}

/// Password reset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Random bytes per reset token
    pub token_bytes: usize,
    #[serde(with = "humantime_serde")]
    pub token_lifetime: Duration,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            token_bytes: 32, // 256 bits
            token_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

impl AuthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.jwt.secret.is_empty() {
            errors.push("JWT secret must be set".to_string());
        } else if self.jwt.secret.len() < 32 {
            errors.push("JWT secret should be at least 256 bits (32 bytes)".to_string());
        }

        if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&self.password.bcrypt_cost) {
            errors.push(format!(
                "bcrypt cost must be between {} and {}",
                BCRYPT_MIN_COST, BCRYPT_MAX_COST
            ));
        }
        if self.password.min_length == 0 || self.password.min_length > self.password.max_length {
            errors.push("Password length bounds are inconsistent".to_string());
        }

        if self.reset.token_bytes < 16 {
            errors.push("Reset token should be at least 128 bits (16 bytes)".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
