//! HaulBid Identity Layer
//!
//! - **Registration**: validated usernames/emails, bcrypt hashes, admin code gate
//! - **Login**: JWT bearer tokens (7 day lifetime) with per-identifier rate limiting
//! - **Password reset**: single-use random tokens stored as SHA-256 digests
//! - **Middleware**: bearer validation and role extractors for axum
//!
//! ```text
//! Request → AuthLayer → Handler (RequireAuth / RequireAdmin)
//!                │
//!                ▼
//!      IdentityService::authenticate → JwtService + AccountRepository
//!
//! IdentityService → RateLimiter → RateLimitStore (memory | redis)
//!        │        → PasswordService (bcrypt, bounded)
//!        │        → AccountRepository (bounded)
//!        └──────→ AuditSink
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod types;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, ErrorResponse};
pub use identity::{IdentityService, LoginSession, Registration, ResetIssued};
pub use jwt::JwtService;
pub use middleware::{AuthLayer, AuthMiddleware, OptionalUser, RequireAdmin, RequireAuth};
pub use password::PasswordService;
pub use rate_limit::{
    extract_client_ip, MemoryRateLimitStore, RateLimitStore, RateLimiter, RedisRateLimitStore,
};
pub use types::*;
