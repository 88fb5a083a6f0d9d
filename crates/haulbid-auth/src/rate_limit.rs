//! Rate Limiting
//!
//! Attempt counters behind the [`RateLimitStore`] abstraction:
//! - [`MemoryRateLimitStore`]: sliding window, single instance only
//! - [`RedisRateLimitStore`]: sliding window shared by every instance
//!
//! [`RateLimiter`] applies the configured limits per [`Scope`]. A caller
//! reserves its slot before doing any work, so concurrent attempts never
//! observe the same count.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use tokio::sync::RwLock;
use tokio::time::Instant;

use haulbid_db::CacheManager;

use crate::config::RateLimitConfig;
use crate::error::{AuthError, AuthResult};

/// Attempts recorded in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowUsage {
    pub count: u64,
    /// Time until the oldest counted attempt leaves the window
    pub resets_in: Duration,
}

/// Counter store keyed by `<scope>:<subject>`
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one attempt and return the count inside the window
    async fn increment(&self, key: &str, window: Duration) -> AuthResult<u64>;

    /// Undo the most recent `increment`
    async fn release(&self, key: &str) -> AuthResult<()>;

    async fn usage(&self, key: &str, window: Duration) -> AuthResult<WindowUsage>;

    async fn reset(&self, key: &str) -> AuthResult<()>;
}

/// In-process sliding window
#[derive(Default)]
pub struct MemoryRateLimitStore {
    attempts: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while entries
            .front()
            .is_some_and(|&t| now.duration_since(t) >= window)
        {
            entries.pop_front();
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn increment(&self, key: &str, window: Duration) -> AuthResult<u64> {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        let entries = attempts.entry(key.to_string()).or_default();
        Self::prune(entries, now, window);
        entries.push_back(now);
        Ok(entries.len() as u64)
    }

    async fn release(&self, key: &str) -> AuthResult<()> {
        let mut attempts = self.attempts.write().await;
        if let Some(entries) = attempts.get_mut(key) {
            entries.pop_back();
            if entries.is_empty() {
                attempts.remove(key);
            }
        }
        Ok(())
    }

    async fn usage(&self, key: &str, window: Duration) -> AuthResult<WindowUsage> {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        let Some(entries) = attempts.get_mut(key) else {
            return Ok(WindowUsage::default());
        };
        Self::prune(entries, now, window);

        let usage = match entries.front() {
            Some(&oldest) => WindowUsage {
                count: entries.len() as u64,
                resets_in: window.saturating_sub(now.duration_since(oldest)),
            },
            None => WindowUsage::default(),
        };
        if entries.is_empty() {
            attempts.remove(key);
        }
        Ok(usage)
    }

    async fn reset(&self, key: &str) -> AuthResult<()> {
        self.attempts.write().await.remove(key);
        Ok(())
    }
}

/// Redis sorted-set window
pub struct RedisRateLimitStore {
    cache: CacheManager,
}

impl RedisRateLimitStore {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn increment(&self, key: &str, window: Duration) -> AuthResult<u64> {
        Ok(self.cache.rate_limit_push(key, window).await?)
    }

    async fn release(&self, key: &str) -> AuthResult<()> {
        Ok(self.cache.rate_limit_pop(key).await?)
    }

    async fn usage(&self, key: &str, window: Duration) -> AuthResult<WindowUsage> {
        let (count, resets_in_ms) = self.cache.rate_limit_usage(key, window).await?;
        Ok(WindowUsage {
            count,
            resets_in: Duration::from_millis(resets_in_ms),
        })
    }

    async fn reset(&self, key: &str) -> AuthResult<()> {
        Ok(self.cache.rate_limit_reset(key).await?)
    }
}

/// What an attempt counter is tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Failed logins per identifier
    Login,
    /// Successful registrations per source IP
    Registration,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Registration => "register",
        }
    }

    fn key(&self, subject: &str) -> String {
        format!("{}:{}", self.as_str(), subject)
    }
}

/// Applies the configured limits to a [`RateLimitStore`]
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    fn limits(&self, scope: Scope) -> (u64, Duration) {
        match scope {
            Scope::Login => (
                u64::from(self.config.login_attempts),
                self.config.login_window,
            ),
            Scope::Registration => (
                u64::from(self.config.registration_attempts),
                self.config.registration_window,
            ),
        }
    }

    /// Take one slot for `subject`, failing with `RateLimitExceeded` once the
    /// window is full. Denied attempts do not occupy a slot.
    pub async fn reserve(&self, scope: Scope, subject: &str) -> AuthResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let (limit, window) = self.limits(scope);
        let key = scope.key(subject);
        if self.store.increment(&key, window).await? <= limit {
            return Ok(());
        }
        self.store.release(&key).await?;
        let usage = self.store.usage(&key, window).await?;
        Err(AuthError::rate_limited(usage.resets_in))
    }

    /// Give back a slot taken by [`reserve`](Self::reserve)
    pub async fn release(&self, scope: Scope, subject: &str) -> AuthResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        self.store.release(&scope.key(subject)).await
    }

    /// Forget every attempt for `subject`
    pub async fn clear(&self, scope: Scope, subject: &str) -> AuthResult<()> {
        self.store.reset(&scope.key(subject)).await
    }
}

/// Best-effort client address from proxy headers, then the peer
pub fn extract_client_ip(headers: &HeaderMap, peer_addr: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let forwarded_for = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    // Priority: CF > X-Real-IP > X-Forwarded-For > peer addr
    header("CF-Connecting-IP")
        .or_else(|| header("X-Real-IP"))
        .or(forwarded_for)
        .or_else(|| peer_addr.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
