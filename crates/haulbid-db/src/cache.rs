//! Redis-backed counters
//!
//! Sliding-window attempt logs shared by every server instance. Each window
//! is a sorted set of attempt timestamps (milliseconds) under
//! [`keys::RATE_LIMIT`], trimmed and appended in one `MULTI` block so
//! concurrent callers on any instance see distinct counts.

use std::time::Duration;

use chrono::Utc;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::Pool as RedisPool;
use uuid::Uuid;

use crate::error::DbResult;

/// Key prefixes
pub mod keys {
    pub const RATE_LIMIT: &str = "rate:";
}

#[derive(Clone)]
pub struct CacheManager {
    pool: RedisPool,
}

fn window_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX).max(1)
}

impl CacheManager {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn rate_key(identifier: &str) -> String {
        format!("{}{}", keys::RATE_LIMIT, identifier)
    }

    /// Append an attempt to the window for `identifier` and return how many
    /// attempts the window now holds, this one included
    pub async fn rate_limit_push(&self, identifier: &str, window: Duration) -> DbResult<u64> {
        let mut conn = self.pool.get().await?;
        let key = Self::rate_key(identifier);
        let now = Utc::now().timestamp_millis();
        let window_ms = window_millis(window);
        let member = format!("{}-{}", now, Uuid::new_v4().simple());

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(&key, "-inf", now - window_ms)
            .ignore()
            .zadd(&key, member, now)
            .ignore()
            .zcard(&key)
            .pexpire(&key, window_ms)
            .ignore()
            .query_async(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Drop the newest attempt for `identifier`
    pub async fn rate_limit_pop(&self, identifier: &str) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        let _: Vec<(String, f64)> = conn.zpopmax(Self::rate_key(identifier), 1).await?;
        Ok(())
    }

    /// Attempts inside the window and milliseconds until the oldest one leaves it
    pub async fn rate_limit_usage(
        &self,
        identifier: &str,
        window: Duration,
    ) -> DbResult<(u64, u64)> {
        let mut conn = self.pool.get().await?;
        let key = Self::rate_key(identifier);
        let now = Utc::now().timestamp_millis();
        let window_ms = window_millis(window);
        let floor = format!("({}", now - window_ms);

        let count: u64 = conn.zcount(&key, &floor, "+inf").await?;
        let oldest: Vec<(String, i64)> = conn
            .zrangebyscore_limit_withscores(&key, &floor, "+inf", 0, 1)
            .await?;
        let resets_in = oldest
            .first()
            .map(|(_, at)| u64::try_from(at + window_ms - now).unwrap_or(0))
            .unwrap_or(0);
        Ok((count, resets_in))
    }

    pub async fn rate_limit_reset(&self, identifier: &str) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        let _: i64 = conn.del(Self::rate_key(identifier)).await?;
        Ok(())
    }

    pub async fn ping(&self) -> DbResult<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_key_prefix() {
        assert_eq!(CacheManager::rate_key("login:10.0.0.1"), "rate:login:10.0.0.1");
    }

    #[test]
    fn test_window_millis_never_zero() {
        assert_eq!(window_millis(Duration::from_secs(900)), 900_000);
        assert_eq!(window_millis(Duration::ZERO), 1);
    }
}
