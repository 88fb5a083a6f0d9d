//! HaulBid Database Layer
//!
//! Persistence for the marketplace: accounts, orders with their status
//! history, bids, ratings, reviews and notifications.
//!
//! # Backends
//!
//! - **PostgreSQL**: primary store, migrations under `migrations/`
//! - **Memory**: a single-process store with identical semantics
//! - **Redis** (optional): rate-limit counters shared across instances
//!
//! Callers see only the repository traits in [`repos`]; the backend is
//! picked once at startup.

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod repos;

use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::{Config as RedisConfig, Pool as RedisPool, Runtime};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use cache::CacheManager;
pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use repos::*;

/// Repository handles plus the pools behind them
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL pool, absent for the memory backend
    pub pg: Option<PgPool>,
    /// Redis pool, present when a Redis URL is configured
    pub redis: Option<RedisPool>,
    accounts: Arc<dyn AccountRepository>,
    orders: Arc<dyn OrderRepository>,
    bids: Arc<dyn BidRepository>,
    ratings: Arc<dyn RatingRepository>,
    reviews: Arc<dyn ReviewRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl Database {
    /// Connect to PostgreSQL and, when configured, Redis
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        let redis = Self::connect_redis(config).await?;

        Ok(Self {
            accounts: Arc::new(PgAccountRepo::new(pg.clone())),
            orders: Arc::new(PgOrderRepo::new(pg.clone())),
            bids: Arc::new(PgBidRepo::new(pg.clone())),
            ratings: Arc::new(PgRatingRepo::new(pg.clone())),
            reviews: Arc::new(PgReviewRepo::new(pg.clone())),
            notifications: Arc::new(PgNotificationRepo::new(pg.clone())),
            pg: Some(pg),
            redis,
        })
    }

    /// Memory backend. Redis is still used for counters when configured.
    pub async fn in_memory(config: Option<&DatabaseConfig>) -> DbResult<Self> {
        let redis = match config {
            Some(config) => Self::connect_redis(config).await?,
            None => None,
        };
        let store = Arc::new(MemoryStore::new());
        info!("Using in-memory store");

        Ok(Self {
            pg: None,
            redis,
            accounts: store.clone(),
            orders: store.clone(),
            bids: store.clone(),
            ratings: store.clone(),
            reviews: store.clone(),
            notifications: store,
        })
    }

    async fn connect_redis(config: &DatabaseConfig) -> DbResult<Option<RedisPool>> {
        let (Some(url), Some(masked)) = (config.redis_url.as_deref(), config.redis_url_masked())
        else {
            return Ok(None);
        };
        info!("Connecting to Redis: {}", masked);

        let redis = RedisConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| DbError::Connection(format!("Redis: {}", e)))?;

        CacheManager::new(redis.clone())
            .ping()
            .await
            .map_err(|e| DbError::Connection(format!("Redis ping: {}", e)))?;

        info!("Connected to Redis");
        Ok(Some(redis))
    }

    /// Run database migrations. No-op for the memory backend.
    pub async fn migrate(&self) -> DbResult<()> {
        let Some(pg) = &self.pg else {
            return Ok(());
        };
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Probe every configured backend
    pub async fn health_check(&self) -> HealthStatus {
        let postgres = match &self.pg {
            Some(pg) => sqlx::query("SELECT 1").fetch_one(pg).await.is_ok(),
            None => true,
        };
        let redis = match self.cache() {
            Some(cache) => cache.ping().await.is_ok(),
            None => true,
        };

        HealthStatus {
            postgres,
            redis,
            healthy: postgres && redis,
        }
    }

    pub fn backend(&self) -> &'static str {
        if self.pg.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    pub fn accounts(&self) -> Arc<dyn AccountRepository> {
        self.accounts.clone()
    }

    pub fn orders(&self) -> Arc<dyn OrderRepository> {
        self.orders.clone()
    }

    pub fn bids(&self) -> Arc<dyn BidRepository> {
        self.bids.clone()
    }

    pub fn ratings(&self) -> Arc<dyn RatingRepository> {
        self.ratings.clone()
    }

    pub fn reviews(&self) -> Arc<dyn ReviewRepository> {
        self.reviews.clone()
    }

    pub fn notifications(&self) -> Arc<dyn NotificationRepository> {
        self.notifications.clone()
    }

    pub fn cache(&self) -> Option<CacheManager> {
        self.redis.clone().map(CacheManager::new)
    }
}

/// Health status of the configured backends
#[derive(Debug, Clone, Copy)]
pub struct HealthStatus {
    pub postgres: bool,
    pub redis: bool,
    pub healthy: bool,
}
