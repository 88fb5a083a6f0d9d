//! Application state shared across handlers

use std::sync::Arc;

use haulbid_audit::AuditSink;
use haulbid_auth::{
    AuthConfig, IdentityService, MemoryRateLimitStore, RateLimitStore, RedisRateLimitStore,
};
use haulbid_db::Database;
use haulbid_marketplace::{Marketplace, MarketplaceConfig};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub identity: Arc<IdentityService>,
    pub market: Arc<Marketplace>,
}

impl AppState {
    pub fn new(db: Arc<Database>, identity: Arc<IdentityService>, market: Arc<Marketplace>) -> Self {
        Self {
            db,
            identity,
            market,
        }
    }

    /// Wire every service to `db`. Rate-limit counters go to Redis when the
    /// database has a cache configured, otherwise they stay in process.
    pub fn assemble(
        db: Database,
        auth: AuthConfig,
        market: &MarketplaceConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let rate_limits: Arc<dyn RateLimitStore> = match db.cache() {
            Some(cache) => {
                tracing::info!("Rate limits backed by Redis");
                Arc::new(RedisRateLimitStore::new(cache))
            }
            None => {
                tracing::info!("Rate limits held in memory (single instance only)");
                Arc::new(MemoryRateLimitStore::new())
            }
        };

        let identity = IdentityService::new(db.accounts(), rate_limits, audit, auth);
        let market = Marketplace::new(&db, market);
        Self::new(Arc::new(db), Arc::new(identity), Arc::new(market))
    }
}
