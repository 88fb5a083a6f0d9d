//! HaulBid Marketplace - order lifecycle, bidding and reputation
//!
//! Business rules on top of the repository traits in `haulbid-db`:
//!
//! - [`OrderLifecycle`]: order intake, the status state machine, admin approval
//! - [`BidLedger`]: bid placement, atomic acceptance and its reversal, price stats
//! - [`RatingAggregator`]: per-order ratings and derived owner summaries
//! - [`ReviewBoard`]: free-form reviews keyed by an arbitrary item id
//! - [`Notifier`]: in-app notifications emitted by the services above
//!
//! Every store call is bounded by [`MarketplaceConfig::store_timeout`].

pub mod analytics;
pub mod bids;
pub mod error;
pub mod notifier;
pub mod orders;
pub mod ratings;
pub mod reviews;

pub use analytics::PlatformStats;
pub use bids::BidLedger;
pub use error::{MarketError, MarketResult};
pub use notifier::Notifier;
pub use orders::OrderLifecycle;
pub use ratings::RatingAggregator;
pub use reviews::ReviewBoard;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use haulbid_db::{AccountRepository, Database, DbResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    /// Upper bound on any single store round trip
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(10),
        }
    }
}

/// Races store futures against a timer so a stalled backend surfaces as
/// [`MarketError::Timeout`] instead of hanging the request.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    timeout: Duration,
}

impl Bounded {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run<T>(&self, call: impl Future<Output = DbResult<T>>) -> MarketResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(MarketError::from),
            Err(_) => Err(MarketError::Timeout(format!(
                "store call exceeded {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

impl Default for Bounded {
    fn default() -> Self {
        Self::new(MarketplaceConfig::default().store_timeout)
    }
}

/// All marketplace services wired to one database
#[derive(Clone)]
pub struct Marketplace {
    pub orders: OrderLifecycle,
    pub bids: BidLedger,
    pub ratings: RatingAggregator,
    pub reviews: ReviewBoard,
    pub notifications: Notifier,
    accounts: Arc<dyn AccountRepository>,
    store: Bounded,
}

impl Marketplace {
    pub fn new(db: &Database, config: &MarketplaceConfig) -> Self {
        let store = Bounded::new(config.store_timeout);
        let notifications = Notifier::new(db.notifications(), store);

        Self {
            orders: OrderLifecycle::new(db.orders(), db.bids(), notifications.clone(), store),
            bids: BidLedger::new(db.bids(), db.orders(), notifications.clone(), store),
            ratings: RatingAggregator::new(db.ratings(), db.orders(), db.bids(), db.accounts(), store),
            reviews: ReviewBoard::new(db.reviews(), store),
            notifications,
            accounts: db.accounts(),
            store,
        }
    }

    /// Platform-wide counts
    pub async fn analytics(&self) -> MarketResult<PlatformStats> {
        let total_users = self.store.run(self.accounts.count()).await?;
        let total_orders = self.orders.count().await?;
        let total_bids = self.bids.count().await?;
        Ok(PlatformStats {
            total_users,
            total_orders,
            total_bids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let bounded = Bounded::new(Duration::from_millis(50));
        let stalled = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, haulbid_db::DbError>(())
        };
        let err = bounded.run(stalled).await.unwrap_err();
        assert!(matches!(err, MarketError::Timeout(_)));
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let value = Bounded::default().run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_analytics_counts() {
        let db = Database::in_memory(None).await.unwrap();
        let market = Marketplace::new(&db, &MarketplaceConfig::default());
        let stats = market.analytics().await.unwrap();
        assert_eq!(stats, PlatformStats::default());
    }
}
