//! Repository traits and their PostgreSQL implementations
//!
//! Services depend on the traits only, so the same marketplace logic runs
//! against PostgreSQL in production and [`crate::memory::MemoryStore`] in
//! tests and single-instance deployments.

mod account;
mod bid;
mod notification;
mod order;
mod rating;
mod review;

pub use account::PgAccountRepo;
pub use bid::PgBidRepo;
pub use notification::PgNotificationRepo;
pub use order::PgOrderRepo;
pub use rating::PgRatingRepo;
pub use review::PgReviewRepo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use haulbid_types::{
    Account, AccountId, AccountPatch, Actor, Bid, BidId, BidStatus, Notification,
    NotificationId, Order, OrderId, OrderStatus, Rating, Review, StatusUpdate,
};

use crate::error::DbResult;

// ============================================================================
// Accounts
// ============================================================================

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account. Fails with `Duplicate` on a taken username or email.
    async fn create(&self, account: &Account) -> DbResult<()>;

    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<Account>>;

    /// Match either the username or the email
    async fn find_by_login(&self, username_or_email: &str) -> DbResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>>;

    async fn find_by_reset_token(&self, token_hash: &str) -> DbResult<Option<Account>>;

    /// Whether the username or the email is already registered
    async fn is_taken(&self, username: &str, email: &str) -> DbResult<bool>;

    /// Store (or clear) the single outstanding reset token
    async fn set_reset_token(
        &self,
        id: AccountId,
        token_hash: Option<&str>,
        expiry: Option<DateTime<Utc>>,
    ) -> DbResult<()>;

    /// Replace the password hash and clear any reset token
    async fn update_password(&self, id: AccountId, password_hash: &str) -> DbResult<()>;

    async fn update(&self, id: AccountId, patch: &AccountPatch) -> DbResult<Account>;

    async fn delete(&self, id: AccountId) -> DbResult<()>;

    /// All accounts, newest first
    async fn list(&self) -> DbResult<Vec<Account>>;

    async fn count(&self) -> DbResult<u64>;
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> DbResult<()>;

    async fn find_by_id(&self, id: OrderId) -> DbResult<Option<Order>>;

    /// Orders newest first, optionally for one owner
    async fn list(&self, owner_id: Option<AccountId>) -> DbResult<Vec<Order>>;

    /// Persist descriptive fields. Status is never written here.
    async fn update_details(&self, order: &Order) -> DbResult<Order>;

    /// Compare-and-set the status from `update.previous_status` to
    /// `update.new_status` and append the history entry in one unit.
    /// Fails with `Conflict` when the stored status no longer matches.
    async fn transition(&self, update: &StatusUpdate) -> DbResult<Order>;

    /// Hard delete, cascading to bids and history
    async fn delete(&self, id: OrderId) -> DbResult<()>;

    /// Status history, oldest first
    async fn history(&self, id: OrderId) -> DbResult<Vec<StatusUpdate>>;

    async fn count(&self) -> DbResult<u64>;
}

// ============================================================================
// Bids
// ============================================================================

/// Bid filter for listings
#[derive(Debug, Clone, Copy, Default)]
pub struct BidFilter {
    pub bidder_id: Option<AccountId>,
    pub order_id: Option<OrderId>,
}

/// Result of placing a bid
#[derive(Debug, Clone)]
pub struct BidPlacement {
    pub bid: Bid,
    pub order: Order,
    /// Present when this bid moved the order from published to bidding
    pub opened: Option<StatusUpdate>,
}

/// Result of accepting a bid
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub order: Order,
    pub accepted: Bid,
    pub rejected: Vec<Bid>,
    pub update: StatusUpdate,
}

/// Result of cancelling an acceptance
#[derive(Debug, Clone)]
pub struct Reopening {
    pub order: Order,
    /// Bids returned to pending
    pub reset: Vec<Bid>,
    pub update: StatusUpdate,
}

#[async_trait]
pub trait BidRepository: Send + Sync {
    /// Insert a bid against an order that accepts bids, opening bidding on
    /// a published order in the same unit.
    async fn place(&self, bid: &Bid) -> DbResult<BidPlacement>;

    async fn find_by_id(&self, id: BidId) -> DbResult<Option<Bid>>;

    /// Bids newest first
    async fn list(&self, filter: BidFilter) -> DbResult<Vec<Bid>>;

    /// Persist edited fields of a bid that is still pending
    async fn update_pending(&self, bid: &Bid) -> DbResult<Bid>;

    /// Compare-and-set a bid status
    async fn set_status(&self, id: BidId, from: BidStatus, to: BidStatus) -> DbResult<Bid>;

    async fn delete(&self, id: BidId) -> DbResult<()>;

    /// Accept one bid, reject its pending siblings and assign the order.
    /// All or nothing; a concurrent second accept fails with `Conflict`.
    async fn accept(&self, order_id: OrderId, bid_id: BidId, actor: Actor) -> DbResult<Acceptance>;

    /// Undo an acceptance: accepted and rejected bids return to pending and
    /// the order returns to bidding. All or nothing.
    async fn cancel_acceptance(
        &self,
        order_id: OrderId,
        bid_id: BidId,
        actor: Actor,
    ) -> DbResult<Reopening>;

    async fn count(&self) -> DbResult<u64>;
}

// ============================================================================
// Ratings, Reviews, Notifications
// ============================================================================

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Insert, or update the existing rating for the same (order, rater)
    async fn upsert(&self, rating: &Rating) -> DbResult<Rating>;

    async fn list_for_owner(&self, owner_id: AccountId) -> DbResult<Vec<Rating>>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn insert(&self, review: &Review) -> DbResult<()>;

    /// Reviews for an item, newest first
    async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<Review>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> DbResult<()>;

    /// Notifications for an account, newest first
    async fn list_for_user(&self, user_id: AccountId) -> DbResult<Vec<Notification>>;

    async fn mark_read(&self, id: NotificationId) -> DbResult<Notification>;
}

/// Status an order must be in for a bid to be accepted
pub(crate) const ACCEPTING_STATUS: OrderStatus = OrderStatus::Bidding;
