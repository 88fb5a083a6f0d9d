//! In-memory store
//!
//! Implements every repository trait over one `RwLock`ed state, so each
//! operation (including accept and cancel-acceptance) is applied under a
//! single write guard. Mirrors the PostgreSQL foreign-key behaviour on
//! delete. Used by tests and single-instance deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use haulbid_types::{
    Account, AccountId, AccountPatch, Actor, Bid, BidId, BidStatus, Notification,
    NotificationId, Order, OrderId, OrderStatus, Rating, Review, StatusUpdate,
};

use crate::error::{DbError, DbResult};
use crate::repos::{
    Acceptance, AccountRepository, BidFilter, BidPlacement, BidRepository,
    NotificationRepository, OrderRepository, RatingRepository, Reopening, ReviewRepository,
    ACCEPTING_STATUS,
};

#[derive(Default)]
struct MemState {
    accounts: HashMap<AccountId, Account>,
    orders: HashMap<OrderId, Order>,
    history: Vec<StatusUpdate>,
    bids: HashMap<BidId, Bid>,
    ratings: HashMap<(OrderId, AccountId), Rating>,
    reviews: Vec<Review>,
    notifications: HashMap<NotificationId, Notification>,
}

impl MemState {
    fn order_mut(&mut self, id: OrderId) -> DbResult<&mut Order> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Order {}", id)))
    }

    /// Write a new status and its history entry
    fn apply_status(&mut self, update: &StatusUpdate) -> DbResult<Order> {
        let order = self.order_mut(update.order_id)?;
        order.status = update.new_status;
        order.updated_at = update.timestamp;
        let order = order.clone();
        self.history.push(update.clone());
        Ok(order)
    }

    fn expect_status(&self, id: OrderId, expected: OrderStatus) -> DbResult<()> {
        let order = self
            .orders
            .get(&id)
            .ok_or_else(|| DbError::NotFound(format!("Order {}", id)))?;
        if order.status != expected {
            return Err(DbError::Conflict(format!(
                "Order {} is {}, expected {}",
                id, order.status, expected
            )));
        }
        Ok(())
    }

    fn bid_on_order(&self, order_id: OrderId, bid_id: BidId) -> DbResult<&Bid> {
        self.bids
            .get(&bid_id)
            .filter(|b| b.order_id == order_id)
            .ok_or_else(|| DbError::NotFound(format!("Bid {} on order {}", bid_id, order_id)))
    }

    /// Set the status on every bid of `order_id` matching `pred`, returning them
    fn restatus_bids(
        &mut self,
        order_id: OrderId,
        to: BidStatus,
        pred: impl Fn(&Bid) -> bool,
    ) -> Vec<Bid> {
        let now = Utc::now();
        let mut changed: Vec<Bid> = self
            .bids
            .values_mut()
            .filter(|b| b.order_id == order_id && pred(b))
            .map(|b| {
                b.status = to;
                b.updated_at = now;
                b.clone()
            })
            .collect();
        changed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        changed
    }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

/// Process-local implementation of every repository
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create(&self, account: &Account) -> DbResult<()> {
        let mut state = self.state.write().await;
        for existing in state.accounts.values() {
            if existing.username == account.username {
                return Err(DbError::Duplicate(format!(
                    "Username {} already exists",
                    account.username
                )));
            }
            if existing.email == account.email {
                return Err(DbError::Duplicate(format!(
                    "Email {} already exists",
                    account.email
                )));
            }
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn find_by_login(&self, username_or_email: &str) -> DbResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.username == username_or_email || a.email == username_or_email)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> DbResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.reset_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn is_taken(&self, username: &str, email: &str) -> DbResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .any(|a| a.username == username || a.email == email))
    }

    async fn set_reset_token(
        &self,
        id: AccountId,
        token_hash: Option<&str>,
        expiry: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;
        account.reset_token_hash = token_hash.map(String::from);
        account.reset_token_expiry = expiry;
        Ok(())
    }

    async fn update_password(&self, id: AccountId, password_hash: &str) -> DbResult<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;
        account.password_hash = password_hash.to_string();
        account.reset_token_hash = None;
        account.reset_token_expiry = None;
        Ok(())
    }

    async fn update(&self, id: AccountId, patch: &AccountPatch) -> DbResult<Account> {
        let mut state = self.state.write().await;
        if let Some(email) = &patch.email {
            if state.accounts.values().any(|a| a.id != id && &a.email == email) {
                return Err(DbError::Duplicate("Email already exists".into()));
            }
        }
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;
        patch.apply(account);
        Ok(account.clone())
    }

    async fn delete(&self, id: AccountId) -> DbResult<()> {
        let mut state = self.state.write().await;
        if state.accounts.remove(&id).is_none() {
            return Err(DbError::NotFound(format!("Account {}", id)));
        }
        state.bids.retain(|_, b| b.bidder_id != id);
        state
            .ratings
            .retain(|_, r| r.user_id != id && r.owner_id != id);
        state.reviews.retain(|r| r.user_id != id);
        state.notifications.retain(|_, n| n.user_id != id);
        for order in state.orders.values_mut() {
            if order.owner_id == Some(id) {
                order.owner_id = None;
            }
        }
        Ok(())
    }

    async fn list(&self) -> DbResult<Vec<Account>> {
        let state = self.state.read().await;
        let accounts = state.accounts.values().cloned().collect();
        Ok(newest_first(accounts, |a: &Account| a.created_at))
    }

    async fn count(&self) -> DbResult<u64> {
        Ok(self.state.read().await.accounts.len() as u64)
    }
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, order: &Order) -> DbResult<()> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(DbError::Duplicate(format!("Order {}", order.id)));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> DbResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list(&self, owner_id: Option<AccountId>) -> DbResult<Vec<Order>> {
        let state = self.state.read().await;
        let orders = state
            .orders
            .values()
            .filter(|o| owner_id.is_none() || o.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(orders, |o: &Order| o.created_at))
    }

    async fn update_details(&self, order: &Order) -> DbResult<Order> {
        let mut state = self.state.write().await;
        let stored = state.order_mut(order.id)?;
        let status = stored.status;
        *stored = order.clone();
        stored.status = status;
        Ok(stored.clone())
    }

    async fn transition(&self, update: &StatusUpdate) -> DbResult<Order> {
        let mut state = self.state.write().await;
        state.expect_status(update.order_id, update.previous_status)?;
        state.apply_status(update)
    }

    async fn delete(&self, id: OrderId) -> DbResult<()> {
        let mut state = self.state.write().await;
        if state.orders.remove(&id).is_none() {
            return Err(DbError::NotFound(format!("Order {}", id)));
        }
        state.bids.retain(|_, b| b.order_id != id);
        state.history.retain(|h| h.order_id != id);
        state.ratings.retain(|(order_id, _), _| *order_id != id);
        for n in state.notifications.values_mut() {
            if n.order_id == Some(id) {
                n.order_id = None;
            }
        }
        Ok(())
    }

    async fn history(&self, id: OrderId) -> DbResult<Vec<StatusUpdate>> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|h| h.order_id == id)
            .cloned()
            .collect())
    }

    async fn count(&self) -> DbResult<u64> {
        Ok(self.state.read().await.orders.len() as u64)
    }
}

// ============================================================================
// Bids
// ============================================================================

#[async_trait]
impl BidRepository for MemoryStore {
    async fn place(&self, bid: &Bid) -> DbResult<BidPlacement> {
        let mut state = self.state.write().await;
        let order = state.order_mut(bid.order_id)?.clone();
        if !order.status.accepts_bids() {
            return Err(DbError::Conflict(format!(
                "Order {} is {} and not open for bids",
                order.id, order.status
            )));
        }

        state.bids.insert(bid.id, bid.clone());

        let (order, opened) = if order.status == OrderStatus::Published {
            let update = StatusUpdate::record(
                order.id,
                OrderStatus::Published,
                OrderStatus::Bidding,
                Actor::system(),
                Some("First bid received".to_string()),
            );
            (state.apply_status(&update)?, Some(update))
        } else {
            (order, None)
        };

        Ok(BidPlacement {
            bid: bid.clone(),
            order,
            opened,
        })
    }

    async fn find_by_id(&self, id: BidId) -> DbResult<Option<Bid>> {
        Ok(self.state.read().await.bids.get(&id).cloned())
    }

    async fn list(&self, filter: BidFilter) -> DbResult<Vec<Bid>> {
        let state = self.state.read().await;
        let bids = state
            .bids
            .values()
            .filter(|b| filter.bidder_id.map_or(true, |id| b.bidder_id == id))
            .filter(|b| filter.order_id.map_or(true, |id| b.order_id == id))
            .cloned()
            .collect();
        Ok(newest_first(bids, |b: &Bid| b.created_at))
    }

    async fn update_pending(&self, bid: &Bid) -> DbResult<Bid> {
        let mut state = self.state.write().await;
        let stored = state
            .bids
            .get_mut(&bid.id)
            .ok_or_else(|| DbError::NotFound(format!("Bid {}", bid.id)))?;
        if stored.status != BidStatus::Pending {
            return Err(DbError::Conflict(format!(
                "Bid {} is {} and can no longer be edited",
                bid.id, stored.status
            )));
        }
        stored.amount = bid.amount;
        stored.message = bid.message.clone();
        stored.estimated_duration = bid.estimated_duration.clone();
        stored.description = bid.description.clone();
        stored.updated_at = bid.updated_at;
        Ok(stored.clone())
    }

    async fn set_status(&self, id: BidId, from: BidStatus, to: BidStatus) -> DbResult<Bid> {
        let mut state = self.state.write().await;
        let stored = state
            .bids
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Bid {}", id)))?;
        if stored.status != from {
            return Err(DbError::Conflict(format!(
                "Bid {} is {}, expected {}",
                id, stored.status, from
            )));
        }
        stored.status = to;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: BidId) -> DbResult<()> {
        let mut state = self.state.write().await;
        state
            .bids
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("Bid {}", id)))
    }

    async fn accept(&self, order_id: OrderId, bid_id: BidId, actor: Actor) -> DbResult<Acceptance> {
        let mut state = self.state.write().await;

        // Validate everything before the first write
        state.expect_status(order_id, ACCEPTING_STATUS)?;
        let bid = state.bid_on_order(order_id, bid_id)?;
        if bid.status != BidStatus::Pending {
            return Err(DbError::Conflict(format!(
                "Bid {} is {} and cannot be accepted",
                bid_id, bid.status
            )));
        }

        let accepted = state.restatus_bids(order_id, BidStatus::Accepted, |b| b.id == bid_id);
        let rejected = state.restatus_bids(order_id, BidStatus::Rejected, |b| {
            b.id != bid_id && b.status == BidStatus::Pending
        });

        let update = StatusUpdate::record(
            order_id,
            ACCEPTING_STATUS,
            OrderStatus::Assigned,
            actor,
            Some(format!("Bid {} accepted", bid_id)),
        );
        let order = state.apply_status(&update)?;

        let accepted = accepted
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("Bid {}", bid_id)))?;

        Ok(Acceptance {
            order,
            accepted,
            rejected,
            update,
        })
    }

    async fn cancel_acceptance(
        &self,
        order_id: OrderId,
        bid_id: BidId,
        actor: Actor,
    ) -> DbResult<Reopening> {
        let mut state = self.state.write().await;

        state.expect_status(order_id, OrderStatus::Assigned)?;
        let bid = state.bid_on_order(order_id, bid_id)?;
        if bid.status != BidStatus::Accepted {
            return Err(DbError::Conflict(format!(
                "Bid {} is {}, not the accepted bid",
                bid_id, bid.status
            )));
        }

        let reset = state.restatus_bids(order_id, BidStatus::Pending, |b| {
            matches!(b.status, BidStatus::Accepted | BidStatus::Rejected)
        });

        let update = StatusUpdate::record(
            order_id,
            OrderStatus::Assigned,
            OrderStatus::Bidding,
            actor,
            Some(format!("Acceptance of bid {} cancelled", bid_id)),
        );
        let order = state.apply_status(&update)?;

        Ok(Reopening {
            order,
            reset,
            update,
        })
    }

    async fn count(&self) -> DbResult<u64> {
        Ok(self.state.read().await.bids.len() as u64)
    }
}

// ============================================================================
// Ratings, Reviews, Notifications
// ============================================================================

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn upsert(&self, rating: &Rating) -> DbResult<Rating> {
        let mut state = self.state.write().await;
        let stored = state
            .ratings
            .entry((rating.order_id, rating.user_id))
            .and_modify(|existing| existing.revise(rating.clone()))
            .or_insert_with(|| rating.clone());
        Ok(stored.clone())
    }

    async fn list_for_owner(&self, owner_id: AccountId) -> DbResult<Vec<Rating>> {
        let state = self.state.read().await;
        let ratings = state
            .ratings
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(ratings, |r: &Rating| r.created_at))
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert(&self, review: &Review) -> DbResult<()> {
        self.state.write().await.reviews.push(review.clone());
        Ok(())
    }

    async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<Review>> {
        let state = self.state.read().await;
        let reviews = state
            .reviews
            .iter()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect();
        Ok(newest_first(reviews, |r: &Review| r.created_at))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: &Notification) -> DbResult<()> {
        self.state
            .write()
            .await
            .notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: AccountId) -> DbResult<Vec<Notification>> {
        let state = self.state.read().await;
        let notifications = state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(notifications, |n: &Notification| n.created_at))
    }

    async fn mark_read(&self, id: NotificationId) -> DbResult<Notification> {
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("Notification {}", id)))?;
        notification.is_read = true;
        Ok(notification.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulbid_types::{BidDetails, OrderPayload, Role, Urgency};
    use std::sync::Arc;

    fn order_payload() -> OrderPayload {
        OrderPayload {
            title: Some("Fridge".into()),
            pickup_address: Some("1 Dock St".into()),
            delivery_address: Some("9 Elm Ave".into()),
            description: Some("Upright fridge".into()),
            weight: Some(80.0),
            urgency: Some(Urgency::Standard),
            preferred_date: Some("2025-06-01".into()),
            ..Default::default()
        }
    }

    async fn seeded() -> (MemoryStore, Order) {
        let store = MemoryStore::new();
        let order = Order::create(order_payload().normalize().unwrap(), None);
        OrderRepository::insert(&store, &order).await.unwrap();
        (store, order)
    }

    fn bid(order: &Order, amount: f64) -> Bid {
        Bid::new(order.id, AccountId::new(), amount, BidDetails::default()).unwrap()
    }

    #[tokio::test]
    async fn test_first_bid_opens_bidding() {
        let (store, order) = seeded().await;

        let placed = store.place(&bid(&order, 30.0)).await.unwrap();
        assert_eq!(placed.order.status, OrderStatus::Bidding);
        assert!(placed.opened.is_some());

        let second = store.place(&bid(&order, 25.0)).await.unwrap();
        assert!(second.opened.is_none());

        let history = OrderRepository::history(&store, order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].new_status, OrderStatus::Bidding);
    }

    #[tokio::test]
    async fn test_accept_rejects_siblings_and_assigns() {
        let (store, order) = seeded().await;
        let b1 = store.place(&bid(&order, 25.0)).await.unwrap().bid;
        let b2 = store.place(&bid(&order, 30.0)).await.unwrap().bid;

        let acceptance = store.accept(order.id, b1.id, Actor::system()).await.unwrap();
        assert_eq!(acceptance.order.status, OrderStatus::Assigned);
        assert_eq!(acceptance.accepted.status, BidStatus::Accepted);
        assert_eq!(acceptance.rejected.len(), 1);
        assert_eq!(acceptance.rejected[0].id, b2.id);

        // A second accept on the sibling must not produce two accepted bids
        let err = store.accept(order.id, b2.id, Actor::system()).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let bids = BidRepository::list(&store, BidFilter { order_id: Some(order.id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Accepted).count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_accepts_single_winner() {
        let (store, order) = seeded().await;
        let store = Arc::new(store);
        let mut ids = Vec::new();
        for amount in [10.0, 11.0, 12.0, 13.0] {
            ids.push(store.place(&bid(&order, amount)).await.unwrap().bid.id);
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let store = store.clone();
                let (order_id, bid_id) = (order.id, *id);
                tokio::spawn(async move { store.accept(order_id, bid_id, Actor::system()).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_cancel_acceptance_resets_bids() {
        let (store, order) = seeded().await;
        let b1 = store.place(&bid(&order, 25.0)).await.unwrap().bid;
        let b2 = store.place(&bid(&order, 30.0)).await.unwrap().bid;
        let b3 = store.place(&bid(&order, 35.0)).await.unwrap().bid;
        store
            .set_status(b3.id, BidStatus::Pending, BidStatus::Withdrawn)
            .await
            .unwrap();

        store.accept(order.id, b1.id, Actor::system()).await.unwrap();
        let reopening = store
            .cancel_acceptance(order.id, b1.id, Actor::system())
            .await
            .unwrap();

        assert_eq!(reopening.order.status, OrderStatus::Bidding);
        assert_eq!(reopening.reset.len(), 2);
        let b2_now = BidRepository::find_by_id(&store, b2.id).await.unwrap().unwrap();
        assert_eq!(b2_now.status, BidStatus::Pending);
        let b3_now = BidRepository::find_by_id(&store, b3.id).await.unwrap().unwrap();
        assert_eq!(b3_now.status, BidStatus::Withdrawn);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let (store, order) = seeded().await;
        let stale = StatusUpdate::record(
            order.id,
            OrderStatus::Bidding,
            OrderStatus::Assigned,
            Actor::system(),
            None,
        );
        assert!(matches!(
            store.transition(&stale).await,
            Err(DbError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let store = MemoryStore::new();
        let a = Account::new("dispatch".into(), "d@x.io".into(), "h".into(), Role::User);
        store.create(&a).await.unwrap();

        let same_name = Account::new("dispatch".into(), "other@x.io".into(), "h".into(), Role::User);
        assert!(matches!(store.create(&same_name).await, Err(DbError::Duplicate(_))));
        assert!(store.is_taken("someone", "d@x.io").await.unwrap());
    }

    #[tokio::test]
    async fn test_rating_upsert_per_order_and_rater() {
        let (store, order) = seeded().await;
        let (rater, owner) = (AccountId::new(), AccountId::new());
        let submission = haulbid_types::RatingSubmission {
            order_id: order.id,
            user_id: rater,
            owner_id: owner,
            rating: 3,
            review: String::new(),
            categories: Default::default(),
            is_recommended: false,
        };
        let first = store.upsert(&submission.clone().into_rating().unwrap()).await.unwrap();

        let mut again = submission;
        again.rating = 5;
        let second = store.upsert(&again.into_rating().unwrap()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.rating, 5);
        assert_eq!(store.list_for_owner(owner).await.unwrap().len(), 1);
    }
}
