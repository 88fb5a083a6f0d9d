//! Bid Ledger
//!
//! Bids are priced proposals from owner accounts. Acceptance is the only
//! path into `assigned`: the repository accepts the bid, rejects its pending
//! siblings and assigns the order in one atomic unit, so two concurrent
//! accepts on the same order can never both win.

use std::sync::Arc;

use haulbid_db::{BidFilter, BidRepository, OrderRepository};
use haulbid_types::{
    Actor, ActorRole, Bid, BidDetails, BidId, BidPatch, BidStats, BidStatus, NewNotification,
    NotificationKind, Order, OrderId, Priority,
};

use crate::error::{MarketError, MarketResult};
use crate::notifier::Notifier;
use crate::orders::ensure_owner_or_admin;
use crate::Bounded;

#[derive(Clone)]
pub struct BidLedger {
    bids: Arc<dyn BidRepository>,
    orders: Arc<dyn OrderRepository>,
    notifier: Notifier,
    store: Bounded,
}

impl BidLedger {
    pub fn new(
        bids: Arc<dyn BidRepository>,
        orders: Arc<dyn OrderRepository>,
        notifier: Notifier,
        store: Bounded,
    ) -> Self {
        Self {
            bids,
            orders,
            notifier,
            store,
        }
    }

    /// Place a bid. Multiple bids per (order, bidder) are kept as separate records.
    pub async fn submit(
        &self,
        actor: Actor,
        order_id: OrderId,
        amount: f64,
        details: BidDetails,
    ) -> MarketResult<Bid> {
        let bidder = match (actor.id, actor.role) {
            (Some(id), ActorRole::Owner) => id,
            _ => return Err(MarketError::forbidden("only delivery companies may bid")),
        };

        let bid = Bid::new(order_id, bidder, amount, details)?;
        let placement = self.store.run(self.bids.place(&bid)).await?;
        tracing::info!(
            bid_id = %bid.id,
            order_id = %order_id,
            bidder_id = %bidder,
            amount = bid.amount,
            opened_bidding = placement.opened.is_some(),
            "bid placed"
        );

        if let Some(owner) = placement.order.owner_id {
            self.notifier
                .emit(
                    NewNotification::to(
                        owner,
                        NotificationKind::BidReceived,
                        "New bid received",
                        format!("A bid of {:.2} was placed on {}", bid.amount, placement.order.title),
                    )
                    .about_order(order_id),
                )
                .await;
        }
        Ok(placement.bid)
    }

    pub async fn get(&self, id: BidId) -> MarketResult<Bid> {
        self.store
            .run(self.bids.find_by_id(id))
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Bid {}", id)))
    }

    /// Newest first
    pub async fn list(&self, filter: BidFilter) -> MarketResult<Vec<Bid>> {
        self.store.run(self.bids.list(filter)).await
    }

    /// Accept `bid_id`, reject the other pending bids and assign the order
    pub async fn accept(&self, actor: Actor, order_id: OrderId, bid_id: BidId) -> MarketResult<Order> {
        let order = self.order(order_id).await?;
        ensure_owner_or_admin(&actor, &order)?;

        let acceptance = self
            .store
            .run(self.bids.accept(order_id, bid_id, actor))
            .await?;
        metrics::counter!("haulbid_bids_accepted_total").increment(1);
        tracing::info!(
            order_id = %order_id,
            bid_id = %bid_id,
            rejected = acceptance.rejected.len(),
            "bid accepted"
        );

        let title = &acceptance.order.title;
        self.notifier
            .emit(
                NewNotification::to(
                    acceptance.accepted.bidder_id,
                    NotificationKind::BidAccepted,
                    "Bid accepted",
                    format!("Your bid on {} was accepted", title),
                )
                .about_order(order_id)
                .with_priority(Priority::High),
            )
            .await;
        for bid in &acceptance.rejected {
            self.notifier
                .emit(
                    NewNotification::to(
                        bid.bidder_id,
                        NotificationKind::BidRejected,
                        "Bid not selected",
                        format!("Another bid on {} was accepted", title),
                    )
                    .about_order(order_id),
                )
                .await;
        }

        Ok(acceptance.order)
    }

    /// Undo an acceptance and reopen the order for bidding
    pub async fn cancel_acceptance(
        &self,
        actor: Actor,
        order_id: OrderId,
        bid_id: BidId,
    ) -> MarketResult<Order> {
        let order = self.order(order_id).await?;
        ensure_owner_or_admin(&actor, &order)?;

        let reopening = self
            .store
            .run(self.bids.cancel_acceptance(order_id, bid_id, actor))
            .await?;
        tracing::info!(
            order_id = %order_id,
            bid_id = %bid_id,
            reset = reopening.reset.len(),
            "bid acceptance cancelled"
        );
        Ok(reopening.order)
    }

    /// Bidder (or admin) pulls a bid. Already withdrawn or rejected bids are left as is.
    pub async fn withdraw(&self, actor: Actor, id: BidId) -> MarketResult<Bid> {
        let bid = self.get(id).await?;
        ensure_bidder_or_admin(&actor, &bid)?;

        match bid.status {
            BidStatus::Withdrawn | BidStatus::Rejected => Ok(bid),
            BidStatus::Accepted => Err(MarketError::Conflict(format!(
                "Bid {} is accepted; cancel the acceptance first",
                id
            ))),
            BidStatus::Pending => {
                let bid = self
                    .store
                    .run(self.bids.set_status(id, BidStatus::Pending, BidStatus::Withdrawn))
                    .await?;
                tracing::info!(bid_id = %id, "bid withdrawn");
                Ok(bid)
            }
        }
    }

    /// Edit a pending bid
    pub async fn update(&self, actor: Actor, id: BidId, patch: &BidPatch) -> MarketResult<Bid> {
        let mut bid = self.get(id).await?;
        ensure_bidder_or_admin(&actor, &bid)?;
        if bid.status != BidStatus::Pending {
            return Err(MarketError::Conflict(format!(
                "Bid {} is {} and can no longer be edited",
                id, bid.status
            )));
        }

        patch.apply(&mut bid)?;
        self.store.run(self.bids.update_pending(&bid)).await
    }

    pub async fn delete(&self, actor: Actor, id: BidId) -> MarketResult<()> {
        let bid = self.get(id).await?;
        ensure_bidder_or_admin(&actor, &bid)?;
        if bid.status == BidStatus::Accepted {
            return Err(MarketError::Conflict(format!(
                "Bid {} is accepted; cancel the acceptance first",
                id
            )));
        }
        self.store.run(self.bids.delete(id)).await?;
        tracing::info!(bid_id = %id, "bid deleted");
        Ok(())
    }

    /// Price statistics over the order's non-withdrawn bids
    pub async fn stats(&self, order_id: OrderId) -> MarketResult<BidStats> {
        self.order(order_id).await?;
        let bids = self
            .list(BidFilter {
                order_id: Some(order_id),
                ..Default::default()
            })
            .await?;
        Ok(BidStats::from_bids(&bids))
    }

    pub async fn count(&self) -> MarketResult<u64> {
        self.store.run(self.bids.count()).await
    }

    async fn order(&self, id: OrderId) -> MarketResult<Order> {
        self.store
            .run(self.orders.find_by_id(id))
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Order {}", id)))
    }
}

fn ensure_bidder_or_admin(actor: &Actor, bid: &Bid) -> MarketResult<()> {
    if actor.is_admin() || actor.id == Some(bid.bidder_id) {
        Ok(())
    } else {
        Err(MarketError::forbidden("not the bidder"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderLifecycle;
    use haulbid_db::MemoryStore;
    use haulbid_types::{AccountId, OrderPayload, OrderStatus, Role};

    struct Fixture {
        ledger: BidLedger,
        orders: OrderLifecycle,
        notifier: Notifier,
        customer: Actor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::new(store.clone(), Bounded::default());
        Fixture {
            ledger: BidLedger::new(store.clone(), store.clone(), notifier.clone(), Bounded::default()),
            orders: OrderLifecycle::new(store.clone(), store, notifier.clone(), Bounded::default()),
            notifier,
            customer: Actor::account(AccountId::new(), Role::User),
        }
    }

    fn carrier() -> Actor {
        Actor::account(AccountId::new(), Role::Owner)
    }

    fn payload() -> OrderPayload {
        serde_json::from_value(serde_json::json!({
            "title": "Sofa",
            "pickupAddress": "1 Main St",
            "deliveryAddress": "2 High St",
            "description": "Three-seater",
            "weight": 40.0,
            "urgency": "express",
            "preferredDate": "2026-05-02"
        }))
        .unwrap()
    }

    impl Fixture {
        async fn order(&self) -> Order {
            self.orders.create(&payload(), self.customer.id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_accept_rejects_other_bidders() {
        let f = fixture();
        let order = f.order().await;
        let (b1, b2) = (carrier(), carrier());

        let first = f.ledger.submit(b1, order.id, 25.0, BidDetails::default()).await.unwrap();
        let second = f.ledger.submit(b2, order.id, 30.0, BidDetails::default()).await.unwrap();

        let assigned = f.ledger.accept(f.customer, order.id, first.id).await.unwrap();
        assert_eq!(assigned.status, OrderStatus::Assigned);
        assert_eq!(f.ledger.get(first.id).await.unwrap().status, BidStatus::Accepted);
        assert_eq!(f.ledger.get(second.id).await.unwrap().status, BidStatus::Rejected);

        let inbox = f.notifier.list(b2.id.unwrap()).await.unwrap();
        assert_eq!(inbox[0].kind, NotificationKind::BidRejected);
        let inbox = f.notifier.list(b1.id.unwrap()).await.unwrap();
        assert_eq!(inbox[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_second_accept_conflicts() {
        let f = fixture();
        let order = f.order().await;
        let first = f.ledger.submit(carrier(), order.id, 25.0, BidDetails::default()).await.unwrap();
        let second = f.ledger.submit(carrier(), order.id, 20.0, BidDetails::default()).await.unwrap();

        f.ledger.accept(f.customer, order.id, first.id).await.unwrap();
        let err = f.ledger.accept(f.customer, order.id, second.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));

        let bids = f
            .ledger
            .list(BidFilter {
                order_id: Some(order.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Accepted).count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_acceptance_reopens() {
        let f = fixture();
        let order = f.order().await;
        let first = f.ledger.submit(carrier(), order.id, 25.0, BidDetails::default()).await.unwrap();
        let second = f.ledger.submit(carrier(), order.id, 30.0, BidDetails::default()).await.unwrap();
        f.ledger.accept(f.customer, order.id, first.id).await.unwrap();

        let reopened = f
            .ledger
            .cancel_acceptance(f.customer, order.id, first.id)
            .await
            .unwrap();
        assert_eq!(reopened.status, OrderStatus::Bidding);
        assert_eq!(f.ledger.get(first.id).await.unwrap().status, BidStatus::Pending);
        assert_eq!(f.ledger.get(second.id).await.unwrap().status, BidStatus::Pending);
    }

    #[tokio::test]
    async fn test_only_order_creator_accepts() {
        let f = fixture();
        let order = f.order().await;
        let bidder = carrier();
        let bid = f.ledger.submit(bidder, order.id, 25.0, BidDetails::default()).await.unwrap();

        let err = f.ledger.accept(bidder, order.id, bid.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_submit_rules() {
        let f = fixture();
        let order = f.order().await;

        let err = f
            .ledger
            .submit(carrier(), order.id, 0.0, BidDetails::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");

        let err = f
            .ledger
            .submit(f.customer, order.id, 10.0, BidDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let err = f
            .ledger
            .submit(carrier(), OrderId::new(), 10.0, BidDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_first_bid_opens_bidding_and_notifies() {
        let f = fixture();
        let order = f.order().await;
        assert_eq!(order.status, OrderStatus::Published);

        f.ledger.submit(carrier(), order.id, 25.0, BidDetails::default()).await.unwrap();
        assert_eq!(f.orders.get(order.id).await.unwrap().status, OrderStatus::Bidding);

        let inbox = f.notifier.list(f.customer.id.unwrap()).await.unwrap();
        assert_eq!(inbox[0].kind, NotificationKind::BidReceived);
        assert_eq!(inbox[0].order_id, Some(order.id));
    }

    #[tokio::test]
    async fn test_withdraw() {
        let f = fixture();
        let order = f.order().await;
        let bidder = carrier();
        let bid = f.ledger.submit(bidder, order.id, 25.0, BidDetails::default()).await.unwrap();

        let err = f.ledger.withdraw(carrier(), bid.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let withdrawn = f.ledger.withdraw(bidder, bid.id).await.unwrap();
        assert_eq!(withdrawn.status, BidStatus::Withdrawn);
        // Second withdraw is a no-op
        let again = f.ledger.withdraw(bidder, bid.id).await.unwrap();
        assert_eq!(again.status, BidStatus::Withdrawn);

        let err = f.ledger.withdraw(bidder, BidId::new()).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_and_stats() {
        let f = fixture();
        let order = f.order().await;
        let bidder = carrier();
        let a = f.ledger.submit(bidder, order.id, 10.0, BidDetails::default()).await.unwrap();
        f.ledger.submit(carrier(), order.id, 20.0, BidDetails::default()).await.unwrap();
        let c = f.ledger.submit(carrier(), order.id, 90.0, BidDetails::default()).await.unwrap();
        f.ledger.withdraw(Actor::system(), c.id).await.unwrap_err();
        f.ledger
            .withdraw(Actor::account(c.bidder_id, Role::Owner), c.id)
            .await
            .unwrap();

        let patch = BidPatch {
            amount: Some(15.0),
            ..Default::default()
        };
        assert_eq!(f.ledger.update(bidder, a.id, &patch).await.unwrap().amount, 15.0);

        let stats = f.ledger.stats(order.id).await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 15.0);
        assert_eq!(stats.max, 20.0);
        assert_eq!(stats.average, 17.5);

        let bad = BidPatch {
            amount: Some(-1.0),
            ..Default::default()
        };
        assert!(f.ledger.update(bidder, a.id, &bad).await.is_err());
    }

    #[tokio::test]
    async fn test_accepted_bid_cannot_be_deleted() {
        let f = fixture();
        let order = f.order().await;
        let bid = f.ledger.submit(carrier(), order.id, 25.0, BidDetails::default()).await.unwrap();
        f.ledger.accept(f.customer, order.id, bid.id).await.unwrap();

        let admin = Actor::account(AccountId::new(), Role::Admin);
        let err = f.ledger.delete(admin, bid.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }
}
