//! Order Lifecycle Manager
//!
//! ```text
//! draft → published → bidding → assigned → in_transit → delivered
//!   └────────┴───────────┴─────────┴───────────┴──────→ cancelled
//! ```
//!
//! Every change is validated against the transition table and written as a
//! compare-and-set together with its [`StatusUpdate`] history row. Entering
//! `assigned` and reopening `assigned → bidding` belong to the bid ledger.

use std::sync::Arc;

use haulbid_db::{BidFilter, BidRepository, OrderRepository};
use haulbid_types::{
    AccountId, Actor, BidStatus, DomainError, NewNotification, NotificationKind, Order, OrderId,
    OrderPatch, OrderPayload, OrderStatus, StatusUpdate,
};

use crate::error::{MarketError, MarketResult};
use crate::notifier::Notifier;
use crate::Bounded;

#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Arc<dyn OrderRepository>,
    bids: Arc<dyn BidRepository>,
    notifier: Notifier,
    store: Bounded,
}

impl OrderLifecycle {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        bids: Arc<dyn BidRepository>,
        notifier: Notifier,
        store: Bounded,
    ) -> Self {
        Self {
            orders,
            bids,
            notifier,
            store,
        }
    }

    /// Normalize either intake shape and persist the order
    pub async fn create(&self, payload: &OrderPayload, owner_id: Option<AccountId>) -> MarketResult<Order> {
        let order = Order::create(payload.normalize()?, owner_id);
        self.store.run(self.orders.insert(&order)).await?;
        tracing::info!(order_id = %order.id, status = %order.status, "order created");
        Ok(order)
    }

    pub async fn get(&self, id: OrderId) -> MarketResult<Order> {
        self.store
            .run(self.orders.find_by_id(id))
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Order {}", id)))
    }

    /// Newest first, optionally only one owner's orders
    pub async fn list(&self, owner_id: Option<AccountId>) -> MarketResult<Vec<Order>> {
        self.store.run(self.orders.list(owner_id)).await
    }

    /// Edit descriptive fields of a live order
    pub async fn update(&self, actor: Actor, id: OrderId, patch: &OrderPatch) -> MarketResult<Order> {
        let mut order = self.get(id).await?;
        ensure_owner_or_admin(&actor, &order)?;
        if patch.is_empty() {
            return Err(DomainError::invalid_input("order", "no fields to update").into());
        }
        if order.status.is_terminal() {
            return Err(MarketError::Conflict(format!(
                "Order {} is {} and can no longer be edited",
                id, order.status
            )));
        }

        patch.apply(&mut order)?;
        let order = self.store.run(self.orders.update_details(&order)).await?;
        tracing::info!(order_id = %id, "order updated");
        Ok(order)
    }

    /// Combined edit: descriptive fields first, then an optional status move.
    /// An illegal move is rejected before any field is written.
    pub async fn edit(
        &self,
        actor: Actor,
        id: OrderId,
        patch: &OrderPatch,
        status: Option<OrderStatus>,
        message: Option<String>,
    ) -> MarketResult<Order> {
        let Some(target) = status else {
            return self.update(actor, id, patch).await;
        };
        if patch.is_empty() {
            return self.update_status(actor, id, target, message).await;
        }

        let current = self.get(id).await?;
        if !current.status.can_transition_to(target) {
            return Err(DomainError::InvalidTransition {
                from: current.status,
                to: target,
            }
            .into());
        }
        self.update(actor, id, patch).await?;
        self.update_status(actor, id, target, message).await
    }

    /// Move an order along the state machine on behalf of `actor`
    pub async fn update_status(
        &self,
        actor: Actor,
        id: OrderId,
        target: OrderStatus,
        message: Option<String>,
    ) -> MarketResult<Order> {
        let order = self.get(id).await?;
        self.authorize_progress(&actor, &order, target).await?;

        // Owned by the bid ledger
        if target == OrderStatus::Assigned
            || (order.status == OrderStatus::Assigned && target == OrderStatus::Bidding)
        {
            return Err(DomainError::InvalidTransition {
                from: order.status,
                to: target,
            }
            .into());
        }

        self.transition(order, target, actor, message).await
    }

    /// Admin approval: `published → bidding`
    pub async fn approve(&self, actor: Actor, id: OrderId) -> MarketResult<Order> {
        ensure_admin(&actor)?;
        let order = self.get(id).await?;
        if order.status != OrderStatus::Published {
            return Err(DomainError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Bidding,
            }
            .into());
        }
        self.transition(order, OrderStatus::Bidding, actor, Some("Approved".into()))
            .await
    }

    /// Admin rejection: any live order to `cancelled`
    pub async fn reject(&self, actor: Actor, id: OrderId, reason: Option<String>) -> MarketResult<Order> {
        ensure_admin(&actor)?;
        let order = self.get(id).await?;
        let message = reason.or_else(|| Some("Rejected by admin".into()));
        self.transition(order, OrderStatus::Cancelled, actor, message)
            .await
    }

    /// Admin hard delete. Bids and history go with the order.
    pub async fn delete(&self, actor: Actor, id: OrderId) -> MarketResult<()> {
        ensure_admin(&actor)?;
        self.store.run(self.orders.delete(id)).await?;
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }

    /// Status changes, oldest first
    pub async fn history(&self, id: OrderId) -> MarketResult<Vec<StatusUpdate>> {
        self.get(id).await?;
        self.store.run(self.orders.history(id)).await
    }

    pub async fn count(&self) -> MarketResult<u64> {
        self.store.run(self.orders.count()).await
    }

    async fn transition(
        &self,
        order: Order,
        target: OrderStatus,
        actor: Actor,
        message: Option<String>,
    ) -> MarketResult<Order> {
        order.status.transition_to(target)?;

        let update = StatusUpdate::record(order.id, order.status, target, actor, message);
        let updated = self.store.run(self.orders.transition(&update)).await?;
        tracing::info!(
            order_id = %order.id,
            from = %update.previous_status,
            to = %update.new_status,
            by = update.updated_by_role.as_str(),
            "order status changed"
        );

        if let Some(owner) = updated.owner_id.filter(|owner| Some(*owner) != actor.id) {
            self.notifier
                .emit(
                    NewNotification::to(
                        owner,
                        NotificationKind::OrderStatus,
                        "Order status updated",
                        format!("{} is now {}", updated.title, updated.status),
                    )
                    .about_order(updated.id),
                )
                .await;
        }
        Ok(updated)
    }

    /// Admins and the order's creator may move it; the assigned carrier may
    /// report transit and delivery.
    async fn authorize_progress(&self, actor: &Actor, order: &Order, target: OrderStatus) -> MarketResult<()> {
        if actor.is_admin() || (actor.id.is_some() && actor.id == order.owner_id) {
            return Ok(());
        }
        if matches!(target, OrderStatus::InTransit | OrderStatus::Delivered) {
            if let Some(carrier) = self.carrier(order.id).await? {
                if actor.id == Some(carrier) {
                    return Ok(());
                }
            }
        }
        Err(MarketError::forbidden("not a party to this order"))
    }

    /// Bidder whose bid is currently accepted
    pub async fn carrier(&self, order_id: OrderId) -> MarketResult<Option<AccountId>> {
        let bids = self
            .store
            .run(self.bids.list(BidFilter {
                order_id: Some(order_id),
                ..Default::default()
            }))
            .await?;
        Ok(bids
            .iter()
            .find(|b| b.status == BidStatus::Accepted)
            .map(|b| b.bidder_id))
    }
}

pub(crate) fn ensure_admin(actor: &Actor) -> MarketResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(MarketError::forbidden("admin role required"))
    }
}

pub(crate) fn ensure_owner_or_admin(actor: &Actor, order: &Order) -> MarketResult<()> {
    if actor.is_admin() || (actor.id.is_some() && actor.id == order.owner_id) {
        Ok(())
    } else {
        Err(MarketError::forbidden("only the order's creator may do this"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bids::BidLedger;
    use haulbid_db::MemoryStore;
    use haulbid_types::{ActorRole, BidDetails, Role};

    fn services() -> (OrderLifecycle, BidLedger, Notifier) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::new(store.clone(), Bounded::default());
        (
            OrderLifecycle::new(store.clone(), store.clone(), notifier.clone(), Bounded::default()),
            BidLedger::new(store.clone(), store, notifier.clone(), Bounded::default()),
            notifier,
        )
    }

    fn admin() -> Actor {
        Actor::account(AccountId::new(), Role::Admin)
    }

    fn legacy() -> OrderPayload {
        OrderPayload {
            load_from: Some("Leeds".into()),
            load_to: Some("York".into()),
            order_date: Some("2026-03-01".into()),
            delivery_date: Some("2026-03-04".into()),
            description: Some("Pallet of tiles".into()),
            bid_amount: Some(120.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let (orders, _, _) = services();
        let owner = AccountId::new();
        let created = orders.create(&legacy(), Some(owner)).await.unwrap();

        let fetched = orders.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.status, OrderStatus::Published);
        assert_eq!(fetched.pickup_address, "Leeds");
        assert_eq!(fetched.budget, Some(120.0));
        assert_eq!(orders.list(Some(owner)).await.unwrap().len(), 1);
        assert!(orders.list(Some(AccountId::new())).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_missing_fields() {
        let (orders, _, _) = services();
        let payload = OrderPayload {
            load_from: Some("Leeds".into()),
            ..Default::default()
        };
        let err = orders.create(&payload, None).await.unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FIELDS");
    }

    #[tokio::test]
    async fn test_approve_then_invalid_transition() {
        let (orders, _, _) = services();
        let order = orders.create(&legacy(), None).await.unwrap();

        let bidding = orders.approve(admin(), order.id).await.unwrap();
        assert_eq!(bidding.status, OrderStatus::Bidding);

        // Already approved
        let err = orders.approve(admin(), order.id).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");

        let err = orders
            .update_status(admin(), order.id, OrderStatus::Delivered, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_assigned_is_owned_by_bids() {
        let (orders, _, _) = services();
        let order = orders.create(&legacy(), None).await.unwrap();
        orders.approve(admin(), order.id).await.unwrap();

        let err = orders
            .update_status(admin(), order.id, OrderStatus::Assigned, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_carrier_reports_delivery() {
        let (orders, bids, notifier) = services();
        let customer = Actor::account(AccountId::new(), Role::User);
        let carrier = Actor::account(AccountId::new(), Role::Owner);
        let order = orders.create(&legacy(), customer.id).await.unwrap();
        let bid = bids.submit(carrier, order.id, 90.0, BidDetails::default()).await.unwrap();
        bids.accept(customer, order.id, bid.id).await.unwrap();

        let stranger = Actor::account(AccountId::new(), Role::Owner);
        let err = orders
            .update_status(stranger, order.id, OrderStatus::InTransit, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        orders
            .update_status(carrier, order.id, OrderStatus::InTransit, Some("Collected".into()))
            .await
            .unwrap();
        let delivered = orders
            .update_status(carrier, order.id, OrderStatus::Delivered, None)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);

        let history = orders.history(order.id).await.unwrap();
        let path: Vec<_> = history.iter().map(|h| h.new_status).collect();
        assert_eq!(
            path,
            vec![
                OrderStatus::Bidding,
                OrderStatus::Assigned,
                OrderStatus::InTransit,
                OrderStatus::Delivered
            ]
        );
        assert_eq!(history[0].updated_by_role, ActorRole::System);
        assert_eq!(history[2].message.as_deref(), Some("Collected"));

        let inbox = notifier.list(customer.id.unwrap()).await.unwrap();
        assert!(inbox.iter().any(|n| n.kind == NotificationKind::OrderStatus));
    }

    #[tokio::test]
    async fn test_reject_and_terminal_edits() {
        let (orders, _, _) = services();
        let owner = Actor::account(AccountId::new(), Role::User);
        let order = orders.create(&legacy(), owner.id).await.unwrap();

        let err = orders.reject(owner, order.id, None).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let cancelled = orders.reject(admin(), order.id, None).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let patch = OrderPatch {
            title: Some("New".into()),
            ..Default::default()
        };
        let err = orders.update(owner, order.id, &patch).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_details() {
        let (orders, _, _) = services();
        let owner = Actor::account(AccountId::new(), Role::User);
        let order = orders.create(&legacy(), owner.id).await.unwrap();

        let patch = OrderPatch {
            title: Some("Tiles, two pallets".into()),
            budget: Some(150.0),
            ..Default::default()
        };
        let updated = orders.update(owner, order.id, &patch).await.unwrap();
        assert_eq!(updated.title, "Tiles, two pallets");
        assert_eq!(updated.budget, Some(150.0));
        assert_eq!(updated.status, OrderStatus::Published);

        let err = orders
            .update(owner, order.id, &OrderPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let other = Actor::account(AccountId::new(), Role::User);
        assert!(orders.update(other, order.id, &patch).await.is_err());
    }

    #[tokio::test]
    async fn test_edit_carries_status_through_the_state_machine() {
        let (orders, _, _) = services();
        let owner = Actor::account(AccountId::new(), Role::User);
        let order = orders.create(&legacy(), owner.id).await.unwrap();
        let retitle = OrderPatch {
            title: Some("Tiles, urgent".into()),
            ..Default::default()
        };

        // Illegal move leaves the fields untouched
        let err = orders
            .edit(owner, order.id, &retitle, Some(OrderStatus::Delivered), None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(orders.get(order.id).await.unwrap().title, order.title);

        let edited = orders
            .edit(owner, order.id, &retitle, Some(OrderStatus::Cancelled), Some("Changed plans".into()))
            .await
            .unwrap();
        assert_eq!(edited.title, "Tiles, urgent");
        assert_eq!(edited.status, OrderStatus::Cancelled);

        let history = orders.history(order.id).await.unwrap();
        assert_eq!(history.last().unwrap().new_status, OrderStatus::Cancelled);
        assert_eq!(history.last().unwrap().message.as_deref(), Some("Changed plans"));
    }

    #[tokio::test]
    async fn test_delete_admin_only() {
        let (orders, _, _) = services();
        let owner = Actor::account(AccountId::new(), Role::User);
        let order = orders.create(&legacy(), owner.id).await.unwrap();

        assert!(matches!(
            orders.delete(owner, order.id).await,
            Err(MarketError::Forbidden(_))
        ));
        orders.delete(admin(), order.id).await.unwrap();
        assert!(matches!(
            orders.delete(admin(), order.id).await,
            Err(MarketError::NotFound(_))
        ));
        assert!(matches!(
            orders.history(order.id).await,
            Err(MarketError::NotFound(_))
        ));
    }
}
