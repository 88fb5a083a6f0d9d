//! Rating Aggregator
//!
//! One rating per (order, rater); resubmitting revises it in place.
//! Summaries are always recomputed from the full rating set on read.

use std::sync::Arc;

use haulbid_db::{AccountRepository, BidFilter, BidRepository, OrderRepository, RatingRepository};
use haulbid_types::{
    AccountId, Actor, BidStatus, DomainError, OrderStatus, Rating, RatingSubmission, RatingSummary,
};

use crate::error::{MarketError, MarketResult};
use crate::Bounded;

#[derive(Clone)]
pub struct RatingAggregator {
    ratings: Arc<dyn RatingRepository>,
    orders: Arc<dyn OrderRepository>,
    bids: Arc<dyn BidRepository>,
    accounts: Arc<dyn AccountRepository>,
    store: Bounded,
}

impl RatingAggregator {
    pub fn new(
        ratings: Arc<dyn RatingRepository>,
        orders: Arc<dyn OrderRepository>,
        bids: Arc<dyn BidRepository>,
        accounts: Arc<dyn AccountRepository>,
        store: Bounded,
    ) -> Self {
        Self {
            ratings,
            orders,
            bids,
            accounts,
            store,
        }
    }

    /// Rate the carrier of a delivered order
    pub async fn submit(&self, actor: Actor, submission: RatingSubmission) -> MarketResult<Rating> {
        if !actor.is_admin() && actor.id != Some(submission.user_id) {
            return Err(MarketError::forbidden("ratings are submitted as yourself"));
        }

        let order_id = submission.order_id;
        let order = self
            .store
            .run(self.orders.find_by_id(order_id))
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Order {}", order_id)))?;
        if !actor.is_admin() && order.owner_id != Some(submission.user_id) {
            return Err(MarketError::forbidden("only the order's creator may rate it"));
        }
        if order.status != OrderStatus::Delivered {
            return Err(DomainError::invalid_input(
                "orderId",
                format!("order is {}; only delivered orders can be rated", order.status),
            )
            .into());
        }

        let carrier = self
            .store
            .run(self.bids.list(BidFilter {
                order_id: Some(order_id),
                ..Default::default()
            }))
            .await?
            .into_iter()
            .find(|b| b.status == BidStatus::Accepted)
            .map(|b| b.bidder_id);
        if let Some(carrier) = carrier {
            if carrier != submission.owner_id {
                return Err(DomainError::invalid_input(
                    "ownerId",
                    "does not match the company that carried this order",
                )
                .into());
            }
        }

        let mut rating = submission.into_rating()?;
        rating.is_verified = carrier.is_some();
        let stored = self.store.run(self.ratings.upsert(&rating)).await?;
        tracing::info!(
            order_id = %order_id,
            owner_id = %stored.owner_id,
            rating = stored.rating,
            "rating recorded"
        );
        Ok(stored)
    }

    pub async fn list(&self, owner_id: AccountId) -> MarketResult<Vec<Rating>> {
        self.store.run(self.ratings.list_for_owner(owner_id)).await
    }

    /// Derived statistics; zeroed when the owner has no ratings
    pub async fn summarize(&self, owner_id: AccountId) -> MarketResult<RatingSummary> {
        let ratings = self.list(owner_id).await?;
        let company_name = self
            .store
            .run(self.accounts.find_by_id(owner_id))
            .await?
            .map(|a| a.username)
            .unwrap_or_default();
        Ok(RatingSummary::calculate(owner_id, company_name, &ratings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BidLedger, Notifier, OrderLifecycle};
    use haulbid_db::MemoryStore;
    use haulbid_types::{
        Account, BidDetails, CategoryScores, Order, OrderPayload, Role,
    };

    struct Fixture {
        ratings: RatingAggregator,
        orders: OrderLifecycle,
        bids: BidLedger,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::new(store.clone(), Bounded::default());
        Fixture {
            ratings: RatingAggregator::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                Bounded::default(),
            ),
            orders: OrderLifecycle::new(store.clone(), store.clone(), notifier.clone(), Bounded::default()),
            bids: BidLedger::new(store.clone(), store.clone(), notifier, Bounded::default()),
            store,
        }
    }

    fn payload() -> OrderPayload {
        OrderPayload {
            load_from: Some("Leeds".into()),
            load_to: Some("York".into()),
            order_date: Some("2026-03-01".into()),
            delivery_date: Some("2026-03-04".into()),
            description: Some("Pallet".into()),
            bid_amount: Some(80.0),
            ..Default::default()
        }
    }

    impl Fixture {
        /// Customer order carried to delivery by `carrier`
        async fn delivered(&self, customer: Actor, carrier: Actor) -> Order {
            let order = self.orders.create(&payload(), customer.id).await.unwrap();
            let bid = self
                .bids
                .submit(carrier, order.id, 75.0, BidDetails::default())
                .await
                .unwrap();
            self.bids.accept(customer, order.id, bid.id).await.unwrap();
            for status in [OrderStatus::InTransit, OrderStatus::Delivered] {
                self.orders
                    .update_status(carrier, order.id, status, None)
                    .await
                    .unwrap();
            }
            self.orders.get(order.id).await.unwrap()
        }
    }

    fn submission(order: &Order, customer: Actor, carrier: Actor, rating: i64) -> RatingSubmission {
        RatingSubmission {
            order_id: order.id,
            user_id: customer.id.unwrap(),
            owner_id: carrier.id.unwrap(),
            rating,
            review: "On time".into(),
            categories: CategoryScores::default(),
            is_recommended: true,
        }
    }

    #[tokio::test]
    async fn test_resubmit_revises() {
        let f = fixture();
        let customer = Actor::account(AccountId::new(), Role::User);
        let carrier = Actor::account(AccountId::new(), Role::Owner);
        let order = f.delivered(customer, carrier).await;

        let first = f
            .ratings
            .submit(customer, submission(&order, customer, carrier, 4))
            .await
            .unwrap();
        assert!(first.is_verified);
        let second = f
            .ratings
            .submit(customer, submission(&order, customer, carrier, 2))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);

        let all = f.ratings.list(carrier.id.unwrap()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].rating, 2);
    }

    #[tokio::test]
    async fn test_out_of_range() {
        let f = fixture();
        let customer = Actor::account(AccountId::new(), Role::User);
        let carrier = Actor::account(AccountId::new(), Role::Owner);
        let order = f.delivered(customer, carrier).await;

        let err = f
            .ratings
            .submit(customer, submission(&order, customer, carrier, 6))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "OUT_OF_RANGE");
    }

    #[tokio::test]
    async fn test_requires_delivery_and_matching_carrier() {
        let f = fixture();
        let customer = Actor::account(AccountId::new(), Role::User);
        let carrier = Actor::account(AccountId::new(), Role::Owner);

        let open = f.orders.create(&payload(), customer.id).await.unwrap();
        let err = f
            .ratings
            .submit(customer, submission(&open, customer, carrier, 5))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let order = f.delivered(customer, carrier).await;
        let impostor = Actor::account(AccountId::new(), Role::Owner);
        let err = f
            .ratings
            .submit(customer, submission(&order, customer, impostor, 5))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let stranger = Actor::account(AccountId::new(), Role::User);
        let err = f
            .ratings
            .submit(stranger, submission(&order, stranger, carrier, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_summary() {
        let f = fixture();
        let carrier_account = Account::new(
            "swift_freight".into(),
            "ops@swift.test".into(),
            "hash".into(),
            Role::Owner,
        );
        AccountRepository::create(f.store.as_ref(), &carrier_account)
            .await
            .unwrap();
        let carrier = Actor::account(carrier_account.id, Role::Owner);

        let empty = f.ratings.summarize(carrier_account.id).await.unwrap();
        assert_eq!(empty.total_ratings, 0);
        assert_eq!(empty.average_rating, 0.0);
        assert_eq!(empty.company_name, "swift_freight");

        for (score, recommended) in [(5, true), (4, true), (4, false)] {
            let customer = Actor::account(AccountId::new(), Role::User);
            let order = f.delivered(customer, carrier).await;
            let mut s = submission(&order, customer, carrier, score);
            s.is_recommended = recommended;
            f.ratings.submit(customer, s).await.unwrap();
        }

        let summary = f.ratings.summarize(carrier_account.id).await.unwrap();
        assert_eq!(summary.total_ratings, 3);
        assert_eq!(summary.average_rating, 4.3);
        assert_eq!(summary.rating_distribution[&4], 2);
        assert_eq!(summary.recommendation_rate, 67);

        let unknown = f.ratings.summarize(AccountId::new()).await.unwrap();
        assert_eq!(unknown.company_name, "");
    }
}
