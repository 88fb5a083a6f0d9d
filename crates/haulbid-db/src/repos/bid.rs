//! Bid repository
//!
//! `place`, `accept` and `cancel_acceptance` lock the order row first, so
//! every write touching an order's bid set is serialized per order. The
//! partial unique index on accepted bids backs this up at the schema level.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use haulbid_types::{Actor, Bid, BidId, BidStatus, OrderId, OrderStatus, StatusUpdate};

use super::order::{apply_status, expect_status, lock_order};
use super::{Acceptance, BidFilter, BidPlacement, BidRepository, Reopening, ACCEPTING_STATUS};
use crate::error::{DbError, DbResult};
use crate::models::{bid_columns, convert_all, DbBid};

/// PostgreSQL bid repository
pub struct PgBidRepo {
    pool: PgPool,
}

impl PgBidRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_bid(conn: &mut PgConnection, order_id: OrderId, bid_id: BidId) -> DbResult<Bid> {
    let row = sqlx::query_as::<_, DbBid>(concat!(
        "SELECT ",
        bid_columns!(),
        " FROM bids WHERE id = $1 AND order_id = $2 FOR UPDATE"
    ))
    .bind(bid_id.0)
    .bind(order_id.0)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("Bid {} on order {}", bid_id, order_id)))?;

    Bid::try_from(row)
}

#[async_trait]
impl BidRepository for PgBidRepo {
    async fn place(&self, bid: &Bid) -> DbResult<BidPlacement> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, bid.order_id).await?;
        if !order.status.accepts_bids() {
            return Err(DbError::Conflict(format!(
                "Order {} is {} and not open for bids",
                order.id, order.status
            )));
        }

        let row = sqlx::query_as::<_, DbBid>(concat!(
            "INSERT INTO bids (id, order_id, bidder_id, amount, message, estimated_duration, ",
            "description, status, created_at, updated_at) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING ",
            bid_columns!()
        ))
        .bind(bid.id.0)
        .bind(bid.order_id.0)
        .bind(bid.bidder_id.0)
        .bind(bid.amount)
        .bind(bid.message.as_deref())
        .bind(bid.estimated_duration.as_deref())
        .bind(bid.description.as_deref())
        .bind(bid.status.as_str())
        .bind(bid.created_at)
        .bind(bid.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let (order, opened) = if order.status == OrderStatus::Published {
            let update = StatusUpdate::record(
                order.id,
                OrderStatus::Published,
                OrderStatus::Bidding,
                Actor::system(),
                Some("First bid received".to_string()),
            );
            (apply_status(&mut tx, &update).await?, Some(update))
        } else {
            (order, None)
        };

        tx.commit().await?;

        Ok(BidPlacement {
            bid: Bid::try_from(row)?,
            order,
            opened,
        })
    }

    async fn find_by_id(&self, id: BidId) -> DbResult<Option<Bid>> {
        let row = sqlx::query_as::<_, DbBid>(concat!(
            "SELECT ",
            bid_columns!(),
            " FROM bids WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Bid::try_from).transpose()
    }

    async fn list(&self, filter: BidFilter) -> DbResult<Vec<Bid>> {
        let rows = sqlx::query_as::<_, DbBid>(concat!(
            "SELECT ",
            bid_columns!(),
            " FROM bids WHERE ($1::uuid IS NULL OR bidder_id = $1) ",
            "AND ($2::uuid IS NULL OR order_id = $2) ORDER BY created_at DESC"
        ))
        .bind(filter.bidder_id.map(|id| id.0))
        .bind(filter.order_id.map(|id| id.0))
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn update_pending(&self, bid: &Bid) -> DbResult<Bid> {
        let row = sqlx::query_as::<_, DbBid>(concat!(
            "UPDATE bids SET amount = $2, message = $3, estimated_duration = $4, ",
            "description = $5, updated_at = $6 WHERE id = $1 AND status = 'pending' RETURNING ",
            bid_columns!()
        ))
        .bind(bid.id.0)
        .bind(bid.amount)
        .bind(bid.message.as_deref())
        .bind(bid.estimated_duration.as_deref())
        .bind(bid.description.as_deref())
        .bind(bid.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Bid::try_from(row),
            None => match self.find_by_id(bid.id).await? {
                Some(current) => Err(DbError::Conflict(format!(
                    "Bid {} is {} and can no longer be edited",
                    bid.id, current.status
                ))),
                None => Err(DbError::NotFound(format!("Bid {}", bid.id))),
            },
        }
    }

    async fn set_status(&self, id: BidId, from: BidStatus, to: BidStatus) -> DbResult<Bid> {
        let row = sqlx::query_as::<_, DbBid>(concat!(
            "UPDATE bids SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2 RETURNING ",
            bid_columns!()
        ))
        .bind(id.0)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Bid::try_from(row),
            None => match self.find_by_id(id).await? {
                Some(current) => Err(DbError::Conflict(format!(
                    "Bid {} is {}, expected {}",
                    id, current.status, from
                ))),
                None => Err(DbError::NotFound(format!("Bid {}", id))),
            },
        }
    }

    async fn delete(&self, id: BidId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM bids WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Bid {}", id)));
        }
        Ok(())
    }

    async fn accept(&self, order_id: OrderId, bid_id: BidId, actor: Actor) -> DbResult<Acceptance> {
        let mut tx = self.pool.begin().await?;

        // 1. Lock the order; a concurrent accept blocks here and then sees `assigned`
        let order = lock_order(&mut tx, order_id).await?;
        expect_status(&order, ACCEPTING_STATUS)?;

        // 2. The target bid must still be pending
        let bid = lock_bid(&mut tx, order_id, bid_id).await?;
        if bid.status != BidStatus::Pending {
            return Err(DbError::Conflict(format!(
                "Bid {} is {} and cannot be accepted",
                bid_id, bid.status
            )));
        }

        // 3. Accept the target and reject its pending siblings
        let accepted = sqlx::query_as::<_, DbBid>(concat!(
            "UPDATE bids SET status = 'accepted', updated_at = NOW() WHERE id = $1 RETURNING ",
            bid_columns!()
        ))
        .bind(bid_id.0)
        .fetch_one(&mut *tx)
        .await?;

        let rejected = sqlx::query_as::<_, DbBid>(concat!(
            "UPDATE bids SET status = 'rejected', updated_at = NOW() ",
            "WHERE order_id = $1 AND id <> $2 AND status = 'pending' RETURNING ",
            bid_columns!()
        ))
        .bind(order_id.0)
        .bind(bid_id.0)
        .fetch_all(&mut *tx)
        .await?;

        // 4. Assign the order
        let update = StatusUpdate::record(
            order_id,
            order.status,
            OrderStatus::Assigned,
            actor,
            Some(format!("Bid {} accepted", bid_id)),
        );
        let order = apply_status(&mut tx, &update).await?;

        tx.commit().await?;

        Ok(Acceptance {
            order,
            accepted: Bid::try_from(accepted)?,
            rejected: convert_all(rejected)?,
            update,
        })
    }

    async fn cancel_acceptance(
        &self,
        order_id: OrderId,
        bid_id: BidId,
        actor: Actor,
    ) -> DbResult<Reopening> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        expect_status(&order, OrderStatus::Assigned)?;

        let bid = lock_bid(&mut tx, order_id, bid_id).await?;
        if bid.status != BidStatus::Accepted {
            return Err(DbError::Conflict(format!(
                "Bid {} is {}, not the accepted bid",
                bid_id, bid.status
            )));
        }

        let reset = sqlx::query_as::<_, DbBid>(concat!(
            "UPDATE bids SET status = 'pending', updated_at = NOW() ",
            "WHERE order_id = $1 AND status IN ('accepted', 'rejected') RETURNING ",
            bid_columns!()
        ))
        .bind(order_id.0)
        .fetch_all(&mut *tx)
        .await?;

        let update = StatusUpdate::record(
            order_id,
            OrderStatus::Assigned,
            OrderStatus::Bidding,
            actor,
            Some(format!("Acceptance of bid {} cancelled", bid_id)),
        );
        let order = apply_status(&mut tx, &update).await?;

        tx.commit().await?;

        Ok(Reopening {
            order,
            reset: convert_all(reset)?,
            update,
        })
    }

    async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bids")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
