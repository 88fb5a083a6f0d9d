//! Order repository

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use haulbid_types::{AccountId, Order, OrderId, OrderStatus, StatusUpdate};

use super::OrderRepository;
use crate::error::{DbError, DbResult};
use crate::models::{order_columns, status_update_columns, DbOrder, DbStatusUpdate};

/// PostgreSQL order repository
pub struct PgOrderRepo {
    pool: PgPool,
}

impl PgOrderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Shared transactional helpers (also used by the bid repository)
// ============================================================================

/// Load an order and hold its row lock until the transaction ends
pub(crate) async fn lock_order(conn: &mut PgConnection, id: OrderId) -> DbResult<Order> {
    let row = sqlx::query_as::<_, DbOrder>(concat!(
        "SELECT ",
        order_columns!(),
        " FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("Order {}", id)))?;

    Order::try_from(row)
}

/// Write a new status and its history entry. The caller holds the row lock.
pub(crate) async fn apply_status(conn: &mut PgConnection, update: &StatusUpdate) -> DbResult<Order> {
    let row = sqlx::query_as::<_, DbOrder>(concat!(
        "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING ",
        order_columns!()
    ))
    .bind(update.order_id.0)
    .bind(update.new_status.as_str())
    .bind(update.timestamp)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO order_status_updates
            (id, order_id, previous_status, new_status, updated_by, updated_by_role, message, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(update.id.0)
    .bind(update.order_id.0)
    .bind(update.previous_status.as_str())
    .bind(update.new_status.as_str())
    .bind(update.updated_by.map(|id| id.0))
    .bind(update.updated_by_role.as_str())
    .bind(update.message.as_deref())
    .bind(update.timestamp)
    .execute(&mut *conn)
    .await?;

    Order::try_from(row)
}

/// Fail with `Conflict` unless the locked order is in `expected`
pub(crate) fn expect_status(order: &Order, expected: OrderStatus) -> DbResult<()> {
    if order.status != expected {
        return Err(DbError::Conflict(format!(
            "Order {} is {}, expected {}",
            order.id, order.status, expected
        )));
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for PgOrderRepo {
    async fn insert(&self, order: &Order) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, owner_id, title, description, pickup_address, delivery_address, package_type,
                 weight, dimensions, urgency, pickup_date, preferred_date, budget, status,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id.0)
        .bind(order.owner_id.map(|id| id.0))
        .bind(&order.title)
        .bind(&order.description)
        .bind(&order.pickup_address)
        .bind(&order.delivery_address)
        .bind(order.package_type.as_str())
        .bind(order.weight)
        .bind(order.dimensions.map(Json))
        .bind(order.urgency.as_str())
        .bind(order.pickup_date)
        .bind(order.preferred_date)
        .bind(order.budget)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, DbOrder>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list(&self, owner_id: Option<AccountId>) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, DbOrder>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE ($1::uuid IS NULL OR owner_id = $1) ORDER BY created_at DESC"
        ))
        .bind(owner_id.map(|id| id.0))
        .fetch_all(&self.pool)
        .await?;

        crate::models::convert_all(rows)
    }

    async fn update_details(&self, order: &Order) -> DbResult<Order> {
        let row = sqlx::query_as::<_, DbOrder>(concat!(
            "UPDATE orders SET title = $2, description = $3, pickup_address = $4, ",
            "delivery_address = $5, package_type = $6, weight = $7, dimensions = $8, urgency = $9, ",
            "preferred_date = $10, budget = $11, updated_at = $12 ",
            "WHERE id = $1 RETURNING ",
            order_columns!()
        ))
        .bind(order.id.0)
        .bind(&order.title)
        .bind(&order.description)
        .bind(&order.pickup_address)
        .bind(&order.delivery_address)
        .bind(order.package_type.as_str())
        .bind(order.weight)
        .bind(order.dimensions.map(Json))
        .bind(order.urgency.as_str())
        .bind(order.preferred_date)
        .bind(order.budget)
        .bind(order.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Order {}", order.id)))?;

        Order::try_from(row)
    }

    async fn transition(&self, update: &StatusUpdate) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, update.order_id).await?;
        expect_status(&order, update.previous_status)?;
        let order = apply_status(&mut tx, update).await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn delete(&self, id: OrderId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Order {}", id)));
        }
        Ok(())
    }

    async fn history(&self, id: OrderId) -> DbResult<Vec<StatusUpdate>> {
        let rows = sqlx::query_as::<_, DbStatusUpdate>(concat!(
            "SELECT ",
            status_update_columns!(),
            " FROM order_status_updates WHERE order_id = $1 ORDER BY timestamp ASC"
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        crate::models::convert_all(rows)
    }

    async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
