//! Notification repository

use async_trait::async_trait;
use sqlx::PgPool;

use haulbid_types::{AccountId, Notification, NotificationId};

use super::NotificationRepository;
use crate::error::{DbError, DbResult};
use crate::models::{convert_all, notification_columns, DbNotification};

/// PostgreSQL notification repository
pub struct PgNotificationRepo {
    pool: PgPool,
}

impl PgNotificationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepo {
    async fn insert(&self, notification: &Notification) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, kind, title, message, order_id, is_read, priority, action_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id.0)
        .bind(notification.user_id.0)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.order_id.map(|id| id.0))
        .bind(notification.is_read)
        .bind(notification.priority.as_str())
        .bind(notification.action_url.as_deref())
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: AccountId) -> DbResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, DbNotification>(concat!(
            "SELECT ",
            notification_columns!(),
            " FROM notifications WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn mark_read(&self, id: NotificationId) -> DbResult<Notification> {
        let row = sqlx::query_as::<_, DbNotification>(concat!(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING ",
            notification_columns!()
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Notification {}", id)))?;

        Notification::try_from(row)
    }
}
