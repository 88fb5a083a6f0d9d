//! Generic review repository

use async_trait::async_trait;
use sqlx::PgPool;

use haulbid_types::Review;

use super::ReviewRepository;
use crate::error::DbResult;
use crate::models::{convert_all, DbReview};

/// PostgreSQL review repository
pub struct PgReviewRepo {
    pool: PgPool,
}

impl PgReviewRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepo {
    async fn insert(&self, review: &Review) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, user_id, item_id, review, rating, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(review.id.0)
        .bind(review.user_id.0)
        .bind(&review.item_id)
        .bind(&review.review)
        .bind(review.rating as i16)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, DbReview>(
            r#"
            SELECT id, user_id, item_id, review, rating, created_at
            FROM reviews
            WHERE item_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }
}
