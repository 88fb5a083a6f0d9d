//! Rating repository

use async_trait::async_trait;
use sqlx::PgPool;

use haulbid_types::{AccountId, Rating};

use super::RatingRepository;
use crate::error::DbResult;
use crate::models::{convert_all, rating_columns, DbRating};

/// PostgreSQL rating repository
pub struct PgRatingRepo {
    pool: PgPool,
}

impl PgRatingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RatingRepository for PgRatingRepo {
    async fn upsert(&self, rating: &Rating) -> DbResult<Rating> {
        let row = sqlx::query_as::<_, DbRating>(concat!(
            "INSERT INTO ratings (id, order_id, user_id, owner_id, rating, review, communication, ",
            "timeliness, packaging, professionalism, is_recommended, is_verified, created_at, updated_at) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) ",
            "ON CONFLICT (order_id, user_id) DO UPDATE SET ",
            "owner_id = EXCLUDED.owner_id, rating = EXCLUDED.rating, review = EXCLUDED.review, ",
            "communication = EXCLUDED.communication, timeliness = EXCLUDED.timeliness, ",
            "packaging = EXCLUDED.packaging, professionalism = EXCLUDED.professionalism, ",
            "is_recommended = EXCLUDED.is_recommended, updated_at = EXCLUDED.updated_at ",
            "RETURNING ",
            rating_columns!()
        ))
        .bind(rating.id.0)
        .bind(rating.order_id.0)
        .bind(rating.user_id.0)
        .bind(rating.owner_id.0)
        .bind(rating.rating as i16)
        .bind(&rating.review)
        .bind(rating.categories.communication as i16)
        .bind(rating.categories.timeliness as i16)
        .bind(rating.categories.packaging as i16)
        .bind(rating.categories.professionalism as i16)
        .bind(rating.is_recommended)
        .bind(rating.is_verified)
        .bind(rating.created_at)
        .bind(rating.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Rating::try_from(row)
    }

    async fn list_for_owner(&self, owner_id: AccountId) -> DbResult<Vec<Rating>> {
        let rows = sqlx::query_as::<_, DbRating>(concat!(
            "SELECT ",
            rating_columns!(),
            " FROM ratings WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id.0)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }
}
