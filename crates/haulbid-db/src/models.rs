//! Database models - mapped from PostgreSQL tables
//!
//! Rows keep enums as TEXT and scores as SMALLINT; `TryFrom` converts them
//! into the domain types and rejects values the schema should never hold.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use haulbid_types::{
    Account, AccountId, Bid, BidId, Dimensions, Notification, NotificationId, Order, OrderId,
    Rating, RatingCategories, RatingId, Review, ReviewId, Role, StatusUpdate, StatusUpdateId,
};

use crate::error::DbError;

// ============================================================================
// Column Lists
// ============================================================================

macro_rules! account_columns {
    () => {
        "id, username, email, password_hash, role, is_active, reset_token_hash, reset_token_expiry, created_at"
    };
}

macro_rules! order_columns {
    () => {
        "id, owner_id, title, description, pickup_address, delivery_address, package_type, weight, \
         dimensions, urgency, pickup_date, preferred_date, budget, status, created_at, updated_at"
    };
}

macro_rules! bid_columns {
    () => {
        "id, order_id, bidder_id, amount, message, estimated_duration, description, status, \
         created_at, updated_at"
    };
}

macro_rules! rating_columns {
    () => {
        "id, order_id, user_id, owner_id, rating, review, communication, timeliness, packaging, \
         professionalism, is_recommended, is_verified, created_at, updated_at"
    };
}

macro_rules! status_update_columns {
    () => {
        "id, order_id, previous_status, new_status, updated_by, updated_by_role, message, timestamp"
    };
}

macro_rules! notification_columns {
    () => {
        "id, user_id, kind, title, message, order_id, is_read, priority, action_url, created_at"
    };
}

pub(crate) use {
    account_columns, bid_columns, notification_columns, order_columns, rating_columns,
    status_update_columns,
};

// ============================================================================
// Account
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub reset_token_hash: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbAccount> for Account {
    type Error = DbError;

    fn try_from(row: DbAccount) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(DbError::Serialization)?;
        Ok(Account {
            id: AccountId(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            is_active: row.is_active,
            reset_token_hash: row.reset_token_hash,
            reset_token_expiry: row.reset_token_expiry,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Order
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbOrder {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub package_type: String,
    pub weight: Option<f64>,
    pub dimensions: Option<Json<Dimensions>>,
    pub urgency: String,
    pub pickup_date: Option<NaiveDate>,
    pub preferred_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbOrder> for Order {
    type Error = DbError;

    fn try_from(row: DbOrder) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderId(row.id),
            owner_id: row.owner_id.map(AccountId),
            title: row.title,
            description: row.description,
            pickup_address: row.pickup_address,
            delivery_address: row.delivery_address,
            package_type: row.package_type.parse()?,
            weight: row.weight,
            dimensions: row.dimensions.map(|Json(d)| d),
            urgency: row.urgency.parse()?,
            pickup_date: row.pickup_date,
            preferred_date: row.preferred_date,
            budget: row.budget,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbStatusUpdate {
    pub id: Uuid,
    pub order_id: Uuid,
    pub previous_status: String,
    pub new_status: String,
    pub updated_by: Option<Uuid>,
    pub updated_by_role: String,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<DbStatusUpdate> for StatusUpdate {
    type Error = DbError;

    fn try_from(row: DbStatusUpdate) -> Result<Self, Self::Error> {
        Ok(StatusUpdate {
            id: StatusUpdateId(row.id),
            order_id: OrderId(row.order_id),
            previous_status: row.previous_status.parse()?,
            new_status: row.new_status.parse()?,
            updated_by: row.updated_by.map(AccountId),
            updated_by_role: row.updated_by_role.parse()?,
            message: row.message,
            timestamp: row.timestamp,
        })
    }
}

// ============================================================================
// Bid
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbBid {
    pub id: Uuid,
    pub order_id: Uuid,
    pub bidder_id: Uuid,
    pub amount: f64,
    pub message: Option<String>,
    pub estimated_duration: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbBid> for Bid {
    type Error = DbError;

    fn try_from(row: DbBid) -> Result<Self, Self::Error> {
        Ok(Bid {
            id: BidId(row.id),
            order_id: OrderId(row.order_id),
            bidder_id: AccountId(row.bidder_id),
            amount: row.amount,
            message: row.message,
            estimated_duration: row.estimated_duration,
            description: row.description,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Rating & Review
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbRating {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub owner_id: Uuid,
    pub rating: i16,
    pub review: String,
    pub communication: i16,
    pub timeliness: i16,
    pub packaging: i16,
    pub professionalism: i16,
    pub is_recommended: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn score(field: &str, value: i16) -> Result<u8, DbError> {
    Ok(haulbid_types::ensure_score(field, value as i64)?)
}

impl TryFrom<DbRating> for Rating {
    type Error = DbError;

    fn try_from(row: DbRating) -> Result<Self, Self::Error> {
        Ok(Rating {
            id: RatingId(row.id),
            order_id: OrderId(row.order_id),
            user_id: AccountId(row.user_id),
            owner_id: AccountId(row.owner_id),
            rating: score("rating", row.rating)?,
            review: row.review,
            categories: RatingCategories {
                communication: score("communication", row.communication)?,
                timeliness: score("timeliness", row.timeliness)?,
                packaging: score("packaging", row.packaging)?,
                professionalism: score("professionalism", row.professionalism)?,
            },
            is_recommended: row.is_recommended,
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbReview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: String,
    pub review: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbReview> for Review {
    type Error = DbError;

    fn try_from(row: DbReview) -> Result<Self, Self::Error> {
        Ok(Review {
            id: ReviewId(row.id),
            user_id: AccountId(row.user_id),
            item_id: row.item_id,
            review: row.review,
            rating: score("rating", row.rating)?,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Notification
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub order_id: Option<Uuid>,
    pub is_read: bool,
    pub priority: String,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbNotification> for Notification {
    type Error = DbError;

    fn try_from(row: DbNotification) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: NotificationId(row.id),
            user_id: AccountId(row.user_id),
            kind: row.kind.parse()?,
            title: row.title,
            message: row.message,
            order_id: row.order_id.map(OrderId),
            is_read: row.is_read,
            priority: row.priority.parse()?,
            action_url: row.action_url,
            created_at: row.created_at,
        })
    }
}

/// Convert a batch of rows
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DbError>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_row_converts() {
        let row = DbOrder {
            id: Uuid::new_v4(),
            owner_id: None,
            title: "Crates".into(),
            description: "Six crates".into(),
            pickup_address: "A".into(),
            delivery_address: "B".into(),
            package_type: "fragile".into(),
            weight: Some(12.0),
            dimensions: Some(Json(Dimensions {
                length: 1.0,
                width: 2.0,
                height: 3.0,
            })),
            urgency: "urgent".into(),
            pickup_date: None,
            preferred_date: NaiveDate::from_ymd_opt(2025, 1, 2),
            budget: None,
            status: "in_transit".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let order = Order::try_from(row).unwrap();
        assert_eq!(order.status, haulbid_types::OrderStatus::InTransit);
        assert_eq!(order.package_type, haulbid_types::PackageType::Fragile);
        assert_eq!(order.dimensions.map(|d| d.height), Some(3.0));
    }

    #[test]
    fn test_bad_enum_text_is_serialization_error() {
        let row = DbAccount {
            id: Uuid::new_v4(),
            username: "x".into(),
            email: "x@y.z".into(),
            password_hash: "h".into(),
            role: "root".into(),
            is_active: true,
            reset_token_hash: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            Account::try_from(row),
            Err(DbError::Serialization(_))
        ));
    }
}
