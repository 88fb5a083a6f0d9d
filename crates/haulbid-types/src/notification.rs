//! Notifications and order status history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::account::Role;
use crate::error::{ensure_max_chars, DomainError, Result};
use crate::identity::{AccountId, NotificationId, OrderId, StatusUpdateId};
use crate::order::OrderStatus;

/// Maximum notification message length
pub const NOTIFICATION_MAX_CHARS: usize = 500;

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderStatus,
    BidReceived,
    BidAccepted,
    BidRejected,
    #[default]
    System,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderStatus => "order_status",
            Self::BidReceived => "bid_received",
            Self::BidAccepted => "bid_accepted",
            Self::BidRejected => "bid_rejected",
            Self::System => "system",
            Self::Reminder => "reminder",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "order_status" => Ok(Self::OrderStatus),
            "bid_received" => Ok(Self::BidReceived),
            "bid_accepted" => Ok(Self::BidAccepted),
            "bid_rejected" => Ok(Self::BidRejected),
            "system" => Ok(Self::System),
            "reminder" => Ok(Self::Reminder),
            other => Err(DomainError::invalid_input(
                "type",
                format!("unknown notification type '{}'", other),
            )),
        }
    }
}

/// Notification priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(DomainError::invalid_input(
                "priority",
                format!("unknown priority '{}'", other),
            )),
        }
    }
}

/// A message delivered to one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: AccountId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub order_id: Option<OrderId>,
    pub is_read: bool,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Notification input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: Option<AccountId>,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: String,
    pub message: String,
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub priority: Priority,
    pub action_url: Option<String>,
}

impl NewNotification {
    /// Shorthand for marketplace-generated notifications
    pub fn to(user_id: AccountId, kind: NotificationKind, title: &str, message: String) -> Self {
        Self {
            user_id: Some(user_id),
            kind,
            title: title.to_string(),
            message,
            ..Default::default()
        }
    }

    pub fn about_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Validate, sanitize and stamp
    pub fn into_notification(self) -> Result<Notification> {
        let message = self.message.trim();
        let mut missing = Vec::new();
        if self.user_id.is_none() {
            missing.push("userId".to_string());
        }
        if message.is_empty() {
            missing.push("message".to_string());
        }
        let user_id = match self.user_id {
            Some(id) if missing.is_empty() => id,
            _ => return Err(DomainError::MissingFields(missing)),
        };
        ensure_max_chars("message", message, NOTIFICATION_MAX_CHARS)?;

        Ok(Notification {
            id: NotificationId::new(),
            user_id,
            kind: self.kind,
            title: strip_markup(self.title.trim()),
            message: strip_markup(message),
            order_id: self.order_id,
            is_read: false,
            priority: self.priority,
            action_url: self.action_url,
            created_at: Utc::now(),
        })
    }
}

/// Drop angle brackets so stored text can't carry markup
pub fn strip_markup(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '<' | '>')).collect()
}

// ============================================================================
// Status History
// ============================================================================

/// Who changed an order's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    User,
    Owner,
    Admin,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for ActorRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "system" => Ok(Self::System),
            other => Err(DomainError::invalid_input(
                "updatedByRole",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

impl From<Role> for ActorRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Owner => Self::Owner,
            Role::Admin => Self::Admin,
        }
    }
}

/// The party performing a lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<AccountId>,
    pub role: ActorRole,
}

impl Actor {
    pub fn account(id: AccountId, role: Role) -> Self {
        Self {
            id: Some(id),
            role: role.into(),
        }
    }

    pub fn system() -> Self {
        Self {
            id: None,
            role: ActorRole::System,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub id: StatusUpdateId,
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub updated_by: Option<AccountId>,
    pub updated_by_role: ActorRole,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn record(
        order_id: OrderId,
        previous_status: OrderStatus,
        new_status: OrderStatus,
        actor: Actor,
        message: Option<String>,
    ) -> Self {
        Self {
            id: StatusUpdateId::new(),
            order_id,
            previous_status,
            new_status,
            updated_by: actor.id,
            updated_by_role: actor.role,
            message,
            timestamp: Utc::now(),
        }
    }
}
