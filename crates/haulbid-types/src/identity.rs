//! Identity types for HaulBid
//!
//! Every entity id is a strongly typed wrapper around a UUID so an order id
//! can never be passed where a bid id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.trim();
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Parties
define_id_type!(AccountId, "acct", "Unique identifier for a user, owner or admin account");

// Marketplace records
define_id_type!(OrderId, "order", "Unique identifier for a delivery order");
define_id_type!(BidId, "bid", "Unique identifier for a bid placed against an order");
define_id_type!(RatingId, "rating", "Unique identifier for a post-delivery rating");
define_id_type!(ReviewId, "review", "Unique identifier for a generic review");

// Messaging & history
define_id_type!(NotificationId, "notif", "Unique identifier for a notification");
define_id_type!(StatusUpdateId, "status", "Unique identifier for an order status history entry");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_prefix() {
        let id = OrderId::new();
        assert!(id.to_string().starts_with("order_"));
        assert_eq!(id.to_string(), id.to_prefixed_string());
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        let id = BidId::new();
        assert_eq!(BidId::parse(&id.to_prefixed_string()).unwrap(), id);
        assert_eq!(BidId::parse(&id.0.to_string()).unwrap(), id);
        assert!(BidId::parse("bid_not-a-uuid").is_err());
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let id = AccountId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
