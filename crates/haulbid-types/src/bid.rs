//! Bid types
//!
//! A bid is an owner's priced offer against one order. The ledger allows
//! several bids from the same owner on the same order; at most one bid per
//! order may be accepted at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::{DomainError, Result};
use crate::identity::{AccountId, BidId, OrderId};

/// Bid status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BidStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(DomainError::invalid_input(
                "status",
                format!("unknown bid status '{}'", other),
            )),
        }
    }
}

/// A bid placed by an owner against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: BidId,
    pub order_id: OrderId,
    pub bidder_id: AccountId,
    pub amount: f64,
    pub message: Option<String>,
    pub estimated_duration: Option<String>,
    pub description: Option<String>,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    /// Create a pending bid after validating the amount
    pub fn new(
        order_id: OrderId,
        bidder_id: AccountId,
        amount: f64,
        details: BidDetails,
    ) -> Result<Self> {
        validate_amount(amount)?;
        let now = Utc::now();
        Ok(Self {
            id: BidId::new(),
            order_id,
            bidder_id,
            amount,
            message: details.message,
            estimated_duration: details.estimated_duration,
            description: details.description,
            status: BidStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Withdrawn bids take no part in pricing or acceptance
    pub fn is_live(&self) -> bool {
        self.status != BidStatus::Withdrawn
    }
}

/// Optional free-text details attached to a bid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BidDetails {
    pub message: Option<String>,
    pub estimated_duration: Option<String>,
    pub description: Option<String>,
}

/// Fields a bidder may change while the bid is pending
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BidPatch {
    pub amount: Option<f64>,
    pub message: Option<String>,
    pub estimated_duration: Option<String>,
    pub description: Option<String>,
}

impl BidPatch {
    pub fn apply(&self, bid: &mut Bid) -> Result<()> {
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
            bid.amount = amount;
        }
        if self.message.is_some() {
            bid.message = self.message.clone();
        }
        if self.estimated_duration.is_some() {
            bid.estimated_duration = self.estimated_duration.clone();
        }
        if self.description.is_some() {
            bid.description = self.description.clone();
        }
        bid.updated_at = Utc::now();
        Ok(())
    }
}

/// Reject non-positive and non-finite amounts
pub fn validate_amount(amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(DomainError::InvalidAmount(amount))
    }
}

/// Price statistics over an order's live bids
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BidStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl BidStats {
    /// Compute over non-withdrawn bids; zeroed when none remain
    pub fn from_bids(bids: &[Bid]) -> Self {
        let amounts: Vec<f64> = bids.iter().filter(|b| b.is_live()).map(|b| b.amount).collect();
        if amounts.is_empty() {
            return Self::default();
        }

        let min = amounts.iter().copied().fold(f64::INFINITY, f64::min);
        let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = amounts.iter().sum::<f64>() / amounts.len() as f64;

        Self {
            count: amounts.len(),
            min,
            max,
            average: (average * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(amount: f64, status: BidStatus) -> Bid {
        let mut bid = Bid::new(OrderId::new(), AccountId::new(), amount, BidDetails::default()).unwrap();
        bid.status = status;
        bid
    }

    #[test]
    fn test_amount_must_be_positive() {
        assert!(validate_amount(25.0).is_ok());
        assert_eq!(validate_amount(0.0), Err(DomainError::InvalidAmount(0.0)));
        assert!(validate_amount(-3.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(Bid::new(OrderId::new(), AccountId::new(), 0.0, BidDetails::default()).is_err());
    }

    #[test]
    fn test_stats_skip_withdrawn() {
        let bids = vec![
            bid(20.0, BidStatus::Pending),
            bid(30.0, BidStatus::Rejected),
            bid(25.0, BidStatus::Accepted),
            bid(5.0, BidStatus::Withdrawn),
        ];
        let stats = BidStats::from_bids(&bids);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 20.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.average, 25.0);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(BidStats::from_bids(&[]), BidStats::default());
        assert_eq!(
            BidStats::from_bids(&[bid(9.0, BidStatus::Withdrawn)]).count,
            0
        );
    }

    #[test]
    fn test_patch_revalidates_amount() {
        let mut b = bid(20.0, BidStatus::Pending);
        let patch = BidPatch {
            amount: Some(-1.0),
            ..Default::default()
        };
        assert!(patch.apply(&mut b).is_err());
        assert_eq!(b.amount, 20.0);

        let patch = BidPatch {
            amount: Some(18.5),
            message: Some("Can pick up today".into()),
            ..Default::default()
        };
        patch.apply(&mut b).unwrap();
        assert_eq!(b.amount, 18.5);
        assert_eq!(b.message.as_deref(), Some("Can pick up today"));
    }
}
