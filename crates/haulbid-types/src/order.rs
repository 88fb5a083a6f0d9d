//! Order types and the order status state machine
//!
//! Orders arrive in one of two intake shapes. The legacy shape carries
//! `loadFrom`/`loadTo` and a budget; the structured shape carries a title,
//! package details and a preferred date. Both are classified by
//! [`OrderIntake::from_payload`] and normalized into a single [`NewOrder`]
//! before anything is stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::{DomainError, Result};
use crate::identity::{AccountId, OrderId};

// ============================================================================
// Status State Machine
// ============================================================================

/// Order lifecycle status
///
/// ```text
/// draft -> published -> bidding -> assigned -> in_transit -> delivered
///                                     |
///                                     +-> bidding (acceptance cancelled)
/// any non-terminal -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Published,
    Bidding,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Draft,
        Self::Published,
        Self::Bidding,
        Self::Assigned,
        Self::InTransit,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Bidding => "bidding",
            Self::Assigned => "assigned",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Delivered and cancelled orders never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether new bids may be placed
    pub fn accepts_bids(&self) -> bool {
        matches!(self, Self::Published | Self::Bidding)
    }

    /// Get valid transitions from this state
    pub fn valid_transitions(&self) -> Vec<OrderStatus> {
        match self {
            Self::Draft => vec![Self::Published, Self::Cancelled],
            Self::Published => vec![Self::Bidding, Self::Cancelled],
            Self::Bidding => vec![Self::Assigned, Self::Cancelled],
            Self::Assigned => vec![Self::InTransit, Self::Bidding, Self::Cancelled],
            Self::InTransit => vec![Self::Delivered, Self::Cancelled],
            Self::Delivered => vec![],
            Self::Cancelled => vec![],
        }
    }

    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Validate a transition, returning the target on success
    pub fn transition_to(&self, target: OrderStatus) -> Result<OrderStatus> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| DomainError::invalid_input("status", format!("unknown status '{}'", s)))
    }
}

// ============================================================================
// Package Attributes
// ============================================================================

/// Delivery urgency. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Standard,
    Express,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for Urgency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            "urgent" => Ok(Self::Urgent),
            other => Err(DomainError::invalid_input(
                "urgency",
                format!("unknown urgency '{}'", other),
            )),
        }
    }
}

/// Package category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Document,
    #[default]
    Small,
    Medium,
    Large,
    Fragile,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Fragile => "fragile",
        }
    }
}

impl FromStr for PackageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "document" => Ok(Self::Document),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "fragile" => Ok(Self::Fragile),
            other => Err(DomainError::invalid_input(
                "packageType",
                format!("unknown package type '{}'", other),
            )),
        }
    }
}

/// Package dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

// ============================================================================
// Order
// ============================================================================

/// A delivery order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub owner_id: Option<AccountId>,
    pub title: String,
    pub description: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub package_type: PackageType,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub urgency: Urgency,
    pub pickup_date: Option<NaiveDate>,
    pub preferred_date: Option<NaiveDate>,
    /// Customer budget (legacy `bidAmount`)
    pub budget: Option<f64>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a normalized order for persistence
    pub fn create(new: NewOrder, owner_id: Option<AccountId>) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            owner_id,
            title: new.title,
            description: new.description,
            pickup_address: new.pickup_address,
            delivery_address: new.delivery_address,
            package_type: new.package_type,
            weight: new.weight,
            dimensions: new.dimensions,
            urgency: new.urgency,
            pickup_date: new.pickup_date,
            preferred_date: new.preferred_date,
            budget: new.budget,
            status: new.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Canonical order shape produced by either intake adapter
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub title: String,
    pub description: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub package_type: PackageType,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub urgency: Urgency,
    pub pickup_date: Option<NaiveDate>,
    pub preferred_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub status: OrderStatus,
}

// ============================================================================
// Intake Shapes
// ============================================================================

/// Untyped order body as received from clients
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    // Legacy shape
    pub load_from: Option<String>,
    pub load_to: Option<String>,
    pub order_date: Option<String>,
    pub delivery_date: Option<String>,
    pub bid_amount: Option<f64>,

    // Shared
    pub description: Option<String>,

    // Structured shape
    pub title: Option<String>,
    pub pickup_address: Option<String>,
    pub delivery_address: Option<String>,
    pub package_type: Option<PackageType>,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub urgency: Option<Urgency>,
    pub preferred_date: Option<String>,

    /// Initial status override (draft or published)
    pub status: Option<OrderStatus>,
}

/// Legacy intake: a lane plus dates and a budget
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyIntake {
    pub load_from: String,
    pub load_to: String,
    pub order_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub description: String,
    pub bid_amount: f64,
}

/// Structured intake as submitted by the order form
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredIntake {
    pub title: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub description: String,
    pub weight: f64,
    pub urgency: Urgency,
    pub preferred_date: NaiveDate,
    pub package_type: PackageType,
    pub dimensions: Option<Dimensions>,
}

/// A classified order body
#[derive(Debug, Clone, PartialEq)]
pub enum OrderIntake {
    Legacy(LegacyIntake),
    Structured(StructuredIntake),
}

const LEGACY_FIELDS: [&str; 6] = [
    "loadFrom",
    "loadTo",
    "orderDate",
    "deliveryDate",
    "description",
    "bidAmount",
];

const STRUCTURED_FIELDS: [&str; 7] = [
    "title",
    "pickupAddress",
    "deliveryAddress",
    "description",
    "weight",
    "urgency",
    "preferredDate",
];

impl OrderIntake {
    /// Classify a raw payload. Structured wins when both shapes are complete.
    pub fn from_payload(payload: &OrderPayload) -> Result<Self> {
        let structured_missing = structured_missing(payload);
        if structured_missing.is_empty() {
            return Ok(Self::Structured(StructuredIntake {
                title: required(&payload.title),
                pickup_address: required(&payload.pickup_address),
                delivery_address: required(&payload.delivery_address),
                description: required(&payload.description),
                weight: positive("weight", payload.weight)?,
                urgency: payload.urgency.unwrap_or_default(),
                preferred_date: parse_date("preferredDate", payload.preferred_date.as_deref())?,
                package_type: payload.package_type.unwrap_or_default(),
                dimensions: payload.dimensions,
            }));
        }

        let legacy_missing = legacy_missing(payload);
        if legacy_missing.is_empty() {
            let bid_amount = payload.bid_amount.unwrap_or_default();
            if !bid_amount.is_finite() || bid_amount < 0.0 {
                return Err(DomainError::invalid_input(
                    "bidAmount",
                    "must be a non-negative number",
                ));
            }
            return Ok(Self::Legacy(LegacyIntake {
                load_from: required(&payload.load_from),
                load_to: required(&payload.load_to),
                order_date: parse_date("orderDate", payload.order_date.as_deref())?,
                delivery_date: parse_date("deliveryDate", payload.delivery_date.as_deref())?,
                description: required(&payload.description),
                bid_amount,
            }));
        }

        // Report against whichever shape the caller got closer to
        let missing = if legacy_missing.len() < structured_missing.len() {
            legacy_missing
        } else {
            structured_missing
        };
        Err(DomainError::MissingFields(
            missing.into_iter().map(String::from).collect(),
        ))
    }

    /// Normalize into the canonical order shape
    pub fn into_new_order(self, status: OrderStatus) -> NewOrder {
        match self {
            Self::Legacy(legacy) => NewOrder {
                title: format!("{} to {}", legacy.load_from, legacy.load_to),
                description: legacy.description,
                pickup_address: legacy.load_from,
                delivery_address: legacy.load_to,
                package_type: PackageType::default(),
                weight: None,
                dimensions: None,
                urgency: Urgency::default(),
                pickup_date: Some(legacy.order_date),
                preferred_date: Some(legacy.delivery_date),
                budget: Some(legacy.bid_amount),
                status,
            },
            Self::Structured(form) => NewOrder {
                title: form.title,
                description: form.description,
                pickup_address: form.pickup_address,
                delivery_address: form.delivery_address,
                package_type: form.package_type,
                weight: Some(form.weight),
                dimensions: form.dimensions,
                urgency: form.urgency,
                pickup_date: None,
                preferred_date: Some(form.preferred_date),
                budget: None,
                status,
            },
        }
    }
}

impl OrderPayload {
    /// Classify and normalize in one step
    pub fn normalize(&self) -> Result<NewOrder> {
        let status = match self.status {
            None => OrderStatus::Published,
            Some(s @ (OrderStatus::Draft | OrderStatus::Published)) => s,
            Some(other) => {
                return Err(DomainError::invalid_input(
                    "status",
                    format!("orders cannot be created as '{}'", other),
                ))
            }
        };
        Ok(OrderIntake::from_payload(self)?.into_new_order(status))
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn required(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn structured_missing(p: &OrderPayload) -> Vec<&'static str> {
    let checks = [
        present(&p.title),
        present(&p.pickup_address),
        present(&p.delivery_address),
        present(&p.description),
        p.weight.is_some(),
        p.urgency.is_some(),
        present(&p.preferred_date),
    ];
    STRUCTURED_FIELDS
        .into_iter()
        .zip(checks)
        .filter_map(|(name, ok)| (!ok).then_some(name))
        .collect()
}

fn legacy_missing(p: &OrderPayload) -> Vec<&'static str> {
    let checks = [
        present(&p.load_from),
        present(&p.load_to),
        present(&p.order_date),
        present(&p.delivery_date),
        present(&p.description),
        p.bid_amount.is_some(),
    ];
    LEGACY_FIELDS
        .into_iter()
        .zip(checks)
        .filter_map(|(name, ok)| (!ok).then_some(name))
        .collect()
}

fn positive(field: &str, value: Option<f64>) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(DomainError::invalid_input(field, "must be greater than zero")),
    }
}

/// Parse a calendar date from `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate> {
    let raw = value.map(str::trim).unwrap_or_default();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| DomainError::invalid_input(field, format!("'{}' is not a date", raw)))
}

// ============================================================================
// Patches
// ============================================================================

/// Descriptive fields an owner may edit on a live order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pickup_address: Option<String>,
    pub delivery_address: Option<String>,
    pub package_type: Option<PackageType>,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub urgency: Option<Urgency>,
    pub preferred_date: Option<NaiveDate>,
    pub budget: Option<f64>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate and apply onto an order
    pub fn apply(&self, order: &mut Order) -> Result<()> {
        if let Some(weight) = self.weight {
            positive("weight", Some(weight))?;
        }
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget < 0.0 {
                return Err(DomainError::invalid_input("budget", "must be a non-negative number"));
            }
        }
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("pickupAddress", &self.pickup_address),
            ("deliveryAddress", &self.delivery_address),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(DomainError::invalid_input(field, "must not be empty"));
            }
        }

        if let Some(title) = &self.title {
            order.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            order.description = description.trim().to_string();
        }
        if let Some(pickup) = &self.pickup_address {
            order.pickup_address = pickup.trim().to_string();
        }
        if let Some(delivery) = &self.delivery_address {
            order.delivery_address = delivery.trim().to_string();
        }
        if let Some(package_type) = self.package_type {
            order.package_type = package_type;
        }
        if self.weight.is_some() {
            order.weight = self.weight;
        }
        if self.dimensions.is_some() {
            order.dimensions = self.dimensions;
        }
        if let Some(urgency) = self.urgency {
            order.urgency = urgency;
        }
        if self.preferred_date.is_some() {
            order.preferred_date = self.preferred_date;
        }
        if self.budget.is_some() {
            order.budget = self.budget;
        }
        order.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured() -> OrderPayload {
        OrderPayload {
            title: Some("Office move".into()),
            pickup_address: Some("12 Harbour Rd".into()),
            delivery_address: Some("88 Hill St".into()),
            description: Some("Two desks".into()),
            weight: Some(42.5),
            urgency: Some(Urgency::Express),
            preferred_date: Some("2025-03-14".into()),
            package_type: Some(PackageType::Large),
            ..Default::default()
        }
    }

    fn legacy() -> OrderPayload {
        OrderPayload {
            load_from: Some("Lagos".into()),
            load_to: Some("Ibadan".into()),
            order_date: Some("2025-03-10".into()),
            delivery_date: Some("2025-03-12T09:00:00Z".into()),
            description: Some("Pallets".into()),
            bid_amount: Some(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Bidding));
        assert!(Bidding.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InTransit));
        assert!(Assigned.can_transition_to(Bidding));
        assert!(InTransit.can_transition_to(Delivered));
        assert!(!Published.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Cancelled));
    }

    #[test]
    fn test_cancel_reachable_from_every_non_terminal_state() {
        for status in OrderStatus::ALL {
            assert_eq!(
                status.can_transition_to(OrderStatus::Cancelled),
                !status.is_terminal(),
                "{}",
                status
            );
        }
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = OrderStatus::Draft
            .transition_to(OrderStatus::Delivered)
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: OrderStatus::Draft,
                to: OrderStatus::Delivered
            }
        );
    }

    #[test]
    fn test_status_serde_and_parse() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::InTransit).unwrap(),
            "\"in_transit\""
        );
        assert_eq!("in_transit".parse::<OrderStatus>().unwrap(), OrderStatus::InTransit);
        assert!("accepted".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_structured_intake_normalizes() {
        let new = structured().normalize().unwrap();
        assert_eq!(new.title, "Office move");
        assert_eq!(new.package_type, PackageType::Large);
        assert_eq!(new.weight, Some(42.5));
        assert_eq!(new.preferred_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(new.status, OrderStatus::Published);
    }

    #[test]
    fn test_legacy_intake_normalizes() {
        let intake = OrderIntake::from_payload(&legacy()).unwrap();
        assert!(matches!(intake, OrderIntake::Legacy(_)));

        let new = intake.into_new_order(OrderStatus::Published);
        assert_eq!(new.pickup_address, "Lagos");
        assert_eq!(new.delivery_address, "Ibadan");
        assert_eq!(new.title, "Lagos to Ibadan");
        assert_eq!(new.budget, Some(0.0));
        assert_eq!(new.preferred_date, NaiveDate::from_ymd_opt(2025, 3, 12));
        assert_eq!(new.package_type, PackageType::Small);
    }

    #[test]
    fn test_incomplete_payload_reports_missing_fields() {
        let mut payload = structured();
        payload.weight = None;
        payload.preferred_date = None;

        match payload.normalize().unwrap_err() {
            DomainError::MissingFields(fields) => {
                assert_eq!(fields, vec!["weight".to_string(), "preferredDate".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(matches!(
            OrderPayload::default().normalize(),
            Err(DomainError::MissingFields(_))
        ));
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        let mut payload = legacy();
        payload.load_to = Some("   ".into());
        assert_eq!(
            payload.normalize().unwrap_err(),
            DomainError::MissingFields(vec!["loadTo".into()])
        );
    }

    #[test]
    fn test_status_override() {
        let mut payload = structured();
        payload.status = Some(OrderStatus::Draft);
        assert_eq!(payload.normalize().unwrap().status, OrderStatus::Draft);

        payload.status = Some(OrderStatus::Delivered);
        assert!(matches!(
            payload.normalize(),
            Err(DomainError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_bad_date_rejected() {
        let mut payload = structured();
        payload.preferred_date = Some("next tuesday".into());
        assert!(matches!(
            payload.normalize(),
            Err(DomainError::InvalidInput { field, .. }) if field == "preferredDate"
        ));
    }

    #[test]
    fn test_patch_apply() {
        let mut order = Order::create(structured().normalize().unwrap(), None);
        let patch = OrderPatch {
            title: Some("Office move (2 desks)".into()),
            urgency: Some(Urgency::Urgent),
            ..Default::default()
        };
        patch.apply(&mut order).unwrap();
        assert_eq!(order.title, "Office move (2 desks)");
        assert_eq!(order.urgency, Urgency::Urgent);

        let bad = OrderPatch {
            weight: Some(-1.0),
            ..Default::default()
        };
        assert!(bad.apply(&mut order).is_err());
    }
}
