//! HaulBid Types - Canonical domain types for the delivery marketplace
//!
//! This crate has zero dependencies on other haulbid crates. It defines:
//!
//! - Identity types (AccountId, OrderId, BidId, ...)
//! - Accounts and roles
//! - Orders, the order status state machine and the two intake shapes
//! - Bids and bid price statistics
//! - Ratings, rating summaries and generic reviews
//! - Notifications and order status history
//!
//! Everything here is pure: validation and derivations only, no I/O.

pub mod identity;
pub mod account;
pub mod order;
pub mod bid;
pub mod rating;
pub mod notification;
pub mod error;

pub use identity::*;
pub use account::*;
pub use order::*;
pub use bid::*;
pub use rating::*;
pub use notification::*;
pub use error::*;

