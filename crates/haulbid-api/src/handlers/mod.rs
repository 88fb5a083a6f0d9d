//! API Handlers
//!
//! Handlers translate HTTP into service calls and back. Authorization rules
//! live in the services; handlers only establish who is calling.

pub mod accounts;
pub mod auth;
pub mod bids;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod ratings;
