//! Data Transfer Objects
//!
//! Request bodies keep their required fields optional so absent fields are
//! reported together as `MISSING_FIELDS` instead of a decoder error.

pub mod account;
pub mod auth;
pub mod bid;
pub mod common;
pub mod order;
pub mod rating;

pub use account::*;
pub use auth::*;
pub use bid::*;
pub use common::*;
pub use order::*;
pub use rating::*;
