//! Core types for the order processor.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::{CartId, CartIdError, OrderNumber};
pub use money::{DEFAULT_TAX_RATE, format_price, round_cents};
pub use status::OrderStatus;
