//! Business logic services for the order processor.
//!
//! # Services
//!
//! - `resolver` - Cart loading and catalog resolution
//! - `allocator` - Order numbering and insert with conflict retry
//! - `retirement` - Emptying carts after a stored order
//! - `email` - SMTP delivery of rendered messages
//! - `notify` - Confirmation email rendering and dispatch
//! - `pipeline` - The finalization pipeline tying the stages together

pub mod allocator;
pub mod email;
pub mod notify;
pub mod pipeline;
pub mod resolver;
pub mod retirement;

pub use pipeline::{Collaborators, Finalized, OrderPipeline, ShopIdentity};
