//! Order Processor Core - Domain types and pricing.
//!
//! This crate provides the types shared by every order processor component:
//! - `server` - Order finalization service (cart → persisted order)
//! - `cli` - Command-line tools for migrations and order inspection
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no network clients. Everything here can be exercised in plain unit
//! tests without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for order numbers, cart ids, emails, money and statuses
//! - [`cart`] - Compact cart as stored in the cart cache
//! - [`catalog`] - Catalog product snapshots and variant selection
//! - [`customer`] - Checkout form input and validation
//! - [`order`] - Priced line items, totals and the persisted order document
//! - [`pricing`] - Line item flattening and totals computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod customer;
pub mod order;
pub mod pricing;
pub mod types;

pub use cart::{CartLine, CompactCart};
pub use catalog::{CatalogProduct, ProductRef, ResolvedCart, ResolvedProduct, ResolvedVariant};
pub use customer::{CustomerForm, FormError, OrderFormInput};
pub use order::{Analytics, Order, OrderDraft, OrderHeader, OrderTotals, PricedLineItem};
pub use pricing::{PricingError, Quote, quote};
pub use types::*;
