//! Priced line items and the persisted order document.
//!
//! The serialized shape of [`Order`] is the document kept by the order store:
//!
//! ```text
//! {
//!   "Customer":  { billing / shipping / options fields },
//!   "Products":  [ line items sorted by SortID ],
//!   "Order":     { "OrderNumber", "Subtotal", "Tax", "Shipping", "Total", "Date", "Status", "Shop" },
//!   "Analytics": { "MixpanelID", "AdwordsKW", "IP" }
//! }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::customer::CustomerForm;
use crate::types::{OrderNumber, OrderStatus, format_price};

/// Placeholder for tracking identifiers the checkout does not collect.
pub const UNTRACKED: &str = "-";

/// One priced product variant of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PricedLineItem {
    /// `brandID/modelID/variantKey`, the ordering key of an order's lines.
    #[serde(rename = "SortID")]
    pub sort_key: String,
    pub brand: String,
    #[serde(rename = "BrandID")]
    pub brand_id: String,
    pub model: String,
    #[serde(rename = "ModelID")]
    pub model_id: String,
    pub quantity: u64,
    #[serde(rename = "ProductTier")]
    pub tier: String,
    #[serde(rename = "ProductTierDisplay")]
    pub tier_display: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub price_display: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub original_price: Decimal,
    pub original_price_display: String,
    pub picture: String,
    #[serde(rename = "TotalPrice", with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
    #[serde(rename = "TotalPriceDisplay")]
    pub line_total_display: String,
    pub delivery_time: String,
}

/// Monetary totals of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    #[serde(rename = "Total", with = "rust_decimal::serde::float")]
    pub grand_total: Decimal,
}

impl OrderTotals {
    #[must_use]
    pub fn tax_display(&self) -> String {
        format_price(self.tax)
    }

    #[must_use]
    pub fn shipping_display(&self) -> String {
        format_price(self.shipping)
    }

    #[must_use]
    pub fn grand_total_display(&self) -> String {
        format_price(self.grand_total)
    }
}

/// The `Order` section of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderHeader {
    pub order_number: OrderNumber,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub date: DateTime<Utc>,
    pub status: OrderStatus,
    pub shop: String,
}

/// The `Analytics` section of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    #[serde(rename = "MixpanelID")]
    pub mixpanel_id: String,
    #[serde(rename = "AdwordsKW")]
    pub adwords_kw: String,
    #[serde(rename = "IP")]
    pub ip: String,
}

impl Analytics {
    /// Analytics for an order placed from `ip` without tracking identifiers.
    #[must_use]
    pub fn untracked(ip: impl Into<String>) -> Self {
        Self {
            mixpanel_id: UNTRACKED.to_owned(),
            adwords_kw: UNTRACKED.to_owned(),
            ip: ip.into(),
        }
    }
}

/// A finalized, numbered order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "Customer")]
    pub customer: CustomerForm,
    #[serde(rename = "Products")]
    pub lines: Vec<PricedLineItem>,
    #[serde(rename = "Order")]
    pub header: OrderHeader,
    #[serde(rename = "Analytics")]
    pub analytics: Analytics,
}

impl Order {
    #[must_use]
    pub const fn number(&self) -> OrderNumber {
        self.header.order_number
    }

    #[must_use]
    pub const fn totals(&self) -> &OrderTotals {
        &self.header.totals
    }
}

/// Everything an order needs except its number.
///
/// Only the allocator turns a draft into an [`Order`], once per insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer: CustomerForm,
    pub lines: Vec<PricedLineItem>,
    pub totals: OrderTotals,
    pub created_at: DateTime<Utc>,
    pub shop: String,
    pub client_ip: String,
}

impl OrderDraft {
    /// Build the order document for a candidate number.
    #[must_use]
    pub fn with_number(&self, order_number: OrderNumber) -> Order {
        Order {
            customer: self.customer.clone(),
            lines: self.lines.clone(),
            header: OrderHeader {
                order_number,
                totals: self.totals,
                date: self.created_at,
                status: OrderStatus::Unprocessed,
                shop: self.shop.clone(),
            },
            analytics: Analytics::untracked(self.client_ip.clone()),
        }
    }
}
