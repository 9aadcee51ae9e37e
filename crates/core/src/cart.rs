//! Compact cart as kept in the cart cache.
//!
//! The storefront writes carts as JSON of the form
//! `{"Products":[{"ProductID":"brand/model","Variants":{"professional":2}}]}`.
//! Field names are matched the way the storefront has historically written
//! them, so a few aliases are accepted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A shopper's cart before catalog enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactCart {
    #[serde(
        rename = "Products",
        alias = "products",
        alias = "PRODUCTS",
        alias = "Lines",
        alias = "lines",
        default
    )]
    pub lines: Vec<CartLine>,
}

/// One product in the cart with the requested quantity per variant.
///
/// A quantity of 0 means "not selected".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(
        rename = "ProductID",
        alias = "productID",
        alias = "productId",
        alias = "ProductId",
        alias = "productid",
        alias = "PRODUCTID",
        alias = "product_id"
    )]
    pub product_id: String,
    #[serde(
        rename = "Variants",
        alias = "variants",
        alias = "VARIANTS",
        alias = "variantQuantities",
        alias = "variantquantities",
        default
    )]
    pub variants: BTreeMap<String, u64>,
}

impl CompactCart {
    /// The cart written back after an order was placed.
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// Decode a cart from the raw bytes stored in the cache.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the bytes are not a valid cart.
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Encode the cart as stored in the cache.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns true when no variant has a non-zero quantity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines
            .iter()
            .all(|line| line.variants.values().all(|&quantity| quantity == 0))
    }
}
