//! Catalog snapshots and variant selection.
//!
//! A [`CatalogProduct`] is read from the catalog store and never modified.
//! Selecting the variants a cart asks for produces a fresh, owned
//! [`ResolvedProduct`]; the snapshot stays untouched.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Label used when a variant's tier has no display name.
pub const UNKNOWN_TIER_DISPLAY: &str = "Not Found";

/// A product model as stored in the catalog.
///
/// Descriptive fields default to empty. Field names are matched in the
/// spellings the catalog writers have used over time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CatalogProduct {
    #[serde(alias = "brand")]
    pub brand: String,
    #[serde(alias = "model")]
    pub model: String,
    #[serde(rename = "Lamptype", alias = "lamptype", alias = "LampType", alias = "lampType")]
    pub lamp_type: String,
    #[serde(alias = "picture")]
    pub picture: String,
    #[serde(rename = "BrandID", alias = "brandID", alias = "brandId", alias = "brandid")]
    pub brand_id: String,
    #[serde(rename = "ModelID", alias = "modelID", alias = "modelId", alias = "modelid")]
    pub model_id: String,
    #[serde(
        rename = "LamptypeID",
        alias = "lamptypeID",
        alias = "LampTypeID",
        alias = "lampTypeId",
        alias = "lamptypeid"
    )]
    pub lamp_type_id: String,
    #[serde(alias = "variants")]
    pub variants: BTreeMap<String, VariantListing>,
}

/// One purchasable variant (product tier) of a catalog product.
///
/// `Price` and `OriginalPrice` are required: a listing without them does not
/// decode, so the product is treated as missing from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VariantListing {
    #[serde(rename = "ProductTier", alias = "productTier", alias = "producttier", default)]
    pub tier: String,
    #[serde(alias = "price", with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(
        alias = "originalPrice",
        alias = "originalprice",
        with = "rust_decimal::serde::float"
    )]
    pub original_price: Decimal,
    #[serde(alias = "deliveryTime", alias = "deliverytime", default)]
    pub delivery_time: String,
}

/// A cart product id split into its catalog coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductRef {
    pub brand_id: String,
    pub model_id: String,
}

impl ProductRef {
    /// Split a `"<brandID>/<modelID>"` product id.
    ///
    /// Returns `None` unless there are exactly two non-empty segments.
    ///
    /// ```
    /// use order_processor_core::ProductRef;
    ///
    /// let product = ProductRef::parse("osram/64625").unwrap();
    /// assert_eq!(product.brand_id, "osram");
    /// assert!(ProductRef::parse("osram").is_none());
    /// ```
    #[must_use]
    pub fn parse(product_id: &str) -> Option<Self> {
        let (brand_id, model_id) = product_id.split_once('/')?;
        if brand_id.is_empty() || model_id.is_empty() || model_id.contains('/') {
            return None;
        }
        Some(Self {
            brand_id: brand_id.to_owned(),
            model_id: model_id.to_owned(),
        })
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.brand_id, self.model_id)
    }
}

/// Display name of a product tier, if the shop knows it.
#[must_use]
pub fn tier_display(tier: &str) -> Option<&'static str> {
    match tier {
        "professional" => Some("Professional Line"),
        _ => None,
    }
}

/// A variant the customer selected, with its requested quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariant {
    pub quantity: u64,
    pub tier_display: String,
    pub price: Decimal,
    pub original_price: Decimal,
    pub delivery_time: String,
}

/// A catalog product reduced to the variants selected in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProduct {
    pub brand: String,
    pub brand_id: String,
    pub model: String,
    pub model_id: String,
    pub lamp_type: String,
    pub picture: String,
    /// Selected variants keyed by variant key. Never contains a zero quantity.
    pub variants: BTreeMap<String, ResolvedVariant>,
}

impl ResolvedProduct {
    /// Keep the catalog variants the cart asks for with a non-zero quantity.
    ///
    /// Variants the cart omits or sets to zero are dropped. Cart entries for
    /// variants the catalog does not list are ignored.
    #[must_use]
    pub fn select(product: &CatalogProduct, quantities: &BTreeMap<String, u64>) -> Self {
        let variants = product
            .variants
            .iter()
            .filter_map(|(key, listing)| {
                let quantity = quantities.get(key).copied().filter(|&q| q > 0)?;
                let tier_display = tier_display(key).unwrap_or(UNKNOWN_TIER_DISPLAY);
                Some((
                    key.clone(),
                    ResolvedVariant {
                        quantity,
                        tier_display: tier_display.to_owned(),
                        price: listing.price,
                        original_price: listing.original_price,
                        delivery_time: listing.delivery_time.clone(),
                    },
                ))
            })
            .collect();

        Self {
            brand: product.brand.clone(),
            brand_id: product.brand_id.clone(),
            model: product.model.clone(),
            model_id: product.model_id.clone(),
            lamp_type: product.lamp_type.clone(),
            picture: product.picture.clone(),
            variants,
        }
    }

    /// Variant keys whose tier has no display name.
    pub fn unknown_tiers(&self) -> impl Iterator<Item = &str> {
        self.variants
            .keys()
            .filter(|key| tier_display(key).is_none())
            .map(String::as_str)
    }
}

/// Output of cart resolution: product id → selected variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCart {
    pub products: BTreeMap<String, ResolvedProduct>,
}
