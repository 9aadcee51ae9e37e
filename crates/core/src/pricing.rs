//! Pricing: flatten a resolved cart into ordered line items and totals.
//!
//! Everything here is a pure function of its input. Line items are sorted by
//! `brandID/modelID/variantKey` so the same cart always prices to the same
//! sequence, independent of catalog iteration order.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::catalog::ResolvedCart;
use crate::order::{OrderTotals, PricedLineItem};
use crate::types::{format_price, round_cents};

/// Errors that can occur while pricing a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// A line total or order total does not fit a decimal.
    #[error("amount overflow while pricing {0}")]
    Overflow(String),
}

/// Priced lines and totals for a resolved cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub lines: Vec<PricedLineItem>,
    pub totals: OrderTotals,
}

impl Quote {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn sort_key(brand_id: &str, model_id: &str, variant_key: &str) -> String {
    format!("{brand_id}/{model_id}/{variant_key}")
}

/// Flatten a resolved cart into line items sorted by sort key.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if `price * quantity` overflows.
pub fn price_lines(cart: &ResolvedCart) -> Result<Vec<PricedLineItem>, PricingError> {
    let mut lines = Vec::new();
    for product in cart.products.values() {
        for (variant_key, variant) in &product.variants {
            let key = sort_key(&product.brand_id, &product.model_id, variant_key);
            let line_total = variant
                .price
                .checked_mul(Decimal::from(variant.quantity))
                .ok_or_else(|| PricingError::Overflow(key.clone()))?;
            lines.push(PricedLineItem {
                sort_key: key,
                brand: product.brand.clone(),
                brand_id: product.brand_id.clone(),
                model: product.model.clone(),
                model_id: product.model_id.clone(),
                quantity: variant.quantity,
                tier: variant_key.clone(),
                tier_display: variant.tier_display.clone(),
                price: variant.price,
                price_display: format_price(variant.price),
                original_price: variant.original_price,
                original_price_display: format_price(variant.original_price),
                picture: product.picture.clone(),
                line_total,
                line_total_display: format_price(line_total),
                delivery_time: variant.delivery_time.clone(),
            });
        }
    }

    lines.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
    Ok(lines)
}

/// Compute order totals for priced lines.
///
/// `tax = round(subtotal * tax_rate)`. Shipping is free, so the grand total
/// equals the subtotal; the tax is the share already contained in it.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the subtotal or the tax overflows.
pub fn compute_totals(
    lines: &[PricedLineItem],
    tax_rate: Decimal,
) -> Result<OrderTotals, PricingError> {
    let overflow = || PricingError::Overflow("order totals".to_owned());

    let subtotal = lines
        .iter()
        .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.line_total))
        .ok_or_else(overflow)?;
    let shipping = Decimal::ZERO;
    let tax = subtotal.checked_mul(tax_rate).ok_or_else(overflow)?;
    let grand_total = subtotal.checked_add(shipping).ok_or_else(overflow)?;

    Ok(OrderTotals {
        subtotal,
        tax: round_cents(tax),
        shipping,
        grand_total,
    })
}

/// Price a resolved cart.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if any amount overflows.
pub fn quote(cart: &ResolvedCart, tax_rate: Decimal) -> Result<Quote, PricingError> {
    let lines = price_lines(cart)?;
    let totals = compute_totals(&lines, tax_rate)?;
    Ok(Quote { lines, totals })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::{ResolvedProduct, ResolvedVariant};
    use crate::types::DEFAULT_TAX_RATE;

    fn variant(quantity: u64, price: Decimal) -> ResolvedVariant {
        ResolvedVariant {
            quantity,
            tier_display: "Professional Line".to_owned(),
            price,
            original_price: price,
            delivery_time: "1-2 Tage".to_owned(),
        }
    }

    fn product(brand_id: &str, model_id: &str, variants: &[(&str, ResolvedVariant)]) -> ResolvedProduct {
        ResolvedProduct {
            brand: brand_id.to_uppercase(),
            brand_id: brand_id.to_owned(),
            model: model_id.to_owned(),
            model_id: model_id.to_owned(),
            lamp_type: "Beamer".to_owned(),
            picture: String::new(),
            variants: variants
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        }
    }

    fn cart(products: Vec<(&str, ResolvedProduct)>) -> ResolvedCart {
        ResolvedCart {
            products: products
                .into_iter()
                .map(|(id, p)| (id.to_owned(), p))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_single_line_quote() {
        let cart = cart(vec![(
            "A/1",
            product("A", "1", &[("professional", variant(2, Decimal::new(4999, 2)))]),
        )]);

        let quote = quote(&cart, DEFAULT_TAX_RATE).unwrap();

        assert_eq!(quote.lines.len(), 1);
        let line = &quote.lines[0];
        assert_eq!(line.sort_key, "A/1/professional");
        assert_eq!(line.quantity, 2);
        assert_eq!(line.price_display, "49,99");
        assert_eq!(line.line_total, Decimal::new(9998, 2));
        assert_eq!(line.line_total_display, "99,98");
        assert_eq!(quote.totals.grand_total, Decimal::new(9998, 2));
        assert_eq!(quote.totals.tax, Decimal::new(1900, 2));
        assert_eq!(quote.totals.tax_display(), "19,00");
        assert_eq!(quote.totals.shipping, Decimal::ZERO);
    }

    #[test]
    fn test_lines_sorted_by_sort_key_not_product_id() {
        // Product ids sort differently from brand/model ids.
        let cart = cart(vec![
            (
                "a-first",
                product("zeta", "9", &[("professional", variant(1, Decimal::ONE))]),
            ),
            (
                "z-last",
                product(
                    "alpha",
                    "2",
                    &[
                        ("professional", variant(1, Decimal::ONE)),
                        ("basic", variant(3, Decimal::ONE)),
                    ],
                ),
            ),
        ]);

        let keys: Vec<_> = price_lines(&cart)
            .unwrap()
            .into_iter()
            .map(|line| line.sort_key)
            .collect();

        assert_eq!(
            keys,
            vec!["alpha/2/basic", "alpha/2/professional", "zeta/9/professional"]
        );
    }

    #[test]
    fn test_grand_total_is_sum_of_line_totals() {
        let cart = cart(vec![
            (
                "A/1",
                product("A", "1", &[("professional", variant(3, Decimal::new(1050, 2)))]),
            ),
            (
                "B/7",
                product("B", "7", &[("professional", variant(1, Decimal::new(199, 2)))]),
            ),
        ]);

        let quote = quote(&cart, DEFAULT_TAX_RATE).unwrap();
        let sum: Decimal = quote.lines.iter().map(|l| l.line_total).sum();

        assert_eq!(quote.totals.grand_total, sum);
        assert_eq!(quote.totals.subtotal, Decimal::new(3349, 2));
        assert_eq!(quote.totals.tax, round_cents(sum * DEFAULT_TAX_RATE));
    }

    #[test]
    fn test_quote_is_deterministic() {
        let cart = cart(vec![(
            "A/1",
            product("A", "1", &[("professional", variant(2, Decimal::new(4999, 2)))]),
        )]);
        assert_eq!(quote(&cart, DEFAULT_TAX_RATE).unwrap(), quote(&cart, DEFAULT_TAX_RATE).unwrap());
    }

    #[test]
    fn test_empty_cart_quote() {
        let quote = quote(&ResolvedCart::default(), DEFAULT_TAX_RATE).unwrap();
        assert!(quote.is_empty());
        assert_eq!(quote.totals.grand_total, Decimal::ZERO);
        assert_eq!(quote.totals.tax, Decimal::ZERO);
    }

    #[test]
    fn test_line_total_overflow_is_an_error() {
        let huge = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);
        let cart = cart(vec![(
            "A/1",
            product("A", "1", &[("professional", variant(2, huge))]),
        )]);

        assert_eq!(
            quote(&cart, DEFAULT_TAX_RATE),
            Err(PricingError::Overflow("A/1/professional".to_owned()))
        );
    }

    #[test]
    fn test_subtotal_overflow_is_an_error() {
        let half = Decimal::MAX / Decimal::TWO + Decimal::ONE;
        let cart = cart(vec![
            ("A/1", product("A", "1", &[("professional", variant(1, half))])),
            ("B/1", product("B", "1", &[("professional", variant(1, half))])),
        ]);

        let lines = price_lines(&cart).unwrap();

        assert!(compute_totals(&lines, DEFAULT_TAX_RATE).is_err());
    }
}
