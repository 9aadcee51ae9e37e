//! Money helpers.
//!
//! All amounts are [`Decimal`] in the shop's single currency. Display strings
//! use the German convention: two decimals, comma as decimal separator, no
//! thousands grouping.

use rust_decimal::{Decimal, RoundingStrategy};

/// Value added tax applied to the order subtotal (19%).
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

/// Round an amount to whole cents using commercial rounding.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display, e.g. `12.5` → `"12,50"`.
///
/// ```
/// use order_processor_core::format_price;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_price(Decimal::new(4999, 2)), "49,99");
/// assert_eq!(format_price(Decimal::new(125, 1)), "12,50");
/// ```
#[must_use]
pub fn format_price(amount: Decimal) -> String {
    format!("{:.2}", round_cents(amount)).replacen('.', ",", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_value() {
        assert_eq!(DEFAULT_TAX_RATE.to_string(), "0.19");
    }

    #[test]
    fn test_format_pads_to_two_decimals() {
        assert_eq!(format_price(Decimal::new(7, 0)), "7,00");
        assert_eq!(format_price(Decimal::new(125, 1)), "12,50");
        assert_eq!(format_price(Decimal::ZERO), "0,00");
    }

    #[test]
    fn test_format_rounds_commercially() {
        // 99.98 * 0.19
        assert_eq!(format_price(Decimal::new(189_962, 4)), "19,00");
        assert_eq!(format_price(Decimal::new(10_005, 3)), "10,01");
        assert_eq!(format_price(Decimal::new(10_004, 3)), "10,00");
    }

    #[test]
    fn test_format_has_no_grouping() {
        assert_eq!(format_price(Decimal::new(123_456_789, 2)), "1234567,89");
    }

    #[test]
    fn test_round_cents_keeps_exact_values() {
        assert_eq!(round_cents(Decimal::new(9998, 2)), Decimal::new(9998, 2));
    }
}
