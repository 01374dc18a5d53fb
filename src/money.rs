//! Money and Quantity Conversion Module
//!
//! Unified conversion between client-facing strings and the registry's internal
//! representation. All conversions at the API boundary MUST go through this module.
//!
//! ## Internal Representation
//! - Credit quantities are whole units stored as `u64` ([`Quantity`]); credits are never fractional
//! - Prices are `rust_decimal::Decimal` with at most [`PRICE_DECIMALS`] fractional digits
//! - Derived prices (volume-weighted averages) are rounded to [`PRICE_DECIMALS`]
//!
//! ## Usage
//! ```rust
//! use carbon_registry::money::{parse_quantity, parse_price, weighted_average_price};
//!
//! let qty = parse_quantity("4000").unwrap();
//! let price = parse_price("100").unwrap();
//! let avg = weighted_average_price(qty, price, 1000, parse_price("200").unwrap()).unwrap();
//! assert_eq!(avg.to_string(), "120");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::core_types::Quantity;

/// Maximum fractional digits accepted for a posted price
pub const PRICE_DECIMALS: u32 = 8;

// ============================================================================
// Error Types
// ============================================================================

/// Money / quantity conversion errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Quantity must be a whole number of credits: {0}")]
    NotInteger(String),

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Client → Internal
// ============================================================================

/// Convert a client quantity string into whole credits
///
/// # Errors
/// * `NotInteger` - input carries a fractional part (`"1.5"`, `"10.0"`)
/// * `InvalidAmount` - zero or signed input
/// * `Overflow` - exceeds `u64`
/// * `InvalidFormat` - anything that is not plain ASCII digits
pub fn parse_quantity(qty_str: &str) -> Result<Quantity, MoneyError> {
    let qty_str = qty_str.trim();
    if qty_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if qty_str.starts_with('-') || qty_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    if qty_str.contains('.') {
        return Err(MoneyError::NotInteger(qty_str.to_string()));
    }

    if !qty_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in quantity: {}",
            qty_str
        )));
    }

    // Only digits remain, so the sole parse failure is overflow
    let qty: u64 = qty_str.parse().map_err(|_| MoneyError::Overflow)?;

    if qty == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(qty)
}

/// Convert a client price string into a validated `Decimal`
///
/// Same strictness rules as order prices: no sign, no exponent, no bare
/// leading/trailing dot, at most [`PRICE_DECIMALS`] fractional digits, non-zero.
pub fn parse_price(price_str: &str) -> Result<Decimal, MoneyError> {
    let price_str = price_str.trim();
    if price_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if price_str.starts_with('-') || price_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = price_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in price: {}",
            price_str
        )));
    }

    // Reject instead of silently truncating
    if frac.len() > PRICE_DECIMALS as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: PRICE_DECIMALS,
        });
    }

    let price = Decimal::from_str(price_str).map_err(|_| MoneyError::Overflow)?;
    validate_price(price)
}

/// Validate a programmatically supplied price (positive, bounded scale)
pub fn validate_price(price: Decimal) -> Result<Decimal, MoneyError> {
    if price.is_sign_negative() || price.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    if price.scale() > PRICE_DECIMALS {
        return Err(MoneyError::PrecisionOverflow {
            provided: price.scale(),
            max: PRICE_DECIMALS,
        });
    }

    Ok(price)
}

// ============================================================================
// Arithmetic
// ============================================================================

/// Settlement value of a purchase: `qty × price`
pub fn total_value(qty: Quantity, price: Decimal) -> Result<Decimal, MoneyError> {
    Decimal::from(qty)
        .checked_mul(price)
        .ok_or(MoneyError::Overflow)
}

/// Volume-weighted average after adding `qty @ price` to `held_qty @ held_avg`
///
/// `newAvg = (held_qty*held_avg + qty*price) / (held_qty + qty)`, rounded to
/// [`PRICE_DECIMALS`]. A holding that has fallen to zero restarts at `price`.
pub fn weighted_average_price(
    held_qty: Quantity,
    held_avg: Decimal,
    qty: Quantity,
    price: Decimal,
) -> Result<Decimal, MoneyError> {
    let combined_qty = held_qty.checked_add(qty).ok_or(MoneyError::Overflow)?;
    if combined_qty == 0 {
        return Err(MoneyError::InvalidAmount);
    }
    if held_qty == 0 {
        return Ok(price);
    }

    let held_value = total_value(held_qty, held_avg)?;
    let new_value = total_value(qty, price)?;
    let sum = held_value
        .checked_add(new_value)
        .ok_or(MoneyError::Overflow)?;
    let avg = sum
        .checked_div(Decimal::from(combined_qty))
        .ok_or(MoneyError::Overflow)?;

    Ok(avg.round_dp(PRICE_DECIMALS).normalize())
}

// ============================================================================
// Format: Internal → Client
// ============================================================================

/// Render a price for API responses
///
/// Trailing zeros are dropped (`120.00000000` → `120`) so clients can parse the
/// value back with [`parse_price`].
pub fn format_price(price: Decimal) -> String {
    price.normalize().to_string()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_quantity_accepts_whole_credits() {
        assert_eq!(parse_quantity("1").unwrap(), 1);
        assert_eq!(parse_quantity(" 4000 ").unwrap(), 4000);
        assert_eq!(parse_quantity("0010").unwrap(), 10);
    }

    #[test]
    fn test_parse_quantity_rejects_fractional_and_non_positive() {
        assert!(matches!(parse_quantity("1.5"), Err(MoneyError::NotInteger(_))));
        assert!(matches!(parse_quantity("10.0"), Err(MoneyError::NotInteger(_))));
        assert_eq!(parse_quantity("0"), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_quantity("-3"), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_quantity("+3"), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_parse_quantity_invalid_formats() {
        for case in ["", "abc", "1e3", "0x10", "1,000", "1 000"] {
            assert!(parse_quantity(case).is_err(), "should reject {:?}", case);
        }
        assert_eq!(
            parse_quantity("99999999999999999999999"),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_parse_price_variations() {
        assert_eq!(parse_price("100").unwrap(), dec("100"));
        assert_eq!(parse_price("12.5").unwrap(), dec("12.5"));
        assert_eq!(parse_price("0.00000001").unwrap(), dec("0.00000001"));

        assert!(parse_price("0").is_err());
        assert!(parse_price("0.000").is_err());
        assert!(parse_price(".5").is_err());
        assert!(parse_price("5.").is_err());
        assert!(parse_price("1.2.3").is_err());
        assert!(parse_price("-1").is_err());
        assert!(parse_price("1e2").is_err());
        assert!(matches!(
            parse_price("1.000000001"),
            Err(MoneyError::PrecisionOverflow {
                provided: 9,
                max: 8
            })
        ));
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(dec("0.01")).is_ok());
        assert_eq!(validate_price(Decimal::ZERO), Err(MoneyError::InvalidAmount));
        assert_eq!(validate_price(dec("-5")), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_total_value() {
        assert_eq!(total_value(4000, dec("100")).unwrap(), dec("400000"));
        assert_eq!(total_value(3, dec("0.5")).unwrap(), dec("1.5"));
    }

    #[test]
    fn test_weighted_average_price_matches_registry_scenario() {
        // 4000 @ 100 then 1000 @ 200 => 120
        let avg = weighted_average_price(4000, dec("100"), 1000, dec("200")).unwrap();
        assert_eq!(avg, dec("120"));
    }

    #[test]
    fn test_weighted_average_price_restarts_from_empty_holding() {
        let avg = weighted_average_price(0, dec("120"), 10, dec("75.5")).unwrap();
        assert_eq!(avg, dec("75.5"));
    }

    #[test]
    fn test_weighted_average_price_rounds_to_price_scale() {
        // (1*1 + 2*2) / 3 = 1.666...
        let avg = weighted_average_price(1, dec("1"), 2, dec("2")).unwrap();
        assert_eq!(avg, dec("1.66666667"));
    }

    #[test]
    fn test_format_price_drops_trailing_zeros() {
        assert_eq!(format_price(dec("120.00000000")), "120");
        assert_eq!(format_price(dec("12.50")), "12.5");
        assert_eq!(parse_price(&format_price(dec("0.10000000"))).unwrap(), dec("0.1"));
    }
}
