//! Money Conversion Module
//!
//! Conversion between client-facing decimal currency values and the internal
//! integer minor-unit representation. Everything below the boundary works on
//! [`MinorUnits`]; all conversions MUST go through this module.
//!
//! ## Rounding
//! Values with more than two fractional digits are rounded to the nearest
//! minor unit, midpoint away from zero (`100.125` -> `10013`, `-0.005` -> `-1`).
//!
//! ## Usage
//! ```rust
//! use atomic_ledger::money::{parse_amount, format_minor_units};
//!
//! let cents = parse_amount("250.50").unwrap();
//! assert_eq!(cents, 25050);
//! assert_eq!(format_minor_units(cents), "250.50");
//! ```

use crate::core_types::MinorUnits;
use rust_decimal::prelude::*;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits in one major unit
pub const MINOR_UNIT_DECIMALS: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Client → Internal (Decimal → i64)
// ============================================================================

/// Convert a decimal currency value to minor units
///
/// # Errors
/// * `Overflow` - If the scaled value does not fit in an `i64`
pub fn to_minor_units(amount: Decimal) -> Result<MinorUnits, MoneyError> {
    let rounded =
        amount.round_dp_with_strategy(MINOR_UNIT_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    let scaled = rounded
        .checked_mul(Decimal::from(10i64.pow(MINOR_UNIT_DECIMALS)))
        .ok_or(MoneyError::Overflow)?;
    scaled.to_i64().ok_or(MoneyError::Overflow)
}

/// Parse a client string amount (e.g. `"250.5"`) into minor units
pub fn parse_amount(amount_str: &str) -> Result<MinorUnits, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    let decimal = Decimal::from_str(amount_str)
        .map_err(|e| MoneyError::InvalidFormat(format!("{}: {}", amount_str, e)))?;
    to_minor_units(decimal)
}

// ============================================================================
// Format: Internal → Client (i64 → Decimal/String)
// ============================================================================

/// Convert minor units back into an exact decimal value
pub fn from_minor_units(value: MinorUnits) -> Decimal {
    Decimal::new(value, MINOR_UNIT_DECIMALS)
}

/// Format minor units for display, always with two fractional digits
pub fn format_minor_units(value: MinorUnits) -> String {
    format!(
        "{:.prec$}",
        from_minor_units(value),
        prec = MINOR_UNIT_DECIMALS as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_minor_units_exact_values() {
        assert_eq!(to_minor_units(dec("0")), Ok(0));
        assert_eq!(to_minor_units(dec("1")), Ok(100));
        assert_eq!(to_minor_units(dec("100.50")), Ok(10050));
        assert_eq!(to_minor_units(dec("0.01")), Ok(1));
        assert_eq!(to_minor_units(dec("1234567.89")), Ok(123456789));
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        assert_eq!(to_minor_units(dec("100.123")), Ok(10012));
        assert_eq!(to_minor_units(dec("100.126")), Ok(10013));
        assert_eq!(to_minor_units(dec("100.125")), Ok(10013));
        assert_eq!(to_minor_units(dec("0.005")), Ok(1));
        assert_eq!(to_minor_units(dec("-0.005")), Ok(-1));
        assert_eq!(to_minor_units(dec("0.004")), Ok(0));
    }

    #[test]
    fn test_to_minor_units_overflow() {
        assert_eq!(
            to_minor_units(dec("92233720368547758.08")),
            Err(MoneyError::Overflow)
        );
        assert_eq!(
            to_minor_units(dec("92233720368547758.07")),
            Ok(i64::MAX)
        );
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("250.50"), Ok(25050));
        assert_eq!(parse_amount(" 10 "), Ok(1000));
        assert!(matches!(
            parse_amount(""),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_amount("12.3.4"),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_amount("abc"),
            Err(MoneyError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(0), "0.00");
        assert_eq!(format_minor_units(1), "0.01");
        assert_eq!(format_minor_units(74950), "749.50");
        assert_eq!(format_minor_units(-25050), "-250.50");
    }

    #[test]
    fn test_minor_units_survive_decimal_conversion() {
        for cents in [0i64, 1, 100, 10050, 123456789] {
            assert_eq!(to_minor_units(from_minor_units(cents)), Ok(cents));
        }
    }
}
