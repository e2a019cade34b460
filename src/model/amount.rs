//! Amount type for handling monetary values as they appear in spreadsheet cells.
//!
//! Cells written by this program hold plain two-decimal numbers like `1000.00`, but cells that
//! were typed by hand (or came back from the cloud mirror) may carry a currency symbol or
//! thousands separators. All of those parse.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::{Error as SerdeError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;
use tracing::warn;

/// Number of decimal places every `Amount` is held at.
const SCALE: u32 = 2;

/// Currency symbols that are stripped before parsing.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£'];

/// The largest magnitude a parsed amount may have. Totals over any realistic number of records
/// stay far inside what `Decimal` can hold.
const MAX_MAGNITUDE: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Represents a currency amount, always held at two decimal places.
///
/// # Examples
///
/// ```
/// # use budget_sync::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("€1,250.5").unwrap();
/// assert_eq!(amount.to_string(), "1250.50");
/// ```
///
/// Values that cannot be parsed degrade to zero when read leniently:
/// ```
/// # use budget_sync::model::Amount;
/// assert!(Amount::lenient("twelve").is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// Creates a new `Amount`, rounding `value` to two decimal places.
    pub fn new(value: Decimal) -> Self {
        let mut value = value.round_dp(SCALE);
        value.rescale(SCALE);
        if value.is_zero() {
            value.set_sign_positive(true);
        }
        Self(value)
    }

    /// Like `new`, but refuses values larger in magnitude than one quadrillion.
    pub fn bounded(value: Decimal) -> Result<Self, AmountError> {
        if value.abs() > MAX_MAGNITUDE {
            return Err(AmountError(AmountErrorKind::OutOfRange));
        }
        Ok(Self::new(value))
    }

    /// Parses `s`, treating anything that cannot be parsed or is out of range as zero.
    pub fn lenient(s: &str) -> Self {
        match Amount::from_str(s) {
            Ok(amount) => amount,
            Err(e) => {
                warn!("Treating the amount '{s}' as zero because it could not be parsed: {e}");
                Amount::ZERO
            }
        }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(AmountErrorKind);

#[derive(Debug)]
enum AmountErrorKind {
    Parse(rust_decimal::Error),
    OutOfRange,
}

impl AmountError {
    /// True when the input was a number, just too large to be an amount.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.0, AmountErrorKind::OutOfRange)
    }
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            AmountErrorKind::Parse(e) => Display::fmt(e, f),
            AmountErrorKind::OutOfRange => {
                write!(f, "amounts are limited to {MAX_MAGNITUDE} in magnitude")
            }
        }
    }
}

impl Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.0 {
            AmountErrorKind::Parse(e) => Some(e),
            AmountErrorKind::OutOfRange => None,
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::ZERO);
        }

        // "-$50.00", "$-50.00" and "€ 1,000" all reduce to a bare number
        let cleaned: String = trimmed
            .chars()
            .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
            .collect();

        match Decimal::from_str(&cleaned).or_else(|_| Decimal::from_scientific(&cleaned)) {
            Ok(value) => Amount::bounded(value),
            // "1e40" is a number, only not one a Decimal can hold
            Err(_) if cleaned.parse::<f64>().is_ok_and(|f| !f.is_nan()) => {
                Err(AmountError(AmountErrorKind::OutOfRange))
            }
            Err(e) => Err(AmountError(AmountErrorKind::Parse(e))),
        }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Accepts both JSON strings and JSON numbers.
struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a string holding a number")
    }

    fn visit_str<E: SerdeError>(self, v: &str) -> Result<Self::Value, E> {
        Amount::from_str(v).map_err(E::custom)
    }

    fn visit_i64<E: SerdeError>(self, v: i64) -> Result<Self::Value, E> {
        Amount::bounded(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: SerdeError>(self, v: u64) -> Result<Self::Value, E> {
        Amount::bounded(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: SerdeError>(self, v: f64) -> Result<Self::Value, E> {
        Decimal::from_f64(v)
            .ok_or_else(|| E::custom(format!("{v} cannot be represented as an amount")))
            .and_then(|d| Amount::bounded(d).map_err(E::custom))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

/// Saturates at the limits of `Decimal` instead of overflowing.
impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(saturate(self.0.checked_add(rhs.0), rhs.0))
    }
}

/// Saturates at the limits of `Decimal` instead of overflowing.
impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount::new(saturate(self.0.checked_sub(rhs.0), -rhs.0))
    }
}

/// The limit of `Decimal` in the direction `delta` pushed when `result` overflowed.
fn saturate(result: Option<Decimal>, delta: Decimal) -> Decimal {
    result.unwrap_or(if delta.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let amount = Amount::from_str("50").unwrap();
        assert_eq!(amount.value(), dec("50.00"));
        assert_eq!(amount.to_string(), "50.00");
    }

    #[test]
    fn test_parse_with_currency_symbols() {
        assert_eq!(Amount::from_str("$50.00").unwrap().value(), dec("50"));
        assert_eq!(Amount::from_str("€50.00").unwrap().value(), dec("50"));
        assert_eq!(Amount::from_str("£ 50").unwrap().value(), dec("50"));
        assert_eq!(Amount::from_str("-$50.00").unwrap().value(), dec("-50"));
    }

    #[test]
    fn test_parse_with_commas() {
        let amount = Amount::from_str("€1,234,567.89").unwrap();
        assert_eq!(amount.value(), dec("1234567.89"));
        assert_eq!(amount.to_string(), "1234567.89");
    }

    #[test]
    fn test_parse_empty_and_whitespace() {
        assert!(Amount::from_str("").unwrap().is_zero());
        assert!(Amount::from_str("   ").unwrap().is_zero());
        assert_eq!(Amount::from_str("  12.5  ").unwrap().to_string(), "12.50");
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(Amount::from_str("abc").is_err());
        assert!(Amount::from_str("12.5.6").is_err());
    }

    #[test]
    fn test_lenient_degrades_to_zero() {
        assert_eq!(Amount::lenient("abc"), Amount::ZERO);
        assert_eq!(Amount::lenient("N/A"), Amount::ZERO);
        assert_eq!(Amount::lenient("7"), Amount::new(dec("7")));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(Amount::from_str("0.125").unwrap().to_string(), "0.12");
        assert_eq!(Amount::from_str("0.135").unwrap().to_string(), "0.14");
    }

    #[test]
    fn test_zero_is_not_negative() {
        assert!(!Amount::ZERO.is_negative());
        assert!(!Amount::from_str("-0").unwrap().is_negative());
        assert!(Amount::from_str("-1").unwrap().is_negative());
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Amount::from_str("1000").unwrap();
        let b = Amount::from_str("250").unwrap();
        assert_eq!((a - b).to_string(), "750.00");
        assert_eq!((b - a).to_string(), "-750.00");
        let total: Amount = [a, b].iter().sum();
        assert_eq!(total.to_string(), "1250.00");
    }

    #[test]
    fn test_serialize() {
        let amount = Amount::from_str("50").unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"50.00\"");
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let a: Amount = serde_json::from_str("1000").unwrap();
        let b: Amount = serde_json::from_str("\"1,000.00\"").unwrap();
        let c: Amount = serde_json::from_str("99.99").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.to_string(), "99.99");
    }

    #[test]
    fn test_magnitude_bound() {
        assert_eq!(MAX_MAGNITUDE, dec("1000000000000000"));
        assert_eq!(
            Amount::from_str("1,000,000,000,000,000").unwrap().to_string(),
            "1000000000000000.00"
        );
        for huge in ["5e28", "1e40", "-1000000000000000.01", "$99999999999999999"] {
            let err = Amount::from_str(huge).unwrap_err();
            assert!(err.is_out_of_range(), "{huge}: {err}");
        }
        assert!(!Amount::from_str("abc").unwrap_err().is_out_of_range());
        assert!(Amount::lenient("5e28").is_zero());
        assert!(serde_json::from_str::<Amount>("5e28").is_err());
        assert!(serde_json::from_str::<Amount>("9223372036854775807").is_err());
    }

    #[test]
    fn test_arithmetic_saturates() {
        let max = Amount::new(Decimal::MAX);
        let min = Amount::new(Decimal::MIN);
        let one = Amount::from_str("1").unwrap();
        assert_eq!((max + one).value(), max.value());
        assert_eq!((min - one).value(), min.value());
        let total: Amount = [max, max, max].iter().sum();
        assert!(total > one);
    }
}
