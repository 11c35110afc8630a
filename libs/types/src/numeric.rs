//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point
//! errors). Values are integer-mantissa decimals, so sums of fills are
//! exact and replay reproduces identical totals byte for byte.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use thiserror::Error;

/// Validation failures for numeric construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("invalid decimal literal: {0}")]
    InvalidDecimal(String),

    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("quantity must not be negative, got {0}")]
    NegativeQuantity(Decimal),
}

/// A strictly positive limit price
///
/// Construction validates positivity, including on deserialization, so a
/// `Price` held anywhere in the engine is always usable as a book key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create from a whole-unit price
    ///
    /// # Panics
    /// Panics if `value` is zero
    pub fn from_u64(value: u64) -> Self {
        assert!(value > 0, "Price must be positive");
        Self(Decimal::from(value))
    }

    /// Try to create from a decimal, returning None if non-positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Parse from a decimal string literal
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, NumericError> {
        let value = Decimal::from_str(s)
            .map_err(|e| NumericError::InvalidDecimal(format!("{s}: {e}")))?;
        Self::try_from(value)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value <= Decimal::ZERO {
            return Err(NumericError::NonPositivePrice(value));
        }
        Ok(Self(value))
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Decimal {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative order or aggregate quantity
///
/// Zero is a valid aggregate value (empty level, no fills yet); orders
/// themselves are admitted only with non-zero quantity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    /// The zero quantity
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from a whole-unit quantity
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Try to create from a decimal, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Parse from a decimal string literal
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, NumericError> {
        let value = Decimal::from_str(s)
            .map_err(|e| NumericError::InvalidDecimal(format!("{s}: {e}")))?;
        Self::try_from(value)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Check if the quantity is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, returning None if the result would be negative
    pub fn checked_sub(&self, rhs: Quantity) -> Option<Quantity> {
        if rhs.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - rhs.0))
        }
    }

    /// Subtract, clamping at zero
    pub fn saturating_sub(&self, rhs: Quantity) -> Quantity {
        self.checked_sub(rhs).unwrap_or_else(Quantity::zero)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value < Decimal::ZERO {
            return Err(NumericError::NegativeQuantity(value));
        }
        Ok(Self(value))
    }
}

impl From<Quantity> for Decimal {
    fn from(quantity: Quantity) -> Decimal {
        quantity.0
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_non_positive() {
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(Decimal::from(-5)).is_none());
        assert!(Price::try_new(Decimal::from(5)).is_some());
    }

    #[test]
    fn test_price_from_str() {
        let price = Price::from_str("50000.25").unwrap();
        assert_eq!(price.as_decimal(), Decimal::from_str("50000.25").unwrap());

        assert!(Price::from_str("-1").is_err());
        assert!(Price::from_str("not-a-number").is_err());
    }

    #[test]
    #[should_panic(expected = "Price must be positive")]
    fn test_price_from_u64_zero_panics() {
        Price::from_u64(0);
    }

    #[test]
    fn test_price_ordering() {
        let low = Price::from_u64(10);
        let high = Price::from_str("10.5").unwrap();
        assert!(low < high);
    }

    #[test]
    fn test_price_scale_insensitive_equality() {
        let a = Price::from_str("10.0").unwrap();
        let b = Price::from_u64(10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_quantity_zero() {
        let q = Quantity::zero();
        assert!(q.is_zero());
        assert_eq!(q.as_decimal(), Decimal::ZERO);
    }

    #[test]
    fn test_quantity_rejects_negative() {
        assert!(Quantity::try_new(Decimal::from(-1)).is_none());
        assert!(Quantity::try_new(Decimal::ZERO).is_some());
    }

    #[test]
    fn test_quantity_add() {
        let a = Quantity::from_str("1.5").unwrap();
        let b = Quantity::from_str("0.5").unwrap();
        assert_eq!(a + b, Quantity::from_u64(2));
    }

    #[test]
    fn test_quantity_checked_sub() {
        let a = Quantity::from_u64(5);
        let b = Quantity::from_u64(3);
        assert_eq!(a.checked_sub(b), Some(Quantity::from_u64(2)));
        assert_eq!(b.checked_sub(a), None);
        assert!(b.saturating_sub(a).is_zero());
    }

    #[test]
    fn test_price_serde_rejects_invalid() {
        let ok: Result<Price, _> = serde_json::from_str("\"100.5\"");
        assert!(ok.is_ok());

        let bad: Result<Price, _> = serde_json::from_str("\"-100.5\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_price_serde_round_trip() {
        let price = Price::from_str("3000.50").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, back);
    }

    #[test]
    fn test_quantity_serde_round_trip() {
        let quantity = Quantity::from_str("2.125").unwrap();
        let json = serde_json::to_string(&quantity).unwrap();
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(quantity, back);
    }
}
