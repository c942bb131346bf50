//! Money value object.
//!
//! All monetary values are stored as i64 minor currency units (e.g. cents),
//! never as floats. Arithmetic is checked; overflow surfaces as a
//! validation error instead of wrapping.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Amount in minor currency units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Money = Money(0);

    /// Creates a non-negative amount, rejecting negative input.
    pub fn new(minor_units: i64) -> Result<Self, ValidationError> {
        if minor_units < 0 {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("amount cannot be negative, got {}", minor_units),
            ));
        }
        Ok(Self(minor_units))
    }

    /// Creates an amount without the non-negative check.
    ///
    /// Intended for reconstructing persisted values.
    pub fn from_minor_units(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Returns the raw minor-unit value.
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// True if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(&self, other: Money) -> Result<Money, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| ValidationError::invalid_format("amount", "amount overflow"))
    }

    /// Checked subtraction. Fails if the result would be negative.
    pub fn checked_sub(&self, other: Money) -> Result<Money, ValidationError> {
        match self.0.checked_sub(other.0) {
            Some(v) if v >= 0 => Ok(Money(v)),
            _ => Err(ValidationError::invalid_format(
                "amount",
                format!("cannot subtract {} from {}", other.0, self.0),
            )),
        }
    }

    /// Computes a whole percentage of this amount, rounding down.
    ///
    /// Used for platform commission accounting.
    pub fn percentage(&self, percent: u8) -> Money {
        Money(self.0 * i64::from(percent) / 100)
    }

    /// Sums an iterator of amounts with overflow checking.
    pub fn sum<'a>(amounts: impl Iterator<Item = &'a Money>) -> Result<Money, ValidationError> {
        amounts.fold(Ok(Money::ZERO), |acc, m| acc?.checked_add(*m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_non_negative_amounts() {
        assert_eq!(Money::new(0).unwrap(), Money::ZERO);
        assert_eq!(Money::new(45000).unwrap().minor_units(), 45000);
    }

    #[test]
    fn new_rejects_negative_amounts() {
        assert!(Money::new(-1).is_err());
    }

    #[test]
    fn checked_add_sums_amounts() {
        let a = Money::new(22500).unwrap();
        let b = Money::new(22500).unwrap();
        assert_eq!(a.checked_add(b).unwrap().minor_units(), 45000);
    }

    #[test]
    fn checked_add_detects_overflow() {
        let a = Money::from_minor_units(i64::MAX);
        let b = Money::new(1).unwrap();
        assert!(a.checked_add(b).is_err());
    }

    #[test]
    fn checked_sub_rejects_negative_result() {
        let a = Money::new(100).unwrap();
        let b = Money::new(200).unwrap();
        assert!(a.checked_sub(b).is_err());
        assert_eq!(b.checked_sub(a).unwrap().minor_units(), 100);
    }

    #[test]
    fn percentage_rounds_down() {
        let total = Money::new(45000).unwrap();
        assert_eq!(total.percentage(10).minor_units(), 4500);

        let odd = Money::new(45005).unwrap();
        assert_eq!(odd.percentage(10).minor_units(), 4500);
    }

    #[test]
    fn sum_adds_all_amounts() {
        let amounts = vec![Money::new(100).unwrap(), Money::new(250).unwrap()];
        assert_eq!(Money::sum(amounts.iter()).unwrap().minor_units(), 350);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let m = Money::new(45000).unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "45000");
    }
}
