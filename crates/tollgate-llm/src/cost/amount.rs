//! Monetary amounts
//!
//! USD amounts with 6-decimal precision, rounded half-to-even on
//! construction. Addition is closed; `ZERO` is the identity.

use crate::error::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Stored decimal places
const SCALE: u32 = 6;

/// A non-negative USD amount with 6-decimal precision
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CostAmount(Decimal);

impl CostAmount {
    /// Zero dollars
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Construct from a decimal; rejects negative values and rescales to
    /// 6 decimal places with banker's rounding
    pub fn new(amount: Decimal) -> Result<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(Error::Validation(format!(
                "cost amount must be non-negative, got {amount}"
            )));
        }
        Ok(Self(amount.round_dp_with_strategy(
            SCALE,
            RoundingStrategy::MidpointNearestEven,
        )))
    }

    /// The underlying decimal
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether this is exactly zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for CostAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        // both operands are already at 6 dp; the sum cannot gain scale
        Self(self.0 + rhs.0)
    }
}

impl fmt::Display for CostAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_rounds_half_to_even() {
        // 7th decimal exactly 5: ties go to the even neighbor
        let down = CostAmount::new(dec("0.00000025")).unwrap();
        assert_eq!(down.as_decimal(), dec("0.0000002"));

        let up = CostAmount::new(dec("0.00000035")).unwrap();
        assert_eq!(up.as_decimal(), dec("0.0000004"));
    }

    #[test]
    fn test_rejects_negative() {
        assert!(CostAmount::new(dec("-0.01")).is_err());
        assert!(CostAmount::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_zero_is_additive_identity() {
        let amount = CostAmount::new(dec("1.25")).unwrap();
        assert_eq!(amount + CostAmount::ZERO, amount);
        assert_eq!(CostAmount::ZERO + amount, amount);
    }

    #[test]
    fn test_addition_closed() {
        let a = CostAmount::new(dec("0.000500")).unwrap();
        let b = CostAmount::new(dec("0.000250")).unwrap();
        assert_eq!((a + b).as_decimal(), dec("0.000750"));
    }

    #[test]
    fn test_serde_transparent() {
        let amount = CostAmount::new(dec("0.0005")).unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        let back: CostAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
