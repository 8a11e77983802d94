use crate::error::{PayoutError, Result};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A monetary value in integer minor-currency units (cents).
///
/// All payout amounts are carried as whole cents; floating point never enters
/// the arithmetic. This is a wrapper around `i64` to enforce domain rules and
/// keep amounts from mixing with unrelated integers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Hash,
)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Self = Self(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Clamps negative values to zero. Availability math never reports debt.
    pub fn clamped(self) -> Self {
        Self(self.0.max(0))
    }

    /// Converts to unsigned ledger units for gateway-side comparisons.
    pub fn as_units(&self) -> u128 {
        self.0.max(0) as u128
    }
}

impl Add for Cents {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::fmt::Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive payment amount.
///
/// Instructions are only ever created for positive amounts; zero-value
/// transfers are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(Cents);

impl Amount {
    pub fn new(cents: Cents) -> Result<Self> {
        if cents.0 > 0 {
            Ok(Self(cents))
        } else {
            Err(PayoutError::Validation(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn cents(&self) -> Cents {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = PayoutError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(Cents(value))
    }
}

impl From<Amount> for Cents {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}
