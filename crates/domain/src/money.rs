//! Monetary value object.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a money literal cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid money amount: {0:?}")]
pub struct ParseMoneyError(String);

/// An exact decimal amount in the shop's single currency.
///
/// Arithmetic is exact; nothing is rounded until [`Money::rounded`] is
/// called. Authoritative amounts (authorized amount, overrun limit) are
/// rounded once, to cents, with round-half-to-even.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of fraction digits of an authoritative amount.
    pub const SCALE: u32 = 2;

    /// Creates a money value from an exact decimal amount.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the exact amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Adds another amount without rounding.
    ///
    /// Returns None if the sum is not representable.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies by a rate (e.g. `1.16`) without rounding.
    ///
    /// Returns None if the product is not representable.
    pub fn checked_mul(&self, rate: Decimal) -> Option<Money> {
        self.0.checked_mul(rate).map(Money)
    }

    /// Multiplies by a quantity.
    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.checked_mul(Decimal::from(quantity))
    }

    /// Sums amounts, stopping at the first overflow.
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Rounds to cents using banker's rounding (ties go to the even digit).
    pub fn rounded(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointNearestEven),
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

/// Displays the rounded amount with exactly two fraction digits.
impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut amount = self.rounded().0;
        amount.rescale(Self::SCALE);
        write!(f, "{amount}")
    }
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Money)
            .map_err(|_| ParseMoneyError(s.to_string()))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}
