//! Customer authorization of the estimated cost.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Tax multiplier applied to the estimate subtotal (16% IVA).
pub const TAX_RATE: Decimal = Decimal::from_parts(116, 0, 0, false, 2);

/// Multiplier giving the highest real cost accepted without re-authorization.
pub const OVERRUN_RATE: Decimal = Decimal::from_parts(110, 0, 0, false, 2);

/// The amount the customer agreed to pay.
///
/// An order holds at most one current authorization. A re-authorization
/// replaces it; the superseded one survives only in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Tax-inclusive amount, rounded to cents.
    pub authorized_amount: Money,

    /// Estimate subtotal at the time of authorization.
    pub subtotal: Money,

    /// Highest real total accepted without re-authorization.
    pub limit: Money,

    pub authorized_at: DateTime<Utc>,

    /// How many times the order was re-authorized (0 for the initial one).
    pub reauthorization_count: u32,
}

impl Authorization {
    /// Authorizes `subtotal × 1.16`, rounded half-even.
    ///
    /// Returns None if the amount or its limit is not representable.
    pub fn initial(subtotal: Money, authorized_at: DateTime<Utc>) -> Option<Self> {
        let authorized_amount = subtotal.checked_mul(TAX_RATE)?.rounded();
        Some(Self {
            authorized_amount,
            subtotal,
            limit: overrun_limit(authorized_amount)?,
            authorized_at,
            reauthorization_count: 0,
        })
    }

    /// Supersedes this authorization with a new amount.
    ///
    /// Returns None if the limit of the new amount is not representable.
    pub fn reauthorize(&self, new_amount: Money, authorized_at: DateTime<Utc>) -> Option<Self> {
        let authorized_amount = new_amount.rounded();
        Some(Self {
            authorized_amount,
            subtotal: self.subtotal,
            limit: overrun_limit(authorized_amount)?,
            authorized_at,
            reauthorization_count: self.reauthorization_count + 1,
        })
    }

    /// Returns true if the rounded real total is strictly above the limit.
    pub fn exceeds_limit(&self, real_total: Money) -> bool {
        real_total.rounded() > self.limit
    }
}

/// `authorized × 1.10`, rounded half-even.
fn overrun_limit(authorized_amount: Money) -> Option<Money> {
    Some(authorized_amount.checked_mul(OVERRUN_RATE)?.rounded())
}
