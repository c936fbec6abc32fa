use crate::error::PaymentError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept on the grand total.
pub const TOTAL_DECIMAL_PLACES: u32 = 2;

/// Represents a positive monetary amount for a transaction.
///
/// Wraps `rust_decimal::Decimal` so that a non-positive amount cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "amount must be a positive number".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A non-negative percentage such as the buyer float or the sojor rate.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "percentage must be >= 0".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `base * self / 100`, unrounded. `None` when the product overflows.
    pub fn of(&self, base: Decimal) -> Option<Decimal> {
        base.checked_mul(self.0)?.checked_div(Decimal::ONE_HUNDRED)
    }
}

impl TryFrom<Decimal> for Percent {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Charges derived from a transaction's economic inputs.
///
/// Never persisted as authoritative state; recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charges {
    pub float_charge: Decimal,
    pub sojor_charge: Decimal,
    pub grand_total: Decimal,
}

impl Charges {
    /// Computes the charges for `(amount, buyer_float, sojor)`.
    ///
    /// Intermediate charges stay unrounded; only the grand total is rounded half
    /// away from zero to two decimal places.
    ///
    /// Fails with `ValidationError` when the total cannot be represented with two
    /// decimal places.
    pub fn compute(
        amount: Amount,
        buyer_float: Percent,
        sojor: Percent,
    ) -> Result<Self, PaymentError> {
        let base = amount.value();
        let float_charge = buyer_float.of(base).ok_or_else(out_of_range)?;
        let sojor_charge = sojor.of(base).ok_or_else(out_of_range)?;
        let total = base
            .checked_add(float_charge)
            .and_then(|sum| sum.checked_add(sojor_charge))
            .ok_or_else(out_of_range)?;
        Ok(Self {
            float_charge,
            sojor_charge,
            grand_total: round_total(total).ok_or_else(out_of_range)?,
        })
    }
}

fn round_total(value: Decimal) -> Option<Decimal> {
    let mut rounded =
        value.round_dp_with_strategy(TOTAL_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    // Pads to exactly two places, e.g. 1040 -> 1040.00.
    rounded.rescale(TOTAL_DECIMAL_PLACES);
    // rescale caps the scale when the mantissa has no room left.
    (rounded.scale() == TOTAL_DECIMAL_PLACES).then_some(rounded)
}

fn out_of_range() -> PaymentError {
    PaymentError::ValidationError("amount and rates produce a total out of range".to_string())
}
