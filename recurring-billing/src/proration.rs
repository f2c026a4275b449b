//! Proration of unit prices over partial billing periods.
//!
//! The engine only does arithmetic. Deciding *when* a prorated amount is charged
//! (now, later, or never) is billing-type policy applied by the recurring order
//! manager and the initial order processor.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    error::{BillingError, Result},
    period::BillingPeriod,
};

/// Computes prorated prices rounded half-up to a fixed number of decimal places.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use recurring_billing::{period::BillingPeriod, proration::ProrationEngine};
/// use rust_decimal::Decimal;
///
/// # fn example() -> recurring_billing::error::Result<()> {
/// let start = Utc.with_ymd_and_hms(2017, 2, 24, 17, 0, 0).unwrap();
/// let full = BillingPeriod::new(start, start + Duration::hours(1))?;
/// let actual = BillingPeriod::new(start + Duration::minutes(30), full.end())?;
///
/// let engine = ProrationEngine::new(2);
/// assert_eq!(engine.prorate(Decimal::from(2), &full, &actual)?, Decimal::ONE);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProrationEngine {
    precision: u32,
}

impl Default for ProrationEngine {
    fn default() -> Self {
        Self::new(2)
    }
}

impl ProrationEngine {
    /// Creates an engine rounding to `precision` decimal places.
    #[must_use]
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    /// Returns the rounding precision.
    #[must_use]
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Prorates `unit_price` by the fraction of `full` covered by `actual`.
    ///
    /// A full period returns `unit_price` unchanged, without rounding.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidRange`] if `actual` is not contained in `full`
    /// - [`BillingError::Arithmetic`] on decimal overflow
    pub fn prorate(
        &self,
        unit_price: Decimal,
        full: &BillingPeriod,
        actual: &BillingPeriod,
    ) -> Result<Decimal> {
        if !full.encloses(actual) {
            return Err(BillingError::InvalidRange(format!("{actual} is not contained in {full}")));
        }
        if actual == full {
            return Ok(unit_price);
        }

        let overflow = || BillingError::Arithmetic(format!("prorating {unit_price} overflows"));
        let ratio = Decimal::from(actual.duration_seconds())
            .checked_div(Decimal::from(full.duration_seconds()))
            .ok_or_else(overflow)?;
        let prorated = unit_price.checked_mul(ratio).ok_or_else(overflow)?;

        Ok(prorated.round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero))
    }
}
