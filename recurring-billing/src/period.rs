//! Billing periods.
//!
//! A billing period is an immutable half-open interval `[start, end)` covering one
//! invoice cycle, or the part of a cycle a single subscription is charged for.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Half-open time interval `[start, end)` with `start < end`.
///
/// Periods are never mutated; operations that need a different range build a new one.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use recurring_billing::period::BillingPeriod;
///
/// # fn example() -> recurring_billing::error::Result<()> {
/// let start = Utc.with_ymd_and_hms(2017, 2, 24, 17, 0, 0).unwrap();
/// let period = BillingPeriod::new(start, start + Duration::hours(1))?;
///
/// assert_eq!(period.duration_seconds(), 3600);
/// assert!(period.contains(start));
/// assert!(!period.contains(period.end()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct BillingPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawPeriod> for BillingPeriod {
    type Error = BillingError;

    fn try_from(raw: RawPeriod) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl BillingPeriod {
    /// Creates a new billing period.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidRange`] if `start` is not strictly before `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(BillingError::InvalidRange(format!(
                "period start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Returns the inclusive start instant.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the exclusive end instant.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns `end - start`.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns the duration in whole seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        self.duration().num_seconds()
    }

    /// Checks whether `instant` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Checks whether `other` lies entirely within this period.
    #[must_use]
    pub fn encloses(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns the overlap of two periods, or `None` if they do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Self::new(start, end).ok()
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
