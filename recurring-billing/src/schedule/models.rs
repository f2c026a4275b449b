//! Billing schedule data models.
//!
//! A billing schedule describes how often a subscription is billed (its interval),
//! whether it is billed before or after the service is rendered (its billing type),
//! how period boundaries are placed (its plugin), and optionally how long a free
//! trial lasts.

use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Validates an identifier: non-empty, at most 64 characters, only alphanumerics,
/// hyphens and underscores.
pub(crate) fn validate_id(field: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(BillingError::InvalidInput(format!("{field} cannot be empty")));
    }
    if id.len() > 64 {
        return Err(BillingError::InvalidInput(format!("{field} must be 64 characters or less")));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(BillingError::InvalidInput(format!(
            "{field} can only contain alphanumeric characters, hyphens, and underscores"
        )));
    }
    Ok(())
}

/// Unique identifier for a billing schedule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ScheduleId(String);

impl ScheduleId {
    /// Creates a new schedule ID after validation.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidInput`] if the ID is empty, exceeds 64 characters,
    /// or contains characters other than alphanumerics, hyphens and underscores.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        validate_id("schedule_id", &id)?;
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ScheduleId {
    type Error = BillingError;

    fn try_from(id: String) -> Result<Self> {
        Self::new(id)
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When a billing cycle is charged relative to the service it covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    /// Charged up front, at the start of the period.
    Prepaid,
    /// Charged after the fact, at the end of the period.
    #[default]
    Postpaid,
}

impl BillingType {
    /// Returns the machine name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepaid => "prepaid",
            Self::Postpaid => "postpaid",
        }
    }
}

/// Calendar unit of an [`Interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    /// One hour.
    Hour,
    /// One day (24 hours, UTC).
    Day,
    /// One week, starting on Monday.
    Week,
    /// One calendar month.
    Month,
    /// One calendar year.
    Year,
}

impl IntervalUnit {
    /// Returns the machine name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Returns the fixed length in seconds, or `None` for calendar units.
    #[must_use]
    pub fn fixed_seconds(&self) -> Option<i64> {
        match self {
            Self::Hour => Some(3_600),
            Self::Day => Some(86_400),
            Self::Week => Some(604_800),
            Self::Month | Self::Year => None,
        }
    }
}

/// A positive number of [`IntervalUnit`]s, e.g. "3 months".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    number: u32,
    unit: IntervalUnit,
}

#[derive(Deserialize)]
struct RawInterval {
    number: u32,
    unit: IntervalUnit,
}

impl TryFrom<RawInterval> for Interval {
    type Error = BillingError;

    fn try_from(raw: RawInterval) -> Result<Self> {
        Self::new(raw.number, raw.unit)
    }
}

impl Interval {
    /// Creates a new interval.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Configuration`] if `number` is zero.
    pub fn new(number: u32, unit: IntervalUnit) -> Result<Self> {
        if number == 0 {
            return Err(BillingError::Configuration(format!(
                "interval number must be positive, got 0 {}",
                unit.as_str()
            )));
        }
        Ok(Self { number, unit })
    }

    /// Returns the number of units.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Returns the unit.
    #[must_use]
    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Adds this interval to `instant`.
    ///
    /// Hours, days and weeks are fixed durations. Months and years use calendar
    /// arithmetic, clamping to the last day of shorter months.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Arithmetic`] if the result is out of range.
    pub fn add_to(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let overflow = || {
            BillingError::Arithmetic(format!(
                "adding {} {} to {instant} overflows",
                self.number,
                self.unit.as_str()
            ))
        };
        match self.unit {
            IntervalUnit::Hour | IntervalUnit::Day | IntervalUnit::Week => {
                let seconds = self.fixed_length_seconds().ok_or_else(overflow)?;
                instant.checked_add_signed(Duration::seconds(seconds)).ok_or_else(overflow)
            }
            IntervalUnit::Month => {
                instant.checked_add_months(Months::new(self.number)).ok_or_else(overflow)
            }
            IntervalUnit::Year => {
                let months = self.number.checked_mul(12).ok_or_else(overflow)?;
                instant.checked_add_months(Months::new(months)).ok_or_else(overflow)
            }
        }
    }

    /// Total length in seconds for fixed-duration units.
    pub(crate) fn fixed_length_seconds(&self) -> Option<i64> {
        self.unit.fixed_seconds()?.checked_mul(i64::from(self.number))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.number == 1 {
            write!(f, "1 {}", self.unit.as_str())
        } else {
            write!(f, "{} {}s", self.number, self.unit.as_str())
        }
    }
}

/// How period boundaries are placed.
///
/// A closed set: each variant is a different boundary rule behind the same calculator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePlugin {
    /// Boundaries aligned to the calendar (the 1st of the month, midnight, the top of
    /// the hour). Subscriptions starting mid-period get a partial, prorated first period.
    #[default]
    Fixed,
    /// Boundaries anchored at each subscription's own start. Never produces partial
    /// periods.
    Rolling,
}

/// Billing schedule configuration.
///
/// # Examples
///
/// ```
/// use recurring_billing::schedule::{
///     BillingSchedule, BillingType, Interval, IntervalUnit, ScheduleId, SchedulePlugin,
/// };
///
/// # fn example() -> recurring_billing::error::Result<()> {
/// let schedule = BillingSchedule::new(
///     ScheduleId::new("monthly")?,
///     "Monthly",
///     SchedulePlugin::Fixed,
///     BillingType::Prepaid,
///     Interval::new(1, IntervalUnit::Month)?,
/// )
/// .with_trial_interval(Interval::new(14, IntervalUnit::Day)?);
///
/// assert!(schedule.allows_trials());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSchedule {
    /// Unique schedule identifier.
    pub id: ScheduleId,
    /// Display label.
    pub label: String,
    /// Boundary placement rule.
    #[serde(default)]
    pub plugin: SchedulePlugin,
    /// Prepaid or postpaid.
    #[serde(default)]
    pub billing_type: BillingType,
    /// Length of one billing period.
    pub interval: Interval,
    /// Length of the free trial, if trials are allowed.
    #[serde(default)]
    pub trial_interval: Option<Interval>,
}

impl BillingSchedule {
    /// Creates a schedule without a trial interval.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(
        id: ScheduleId,
        label: impl Into<String>,
        plugin: SchedulePlugin,
        billing_type: BillingType,
        interval: Interval,
    ) -> Self {
        Self { id, label: label.into(), plugin, billing_type, interval, trial_interval: None }
    }

    /// Adds a trial interval.
    #[must_use]
    pub fn with_trial_interval(mut self, trial_interval: Interval) -> Self {
        self.trial_interval = Some(trial_interval);
        self
    }

    /// Checks whether trials can be started on this schedule.
    #[must_use]
    pub fn allows_trials(&self) -> bool {
        self.trial_interval.is_some()
    }
}
