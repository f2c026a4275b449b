//! Billing period computation.
//!
//! Fixed schedules align boundaries to the UNIX epoch: hours and days count whole
//! units since 1970-01-01T00:00Z, weeks count from Monday 1970-01-05, months and years
//! count calendar months/years since January 1970. The unit index is floored to a
//! multiple of the interval number, so a 3-month schedule always starts periods in
//! January, April, July and October.
//!
//! Rolling schedules anchor every period at the instant they are asked about.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use super::models::{BillingSchedule, Interval, IntervalUnit, SchedulePlugin};
use crate::{
    error::{BillingError, Result},
    period::BillingPeriod,
};

/// Monday 1970-01-05T00:00Z, the first week boundary after the epoch.
const WEEK_ANCHOR: i64 = 4 * 86_400;

impl BillingSchedule {
    /// Returns the billing period containing `instant`.
    ///
    /// For fixed schedules this is the aligned period with `start <= instant < end`.
    /// For rolling schedules the period starts at `instant`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Arithmetic`] if the period bounds are out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use recurring_billing::schedule::{
    ///     BillingSchedule, BillingType, Interval, IntervalUnit, ScheduleId, SchedulePlugin,
    /// };
    ///
    /// # fn example() -> recurring_billing::error::Result<()> {
    /// let schedule = BillingSchedule::new(
    ///     ScheduleId::new("monthly")?,
    ///     "Monthly",
    ///     SchedulePlugin::Fixed,
    ///     BillingType::Postpaid,
    ///     Interval::new(1, IntervalUnit::Month)?,
    /// );
    ///
    /// let instant = Utc.with_ymd_and_hms(2017, 2, 24, 17, 30, 0).unwrap();
    /// let period = schedule.period_containing(instant)?;
    /// assert_eq!(period.start(), Utc.with_ymd_and_hms(2017, 2, 1, 0, 0, 0).unwrap());
    /// assert_eq!(period.end(), Utc.with_ymd_and_hms(2017, 3, 1, 0, 0, 0).unwrap());
    /// # Ok(())
    /// # }
    /// ```
    pub fn period_containing(&self, instant: DateTime<Utc>) -> Result<BillingPeriod> {
        let start = match self.plugin {
            SchedulePlugin::Fixed => aligned_start(&self.interval, instant)?,
            SchedulePlugin::Rolling => instant,
        };
        period_from(&self.interval, start)
    }

    /// Returns the first billing period for a subscription starting at `start`.
    ///
    /// On a fixed schedule a mid-period start yields a partial period running from
    /// `start` to the next aligned boundary; a start exactly on a boundary yields a full
    /// period. Rolling schedules always yield a full period starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Arithmetic`] if the period bounds are out of range.
    pub fn generate_first_billing_period(&self, start: DateTime<Utc>) -> Result<BillingPeriod> {
        let containing = self.period_containing(start)?;
        BillingPeriod::new(start, containing.end())
    }

    /// Returns the full period immediately following `previous`.
    ///
    /// The result starts at `previous.end()` whether or not `previous` was partial.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Arithmetic`] if the period bounds are out of range.
    pub fn next_period(&self, previous: &BillingPeriod) -> Result<BillingPeriod> {
        period_from(&self.interval, previous.end())
    }

    /// Returns the trial period for a trial starting at `trial_start`.
    ///
    /// Trials are always rolling: they last exactly one trial interval.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Configuration`] if the schedule has no trial interval.
    pub fn trial_period(&self, trial_start: DateTime<Utc>) -> Result<BillingPeriod> {
        let trial_interval = self.trial_interval.as_ref().ok_or_else(|| {
            BillingError::Configuration(format!(
                "The billing schedule \"{}\" does not allow trials.",
                self.id
            ))
        })?;
        period_from(trial_interval, trial_start)
    }
}

fn period_from(interval: &Interval, start: DateTime<Utc>) -> Result<BillingPeriod> {
    BillingPeriod::new(start, interval.add_to(start)?)
}

/// Floors `instant` to the nearest aligned boundary at or before it.
fn aligned_start(interval: &Interval, instant: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let number = i64::from(interval.number());
    match interval.unit() {
        IntervalUnit::Hour | IntervalUnit::Day => {
            let length = interval.fixed_length_seconds().ok_or_else(|| overflow(interval))?;
            let seconds = instant.timestamp().div_euclid(length) * length;
            timestamp(seconds, interval)
        }
        IntervalUnit::Week => {
            let length = interval.fixed_length_seconds().ok_or_else(|| overflow(interval))?;
            let offset = (instant.timestamp() - WEEK_ANCHOR).div_euclid(length) * length;
            timestamp(WEEK_ANCHOR + offset, interval)
        }
        IntervalUnit::Month => {
            let index = i64::from(instant.year() - 1970) * 12 + i64::from(instant.month0());
            let floored = index.div_euclid(number) * number;
            first_of_month(1970 + floored.div_euclid(12), floored.rem_euclid(12) + 1, interval)
        }
        IntervalUnit::Year => {
            let index = i64::from(instant.year() - 1970);
            let floored = index.div_euclid(number) * number;
            first_of_month(1970 + floored, 1, interval)
        }
    }
}

fn timestamp(seconds: i64, interval: &Interval) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| overflow(interval))
}

fn first_of_month(year: i64, month: i64, interval: &Interval) -> Result<DateTime<Utc>> {
    let year = i32::try_from(year).map_err(|_| overflow(interval))?;
    let month = u32::try_from(month).map_err(|_| overflow(interval))?;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single().ok_or_else(|| overflow(interval))
}

fn overflow(interval: &Interval) -> BillingError {
    BillingError::Arithmetic(format!("period boundary for {interval} is out of range"))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;
    use crate::schedule::{BillingType, ScheduleId};

    // ========================================================================
    // Test Helpers
    // ========================================================================

    fn schedule(plugin: SchedulePlugin, number: u32, unit: IntervalUnit) -> BillingSchedule {
        BillingSchedule::new(
            ScheduleId::new("test_id").unwrap(),
            "Test",
            plugin,
            BillingType::Postpaid,
            Interval::new(number, unit).unwrap(),
        )
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    // ========================================================================
    // Fixed Schedule Tests
    // ========================================================================

    #[test]
    fn test_hourly_period_containing() {
        let hourly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Hour);
        let period = hourly.period_containing(utc(2017, 2, 24, 17, 30)).unwrap();
        assert_eq!(period.start(), utc(2017, 2, 24, 17, 0));
        assert_eq!(period.end(), utc(2017, 2, 24, 18, 0));
        assert_eq!(period.duration_seconds(), 3600);
    }

    #[test]
    fn test_first_period_mid_hour_is_partial() {
        let hourly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Hour);
        let first = hourly.generate_first_billing_period(utc(2017, 2, 24, 17, 30)).unwrap();
        assert_eq!(first.start(), utc(2017, 2, 24, 17, 30));
        assert_eq!(first.end(), utc(2017, 2, 24, 18, 0));
        assert_eq!(first.duration_seconds(), 1800);
    }

    #[test]
    fn test_first_period_on_boundary_is_full() {
        let monthly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Month);
        let first = monthly.generate_first_billing_period(utc(2017, 3, 1, 0, 0)).unwrap();
        assert_eq!(first, monthly.period_containing(utc(2017, 3, 1, 0, 0)).unwrap());
        assert_eq!(first.end(), utc(2017, 4, 1, 0, 0));
    }

    #[test]
    fn test_first_period_mid_month() {
        let monthly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Month);
        let first = monthly.generate_first_billing_period(utc(2017, 2, 24, 17, 30)).unwrap();
        assert_eq!(first.start(), utc(2017, 2, 24, 17, 30));
        assert_eq!(first.end(), utc(2017, 3, 1, 0, 0));
    }

    #[test]
    fn test_quarterly_alignment() {
        let quarterly = schedule(SchedulePlugin::Fixed, 3, IntervalUnit::Month);
        let period = quarterly.period_containing(utc(2017, 5, 17, 8, 0)).unwrap();
        assert_eq!(period.start(), utc(2017, 4, 1, 0, 0));
        assert_eq!(period.end(), utc(2017, 7, 1, 0, 0));
    }

    #[test]
    fn test_weekly_alignment_starts_on_monday() {
        let weekly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Week);
        // 2017-02-24 is a Friday.
        let period = weekly.period_containing(utc(2017, 2, 24, 17, 30)).unwrap();
        assert_eq!(period.start(), utc(2017, 2, 20, 0, 0));
        assert_eq!(period.end(), utc(2017, 2, 27, 0, 0));
    }

    #[test]
    fn test_yearly_alignment() {
        let yearly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Year);
        let period = yearly.period_containing(utc(2017, 2, 24, 17, 30)).unwrap();
        assert_eq!(period.start(), utc(2017, 1, 1, 0, 0));
        assert_eq!(period.end(), utc(2018, 1, 1, 0, 0));
    }

    #[test]
    fn test_next_period_after_partial_is_full() {
        let monthly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Month);
        let first = monthly.generate_first_billing_period(utc(2017, 2, 24, 17, 30)).unwrap();
        let next = monthly.next_period(&first).unwrap();
        assert_eq!(next.start(), utc(2017, 3, 1, 0, 0));
        assert_eq!(next.end(), utc(2017, 4, 1, 0, 0));
    }

    // ========================================================================
    // Rolling Schedule Tests
    // ========================================================================

    #[test]
    fn test_rolling_first_period_is_never_partial() {
        let rolling = schedule(SchedulePlugin::Rolling, 1, IntervalUnit::Month);
        let first = rolling.generate_first_billing_period(utc(2017, 2, 24, 17, 30)).unwrap();
        assert_eq!(first.start(), utc(2017, 2, 24, 17, 30));
        assert_eq!(first.end(), utc(2017, 3, 24, 17, 30));
    }

    // ========================================================================
    // Trial Tests
    // ========================================================================

    #[test]
    fn test_trial_period_uses_trial_interval() {
        let with_trial = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Month)
            .with_trial_interval(Interval::new(10, IntervalUnit::Day).unwrap());
        let trial = with_trial.trial_period(utc(2017, 2, 24, 17, 30)).unwrap();
        assert_eq!(trial.start(), utc(2017, 2, 24, 17, 30));
        assert_eq!(trial.end(), utc(2017, 3, 6, 17, 30));
    }

    #[test]
    fn test_trial_period_without_trial_interval() {
        let no_trial = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Month);
        let err = no_trial.trial_period(utc(2017, 2, 24, 17, 30)).unwrap_err();
        assert!(matches!(err, BillingError::Configuration(_)));
        assert_eq!(err.to_string(), "The billing schedule \"test_id\" does not allow trials.");
    }

    // ========================================================================
    // Property Tests
    // ========================================================================

    fn unit_strategy() -> impl Strategy<Value = IntervalUnit> {
        prop_oneof![
            Just(IntervalUnit::Hour),
            Just(IntervalUnit::Day),
            Just(IntervalUnit::Week),
            Just(IntervalUnit::Month),
            Just(IntervalUnit::Year),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_period_containing_contains_instant(
            seconds in -2_000_000_000_i64..4_000_000_000_i64,
            number in 1_u32..13,
            unit in unit_strategy(),
        ) {
            let fixed = schedule(SchedulePlugin::Fixed, number, unit);
            let instant = DateTime::from_timestamp(seconds, 0).unwrap();
            let period = fixed.period_containing(instant).unwrap();
            prop_assert!(period.start() <= instant);
            prop_assert!(instant < period.end());
        }

        #[test]
        fn prop_next_period_is_contiguous_and_aligned(
            seconds in 0_i64..4_000_000_000_i64,
            number in 1_u32..13,
            unit in unit_strategy(),
        ) {
            let fixed = schedule(SchedulePlugin::Fixed, number, unit);
            let instant = DateTime::from_timestamp(seconds, 0).unwrap();
            let first = fixed.generate_first_billing_period(instant).unwrap();
            let next = fixed.next_period(&first).unwrap();
            prop_assert_eq!(next.start(), first.end());
            prop_assert_eq!(fixed.period_containing(next.start()).unwrap(), next);
        }

        #[test]
        fn prop_first_period_ends_on_boundary(
            seconds in 0_i64..4_000_000_000_i64,
            offset_minutes in 0_i64..600,
        ) {
            let hourly = schedule(SchedulePlugin::Fixed, 1, IntervalUnit::Hour);
            let start = DateTime::from_timestamp(seconds, 0).unwrap() + Duration::minutes(offset_minutes);
            let first = hourly.generate_first_billing_period(start).unwrap();
            prop_assert_eq!(first.start(), start);
            prop_assert_eq!(first.end().timestamp() % 3600, 0);
            prop_assert!(first.duration_seconds() <= 3600);
        }
    }
}
