//! Billing schedules and the period calculator.
//!
//! A [`BillingSchedule`] is plain configuration. Period computation lives in
//! `calculator` as methods on the schedule so callers never need a separate
//! calculator object:
//!
//! - [`BillingSchedule::period_containing`]: the aligned period around an instant
//! - [`BillingSchedule::generate_first_billing_period`]: a possibly partial first period
//! - [`BillingSchedule::next_period`]: the full period after a given one
//! - [`BillingSchedule::trial_period`]: the rolling trial window

mod calculator;
mod models;

pub(crate) use models::validate_id;
pub use models::{BillingSchedule, BillingType, Interval, IntervalUnit, ScheduleId, SchedulePlugin};
