//! Recurring Billing: subscription billing periods, proration and recurring orders
//!
//! A library for billing subscriptions on a schedule. It computes billing periods,
//! prorates charges for partial periods, tracks the subscription state machine and
//! drives the recurring orders that invoice each billing cycle.
//!
//! # Architecture
//!
//! ```text
//!              ┌───────────────────────┐
//!              │ RecurringOrderManager │──── PaymentGateway (capture)
//!              └───┬─────────┬─────────┘
//!                  │         │
//!      ┌───────────▼──┐   ┌──▼──────────────┐     ┌────────────────────────┐
//!      │ Subscription │   │ ProrationEngine │◄────│ InitialOrderProcessor  │
//!      │ state machine│   └──┬──────────────┘     └────────────────────────┘
//!      └──────────────┘      │
//!                  ┌─────────▼─────────┐
//!                  │ BillingSchedule   │  period_containing, first/next/trial
//!                  └─────────┬─────────┘
//!                            │
//!                  ┌─────────▼─────────┐
//!                  │ BillingPeriod     │  [start, end)
//!                  └───────────────────┘
//! ```
//!
//! Storage is reached through the [`store::EntityStore`] trait and payment capture
//! through [`payment::PaymentGateway`]. [`store::InMemoryStore`] is provided; no
//! gateway is.
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use recurring_billing::{
//!     period::BillingPeriod,
//!     schedule::{BillingSchedule, BillingType, Interval, IntervalUnit, ScheduleId, SchedulePlugin},
//! };
//!
//! # fn example() -> recurring_billing::Result<()> {
//! let monthly = BillingSchedule::new(
//!     ScheduleId::new("monthly")?,
//!     "Monthly",
//!     SchedulePlugin::Fixed,
//!     BillingType::Prepaid,
//!     Interval::new(1, IntervalUnit::Month)?,
//! );
//!
//! let start = Utc.with_ymd_and_hms(2017, 2, 15, 0, 0, 0).unwrap();
//! let first = monthly.generate_first_billing_period(start)?;
//! let next = monthly.next_period(&first)?;
//!
//! assert_eq!(first.end(), next.start());
//! assert_eq!(next.end(), Utc.with_ymd_and_hms(2017, 4, 1, 0, 0, 0).unwrap());
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber. Billing
//! events that affect what a customer pays are also emitted on the `audit` target
//! (see [`audit`]).
//!
//! # Error Handling
//!
//! All operations return [`Result<T, BillingError>`](error::Result). "Nothing to
//! renew" and "order canceled on refresh" are reported through return values and
//! order state, not errors.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod audit;
pub mod config;
pub mod cron;
pub mod error;
pub mod initial;
pub mod manager;
pub mod order;
pub mod payment;
pub mod period;
pub mod proration;
pub mod schedule;
pub mod store;
pub mod subscription;

pub use config::BillingConfig;
pub use error::{BillingError, Result};
pub use manager::RecurringOrderManager;
