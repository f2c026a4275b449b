//! Renewal sweep.
//!
//! [`RecurringCron`] finds draft recurring orders whose period has ended and
//! walks each one through refresh, close, renewal and trial conversion. Payment
//! failures are recorded and the order stays open for the next sweep; any other
//! error aborts the sweep.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::{
    error::Result,
    manager::RecurringOrderManager,
    order::{Order, OrderId, OrderState},
    payment::PaymentGateway,
    store::EntityStore,
};

/// A payment failure recorded during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
    /// Order that could not be closed.
    pub order_id: OrderId,
    /// Failure reason.
    pub reason: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CronReport {
    /// Orders picked up.
    pub processed: usize,
    /// Orders completed.
    pub closed: usize,
    /// Orders canceled on refresh because nothing was left to bill.
    pub canceled: usize,
    /// Orders that produced a next-period order.
    pub renewed: usize,
    /// Trial subscriptions converted to paid ones.
    pub trials_converted: usize,
    /// Orders left open after a failed capture.
    pub payment_failures: Vec<PaymentFailure>,
}

/// Periodic driver for due recurring orders.
#[derive(Debug)]
pub struct RecurringCron<'a, S, G> {
    manager: &'a RecurringOrderManager<S, G>,
}

impl<'a, S: EntityStore, G: PaymentGateway> RecurringCron<'a, S, G> {
    /// Creates a sweep over `manager`'s store.
    #[must_use]
    pub fn new(manager: &'a RecurringOrderManager<S, G>) -> Self {
        Self { manager }
    }

    /// Handles up to `cron.batch_size` draft orders whose period ended by `now`.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not a payment failure.
    #[instrument(skip(self))]
    pub fn run(&self, now: DateTime<Utc>) -> Result<CronReport> {
        let store = self.manager.store();
        let batch_size = self.manager.config().cron.batch_size;
        let mut report = CronReport::default();

        for mut order in store.draft_recurring_orders_ending_by(now, batch_size)? {
            report.processed += 1;
            self.handle(&mut order, now, &mut report)?;
        }

        info!(
            processed = report.processed,
            closed = report.closed,
            renewed = report.renewed,
            failed = report.payment_failures.len(),
            "renewal sweep finished"
        );
        Ok(report)
    }

    fn handle(&self, order: &mut Order, now: DateTime<Utc>, report: &mut CronReport) -> Result<()> {
        self.manager.refresh_order(order)?;
        if order.state == OrderState::Canceled {
            report.canceled += 1;
            return Ok(());
        }

        match self.manager.close_order(order) {
            Ok(()) => report.closed += 1,
            Err(error) if error.is_payment_failure() => {
                warn!(order_id = %order.id, %error, "order left open for the next sweep");
                report.payment_failures.push(PaymentFailure {
                    order_id: order.id,
                    reason: error.to_string(),
                });
                return Ok(());
            }
            Err(error) => return Err(error),
        }

        // Only subscriptions already active on this order follow it into the next
        // period. Converted trials start from their own first paid order.
        if self.manager.renew_order(order)?.is_some() {
            report.renewed += 1;
        }

        let store = self.manager.store();
        for id in order.subscription_ids() {
            let mut subscription = store.subscription(&id)?;
            if let Some(trial_ends) = subscription.trial_ends
                && subscription.is_trial_finished(now)
            {
                subscription.activate(trial_ends)?;
                self.manager.start_recurring(&mut subscription)?;
                report.trials_converted += 1;
            }
        }
        Ok(())
    }
}
