//! Adjustments for the initial purchase order.
//!
//! The checkout order that creates a subscription still carries the product at its
//! full price. [`InitialOrderProcessor`] adds one subscription adjustment per item
//! so the day-one charge matches the billing schedule:
//!
//! - trial configured: the item is free ("Free trial")
//! - postpaid: the item is free now and billed on the first recurring order ("Pay later")
//! - prepaid: the item is charged for the remainder of the first period ("Proration")

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::{
    audit::{AuditEvent, AuditEventType, audit_log},
    config::BillingConfig,
    error::{BillingError, Result},
    order::{Adjustment, AdjustmentType, Order, OrderItem},
    proration::ProrationEngine,
    schedule::BillingType,
    store::EntityStore,
};

/// Applies billing-type policy to initial purchase items.
#[derive(Debug)]
pub struct InitialOrderProcessor<S> {
    store: S,
    engine: ProrationEngine,
    config: BillingConfig,
}

impl<S: EntityStore> InitialOrderProcessor<S> {
    /// Creates a processor with default settings.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, BillingConfig::default())
    }

    /// Creates a processor with the given settings.
    #[must_use]
    pub fn with_config(store: S, config: BillingConfig) -> Self {
        Self { store, engine: config.proration_engine(), config }
    }

    /// Processes every item on `order`, returning how many were adjusted.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`process`](Self::process).
    pub fn process_order(&self, order: &mut Order) -> Result<usize> {
        let mut adjusted = 0;
        for item in &mut order.items {
            if self.process(item)? {
                adjusted += 1;
            }
        }
        Ok(adjusted)
    }

    /// Adds the subscription adjustment to `item`.
    ///
    /// Returns `false` without changes if the item has no subscription, already
    /// carries a subscription adjustment, or is prepaid from a period boundary (a
    /// full first period needs no proration). Reprocessing is safe.
    ///
    /// # Errors
    ///
    /// - [`BillingError::NotFound`] if the subscription or its schedule is missing
    /// - [`BillingError::InvalidInput`] if a prepaid subscription has no start instant
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub fn process(&self, item: &mut OrderItem) -> Result<bool> {
        let Some(subscription_id) = item.subscription.clone() else {
            return Ok(false);
        };
        if item.has_adjustment(AdjustmentType::Subscription) {
            debug!("already processed");
            return Ok(false);
        }

        let subscription = self.store.subscription(&subscription_id)?;
        let schedule = self.store.schedule(&subscription.billing_schedule)?;
        let labels = &self.config.labels;

        let adjustment = if schedule.allows_trials() {
            Adjustment::subscription(&labels.free_trial, -item.total_price())
        } else {
            match schedule.billing_type {
                BillingType::Postpaid => {
                    Adjustment::subscription(&labels.postpaid, -item.total_price())
                }
                BillingType::Prepaid => {
                    let starts = subscription.starts.ok_or_else(|| {
                        BillingError::InvalidInput(format!(
                            "subscription {subscription_id} has no start instant"
                        ))
                    })?;
                    let full = schedule.period_containing(starts)?;
                    let first = schedule.generate_first_billing_period(starts)?;
                    let prorated = self.engine.prorate(item.unit_price, &full, &first)?;
                    if prorated == item.unit_price {
                        debug!("starts on a period boundary, nothing to prorate");
                        return Ok(false);
                    }
                    let difference = (prorated - item.unit_price)
                        .checked_mul(item.quantity)
                        .ok_or_else(|| {
                            BillingError::Arithmetic(format!("adjusting item {} overflows", item.id))
                        })?;
                    Adjustment::subscription(&labels.proration, difference)
                }
            }
        };

        let amount: Decimal = adjustment.amount;
        item.add_adjustment(adjustment);

        debug!(%amount, "initial item adjusted");
        audit_log(
            &AuditEvent::new(AuditEventType::InitialOrderProcessed)
                .with_subscription_id(&subscription_id)
                .with_amount(amount),
        );
        Ok(true)
    }
}
