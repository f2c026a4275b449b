//! Recurring order orchestration.
//!
//! [`RecurringOrderManager`] turns subscriptions into draft recurring orders, keeps
//! those orders in sync with subscription changes, closes them with a payment
//! capture and renews them into the next billing period.
//!
//! Every operation derives order items through the same charge rules, so running
//! an operation twice on unchanged data leaves the order unchanged:
//!
//! | State | Prepaid | Postpaid |
//! |---|---|---|
//! | Trial | free over the trial window | free over the trial window |
//! | Active | `[max(starts, P.start), P.end)` | `[max(starts, P.start), P.end)` |
//! | Canceled | nothing | `[max(starts, P.start), min(ends, P.end))` |
//! | other | nothing | nothing |
//!
//! where `P` is the order's billing period. Charged ranges are prorated against `P`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, AuditEventType, audit_log},
    config::BillingConfig,
    error::{BillingError, Result},
    order::{Order, OrderGroupKey, OrderItem, OrderState, partition_subscriptions},
    payment::{PaymentGateway, PaymentState},
    period::BillingPeriod,
    proration::ProrationEngine,
    schedule::{BillingSchedule, BillingType},
    store::EntityStore,
    subscription::{Subscription, SubscriptionState},
};

/// Range and unit price one subscription contributes to an order.
#[derive(Debug, Clone, Copy)]
struct Charge {
    period: BillingPeriod,
    unit_price: Decimal,
}

/// Drives the recurring order lifecycle.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use recurring_billing::{
///     error::Result,
///     manager::RecurringOrderManager,
///     order::Order,
///     payment::{Payment, PaymentGateway, PaymentMethod},
///     schedule::{BillingSchedule, BillingType, Interval, IntervalUnit, ScheduleId, SchedulePlugin},
///     store::{EntityStore, InMemoryStore},
///     subscription::{Subscription, SubscriptionId, SubscriptionState},
/// };
/// use rust_decimal::Decimal;
///
/// #[derive(Debug)]
/// struct AlwaysApproves;
///
/// impl PaymentGateway for AlwaysApproves {
///     fn capture(&self, method: &PaymentMethod, order: &Order, amount: Decimal) -> Result<Payment> {
///         Ok(Payment::completed(method, order, amount))
///     }
/// }
///
/// # fn example() -> Result<()> {
/// let store = InMemoryStore::new();
/// store.save_schedule(&BillingSchedule::new(
///     ScheduleId::new("hourly")?,
///     "Hourly",
///     SchedulePlugin::Fixed,
///     BillingType::Postpaid,
///     Interval::new(1, IntervalUnit::Hour)?,
/// ))?;
///
/// let mut subscription = Subscription::new(
///     SubscriptionId::new("sub-1")?,
///     ScheduleId::new("hourly")?,
///     Decimal::from(2),
///     "USD",
/// )
/// .with_state(SubscriptionState::Active)
/// .with_starts(Utc.with_ymd_and_hms(2017, 2, 24, 17, 30, 0).unwrap());
///
/// let manager = RecurringOrderManager::new(store, AlwaysApproves);
/// let order = manager.start_recurring(&mut subscription)?;
/// assert_eq!(order.items[0].unit_price, Decimal::ONE);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RecurringOrderManager<S, G> {
    store: S,
    gateway: G,
    engine: ProrationEngine,
    config: BillingConfig,
}

impl<S: EntityStore, G: PaymentGateway> RecurringOrderManager<S, G> {
    /// Creates a manager with default settings.
    #[must_use]
    pub fn new(store: S, gateway: G) -> Self {
        Self::with_config(store, gateway, BillingConfig::default())
    }

    /// Creates a manager with the given settings.
    #[must_use]
    pub fn with_config(store: S, gateway: G, config: BillingConfig) -> Self {
        Self { store, gateway, engine: config.proration_engine(), config }
    }

    /// Returns the entity store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Generates the free trial order for a trial subscription.
    ///
    /// The order covers the trial window. The subscription's `trial_ends` is set to
    /// the end of that window and the order is recorded on the subscription; its
    /// renewal time is left untouched.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidState`] unless the subscription is in `Trial`
    /// - [`BillingError::Configuration`] if the schedule has no trial interval
    /// - [`BillingError::InvalidInput`] if the subscription has no trial start
    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id))]
    pub fn start_trial(&self, subscription: &mut Subscription) -> Result<Order> {
        subscription.ensure_can_start_trial()?;
        let schedule = self.store.schedule(&subscription.billing_schedule)?;
        if !schedule.allows_trials() {
            return Err(BillingError::Configuration(format!(
                "The billing schedule \"{}\" does not allow trials.",
                schedule.id
            )));
        }
        let trial_starts = subscription.trial_starts.ok_or_else(|| {
            BillingError::InvalidInput(format!("subscription {} has no trial start", subscription.id))
        })?;

        let trial_period = schedule.trial_period(trial_starts)?;
        subscription.trial_ends = Some(trial_period.end());
        let order = self.collect_subscriptions(std::slice::from_mut(subscription), trial_period)?;

        info!(order_id = %order.id, period = %trial_period, "trial order generated");
        audit_log(
            &AuditEvent::new(AuditEventType::TrialStarted)
                .with_order_id(order.id)
                .with_subscription_id(&subscription.id),
        );
        Ok(order)
    }

    /// Generates the first paid recurring order for an active subscription.
    ///
    /// The order covers the full period containing the subscription start. A
    /// mid-period start yields a prorated item covering only the remainder.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidState`] unless the subscription is `Active`
    /// - [`BillingError::InvalidInput`] if the subscription has no start instant
    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id))]
    pub fn start_recurring(&self, subscription: &mut Subscription) -> Result<Order> {
        subscription.ensure_can_start_recurring()?;
        let starts = subscription.starts.ok_or_else(|| missing_start(subscription))?;
        let schedule = self.store.schedule(&subscription.billing_schedule)?;

        let period = schedule.period_containing(starts)?;
        let order = self.collect_subscriptions(std::slice::from_mut(subscription), period)?;

        info!(order_id = %order.id, %period, "recurring order generated");
        audit_log(
            &AuditEvent::new(AuditEventType::RecurringStarted)
                .with_order_id(order.id)
                .with_subscription_id(&subscription.id)
                .with_amount(order.total()),
        );
        Ok(order)
    }

    /// Adds `subscriptions` to the draft recurring order for `period`.
    ///
    /// The subscriptions must share store, customer, billing schedule and payment
    /// method. An existing draft order for that group and period is reused;
    /// otherwise a new one is created. Each subscription ends up with exactly one
    /// item and records the order. The order's billing profile, payment method and
    /// payment gateway are copied from the shared payment method. Subscriptions and
    /// the order are saved. A new order without a subscription currency uses
    /// `currency.default_code`.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidInput`] if `subscriptions` is empty or mixes groups
    /// - [`BillingError::NotFound`] if the billing schedule does not exist
    pub fn collect_subscriptions(
        &self,
        subscriptions: &mut [Subscription],
        period: BillingPeriod,
    ) -> Result<Order> {
        let first = subscriptions.first().ok_or_else(|| {
            BillingError::InvalidInput("cannot collect an empty set of subscriptions".into())
        })?;
        let key = OrderGroupKey::of(first);
        let currency = if first.currency.is_empty() {
            self.config.currency.default_code.clone()
        } else {
            first.currency.clone()
        };
        if subscriptions.iter().any(|subscription| OrderGroupKey::of(subscription) != key) {
            return Err(BillingError::InvalidInput(
                "subscriptions must share store, customer, billing schedule and payment method"
                    .into(),
            ));
        }

        let schedule = self.store.schedule(&key.billing_schedule)?;
        let mut order = match self.store.find_draft_order(&key, &period)? {
            Some(order) => order,
            None => Order::new_recurring(&key, period, currency),
        };
        self.apply_payment_method(&mut order, key.payment_method.as_deref())?;

        for subscription in subscriptions.iter_mut() {
            self.apply_charges(&mut order, subscription, &schedule)?;
            subscription.add_order(order.id);
            self.store.save_subscription(subscription)?;
        }
        self.store.save_order(&order)?;

        debug!(order_id = %order.id, items = order.items.len(), "subscriptions collected");
        Ok(order)
    }

    /// Re-derives a draft order's items from the current subscription data.
    ///
    /// Existing items are reused. If no subscription on the order still has a
    /// payment method, the order's billing profile, payment method and payment
    /// gateway are cleared. An order left with nothing to bill is canceled and
    /// emptied; that is not an error.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidOrderState`] unless the order is a draft
    /// - [`BillingError::NotFound`] if a referenced subscription or the schedule is gone
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub fn refresh_order(&self, order: &mut Order) -> Result<()> {
        ensure_draft(order)?;
        let schedule = self.order_schedule(order)?;

        let subscriptions = order
            .subscription_ids()
            .iter()
            .map(|id| self.store.subscription(id))
            .collect::<Result<Vec<_>>>()?;
        let payment_method =
            subscriptions.iter().find_map(|subscription| subscription.payment_method.clone());
        self.apply_payment_method(order, payment_method.as_deref())?;
        order.group_payment_method = payment_method;

        for subscription in &subscriptions {
            self.apply_charges(order, subscription, &schedule)?;
        }

        if order.has_items() {
            debug!(items = order.items.len(), total = %order.total(), "order refreshed");
            audit_log(
                &AuditEvent::new(AuditEventType::OrderRefreshed)
                    .with_order_id(order.id)
                    .with_amount(order.total()),
            );
        } else {
            order.state = OrderState::Canceled;
            info!("no charges remain, order canceled");
            audit_log(&AuditEvent::new(AuditEventType::OrderCanceled).with_order_id(order.id));
        }

        self.store.save_order(order)
    }

    /// Completes a draft order, capturing its total.
    ///
    /// A zero-total order completes without a capture, and so does an order whose
    /// completed payments already cover its total (a capture that succeeded while
    /// saving the order failed). On any failure the order is left unchanged in
    /// `Draft` and nothing is retried.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidOrderState`] unless the order is a draft
    /// - [`BillingError::Payment`] with `Payment method not found.` if the order's
    ///   payment method cannot be loaded, or the gateway's reason on a decline
    #[instrument(skip(self, order), fields(order_id = %order.id, total = %order.total()))]
    pub fn close_order(&self, order: &mut Order) -> Result<()> {
        ensure_draft(order)?;
        let correlation_id = Uuid::new_v4();
        let total = order.total();
        let mut closed = order.clone();

        let captured: Decimal = self
            .store
            .payments_for_order(&order.id)?
            .iter()
            .filter(|payment| payment.state == PaymentState::Completed)
            .map(|payment| payment.amount)
            .sum();

        if total.is_zero() {
            debug!("zero total, completing without capture");
        } else if captured >= total {
            info!(%captured, "order already paid, completing without capture");
        } else {
            let method = match order.payment_method.as_deref() {
                Some(id) => self.store.load_payment_method(id)?,
                None => None,
            };
            let Some(method) = method else {
                let error = BillingError::Payment("Payment method not found.".into());
                record_decline(order, total, &error, correlation_id);
                return Err(error);
            };

            let payment = match self.gateway.capture(&method, order, total) {
                Ok(payment) => payment,
                Err(error) => {
                    record_decline(order, total, &error, correlation_id);
                    return Err(error);
                }
            };
            self.store.save_payment(&payment)?;
            audit_log(
                &AuditEvent::new(AuditEventType::PaymentCaptured)
                    .with_correlation_id(correlation_id)
                    .with_order_id(order.id)
                    .with_amount(payment.amount),
            );
            closed.payment_gateway = Some(payment.gateway_id);
        }

        closed.state = OrderState::Completed;
        closed.completed_at = Some(Utc::now());
        self.store.save_order(&closed)?;
        *order = closed;

        info!("order closed");
        audit_log(
            &AuditEvent::new(AuditEventType::OrderClosed)
                .with_correlation_id(correlation_id)
                .with_order_id(order.id)
                .with_amount(total),
        );
        Ok(())
    }

    /// Generates the next-period order for the order's still-active subscriptions.
    ///
    /// Returns `None` when no subscription on the order is still active; callers
    /// must treat that as "nothing to renew". Renewed subscriptions get their
    /// renewal time set and record the new order. Subscriptions that no longer
    /// share a group (e.g. a changed payment method) are split across several
    /// orders; the first group's order is returned.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidInput`] if the order has no billing period or schedule
    /// - [`BillingError::NotFound`] if a referenced subscription or the schedule is gone
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub fn renew_order(&self, order: &Order) -> Result<Option<Order>> {
        let period = order_period(order)?;
        let mut active = Vec::new();
        for id in order.subscription_ids() {
            let subscription = self.store.subscription(&id)?;
            if subscription.is_renewable() {
                active.push(subscription);
            }
        }

        if active.is_empty() {
            info!("no active subscriptions, nothing to renew");
            audit_log(&AuditEvent::new(AuditEventType::RenewalSkipped).with_order_id(order.id));
            return Ok(None);
        }

        let schedule = self.order_schedule(order)?;
        let next_period = schedule.next_period(&period)?;
        let now = Utc::now();

        let mut renewed: Option<Order> = None;
        for (_, mut group) in partition_subscriptions(active) {
            for subscription in &mut group {
                subscription.mark_renewed(now);
            }
            let next = self.collect_subscriptions(&mut group, next_period)?;

            info!(next_order_id = %next.id, period = %next_period, "order renewed");
            audit_log(
                &AuditEvent::new(AuditEventType::OrderRenewed)
                    .with_order_id(next.id)
                    .with_amount(next.total()),
            );
            if renewed.is_none() {
                renewed = Some(next);
            }
        }

        Ok(renewed)
    }

    /// Copies billing profile, payment method and gateway from `method_id` onto
    /// the order, or clears them if the method is absent.
    fn apply_payment_method(&self, order: &mut Order, method_id: Option<&str>) -> Result<()> {
        let method = match method_id {
            Some(id) => self.store.load_payment_method(id)?,
            None => None,
        };
        match method {
            Some(method) => {
                order.payment_method = Some(method.id);
                order.payment_gateway = Some(method.gateway_id);
                order.billing_profile = method.billing_profile;
            }
            None => {
                order.payment_method = None;
                order.payment_gateway = None;
                order.billing_profile = None;
            }
        }
        Ok(())
    }

    /// Brings the subscription's item on `order` in line with its current charge.
    fn apply_charges(
        &self,
        order: &mut Order,
        subscription: &Subscription,
        schedule: &BillingSchedule,
    ) -> Result<()> {
        let period = order_period(order)?;
        let charge = self.charge_for(subscription, schedule, &period)?;

        let mut seen = false;
        order.items.retain(|item| {
            if item.subscription.as_ref() != Some(&subscription.id) {
                return true;
            }
            let keep = charge.is_some() && !seen;
            seen = true;
            keep
        });

        let Some(charge) = charge else {
            debug!(subscription_id = %subscription.id, "nothing to charge");
            return Ok(());
        };

        let position = order
            .items
            .iter()
            .position(|item| item.subscription.as_ref() == Some(&subscription.id));
        let item = match position {
            Some(index) => &mut order.items[index],
            None => {
                order.items.push(
                    OrderItem::new(
                        subscription.title.clone(),
                        subscription.quantity,
                        charge.unit_price,
                    )
                    .with_subscription(subscription.id.clone()),
                );
                let last = order.items.len() - 1;
                &mut order.items[last]
            }
        };

        item.title.clone_from(&subscription.title);
        item.quantity = subscription.quantity;
        item.unit_price = charge.unit_price;
        item.billing_period = Some(charge.period);
        item.purchased_entity.clone_from(&subscription.purchased_entity);
        Ok(())
    }

    /// Computes the charge `subscription` contributes to an order covering `period`.
    fn charge_for(
        &self,
        subscription: &Subscription,
        schedule: &BillingSchedule,
        period: &BillingPeriod,
    ) -> Result<Option<Charge>> {
        let window: Option<(DateTime<Utc>, DateTime<Utc>)> =
            match (subscription.state, schedule.billing_type) {
                (SubscriptionState::Trial, _) => {
                    let trial = trial_window(subscription, schedule)?;
                    return Ok(trial
                        .intersect(period)
                        .map(|covered| Charge { period: covered, unit_price: Decimal::ZERO }));
                }
                (SubscriptionState::Active, _) => {
                    let starts = subscription.starts.ok_or_else(|| missing_start(subscription))?;
                    Some((starts, period.end()))
                }
                (SubscriptionState::Canceled, BillingType::Postpaid) => subscription
                    .starts
                    .map(|starts| (starts, subscription.ends.unwrap_or_else(|| period.end()))),
                _ => None,
            };

        let Some((from, until)) = window else {
            return Ok(None);
        };
        let Ok(covered) = BillingPeriod::new(from.max(period.start()), until.min(period.end()))
        else {
            return Ok(None);
        };

        let unit_price = self.engine.prorate(subscription.unit_price, period, &covered)?;
        Ok(Some(Charge { period: covered, unit_price }))
    }

    fn order_schedule(&self, order: &Order) -> Result<BillingSchedule> {
        let id = order.billing_schedule.as_ref().ok_or_else(|| {
            BillingError::InvalidInput(format!("order {} has no billing schedule", order.id))
        })?;
        self.store.schedule(id)
    }
}

fn record_decline(order: &Order, total: Decimal, error: &BillingError, correlation_id: Uuid) {
    warn!(error = %error, "payment capture failed, order left open");
    audit_log(
        &AuditEvent::new(AuditEventType::PaymentDeclined)
            .with_correlation_id(correlation_id)
            .with_order_id(order.id)
            .with_amount(total)
            .with_error(error.to_string()),
    );
}

fn ensure_draft(order: &Order) -> Result<()> {
    if order.is_draft() {
        return Ok(());
    }
    Err(BillingError::InvalidOrderState {
        order_id: order.id.to_string(),
        state: order.state.as_str().to_owned(),
    })
}

fn order_period(order: &Order) -> Result<BillingPeriod> {
    order.billing_period.ok_or_else(|| {
        BillingError::InvalidInput(format!("order {} has no billing period", order.id))
    })
}

fn missing_start(subscription: &Subscription) -> BillingError {
    BillingError::InvalidInput(format!("subscription {} has no start instant", subscription.id))
}

/// The recorded trial window, or one computed from the schedule if the trial end
/// was never recorded.
fn trial_window(subscription: &Subscription, schedule: &BillingSchedule) -> Result<BillingPeriod> {
    let starts = subscription.trial_starts.ok_or_else(|| {
        BillingError::InvalidInput(format!("subscription {} has no trial start", subscription.id))
    })?;
    match subscription.trial_ends {
        Some(ends) => BillingPeriod::new(starts, ends),
        None => schedule.trial_period(starts),
    }
}
