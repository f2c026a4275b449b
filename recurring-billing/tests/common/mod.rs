//! Shared fixtures for integration tests.
//!
//! Mirrors a typical store setup: an hourly fixed postpaid schedule, a card payment
//! method and two subscriptions for the same customer, one in trial and one active,
//! both starting at 2017-02-24 17:30:00 UTC.

#![allow(dead_code, reason = "not every test binary uses every fixture")]

use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, TimeZone, Utc};
use recurring_billing::{
    BillingError, Result,
    order::{Order, OrderGroupKey, OrderId},
    payment::{Payment, PaymentGateway, PaymentMethod},
    period::BillingPeriod,
    schedule::{BillingSchedule, BillingType, Interval, IntervalUnit, ScheduleId, SchedulePlugin},
    store::{EntityStore, InMemoryStore},
    subscription::{Subscription, SubscriptionId, SubscriptionState},
};
use rust_decimal::Decimal;

pub const SCHEDULE_ID: &str = "test_id";
pub const STORE_ID: &str = "store-1";
pub const CUSTOMER_ID: &str = "customer-1";
pub const PAYMENT_METHOD_ID: &str = "card-1";
pub const GATEWAY_ID: &str = "example";
pub const BILLING_PROFILE_ID: &str = "profile-1";
pub const VARIATION_ID: &str = "variation-1";

/// 2017-02-24 17:30:00 UTC, half way through an hourly period.
pub fn starts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 2, 24, 17, 30, 0).unwrap()
}

pub fn schedule_id() -> ScheduleId {
    ScheduleId::new(SCHEDULE_ID).unwrap()
}

/// Hourly fixed schedule with a one-hour trial.
pub fn schedule(billing_type: BillingType) -> BillingSchedule {
    BillingSchedule::new(
        schedule_id(),
        "Hourly schedule",
        SchedulePlugin::Fixed,
        billing_type,
        Interval::new(1, IntervalUnit::Hour).unwrap(),
    )
    .with_trial_interval(Interval::new(1, IntervalUnit::Hour).unwrap())
}

pub fn payment_method() -> PaymentMethod {
    PaymentMethod::new(PAYMENT_METHOD_ID, GATEWAY_ID).with_billing_profile(BILLING_PROFILE_ID)
}

fn subscription(id: &str, state: SubscriptionState) -> Subscription {
    let mut subscription = Subscription::new(
        SubscriptionId::new(id).unwrap(),
        schedule_id(),
        Decimal::from(2),
        "USD",
    )
    .with_owner(STORE_ID, CUSTOMER_ID)
    .with_title("Test variation")
    .with_quantity(Decimal::from(2))
    .with_payment_method(PAYMENT_METHOD_ID)
    .with_state(state);
    subscription.purchased_entity = Some(VARIATION_ID.to_owned());
    subscription
}

/// Store seeded with the schedule, the payment method and both subscriptions.
pub struct Fixture {
    pub store: InMemoryStore,
    pub trial: Subscription,
    pub active: Subscription,
}

impl Fixture {
    pub fn new(billing_type: BillingType) -> Self {
        let store = InMemoryStore::new();
        store.save_schedule(&schedule(billing_type)).unwrap();
        store.save_payment_method(&payment_method()).unwrap();

        let trial = subscription("trial-1", SubscriptionState::Trial).with_trial_starts(starts());
        let active = subscription("active-1", SubscriptionState::Active).with_starts(starts());
        store.save_subscription(&trial).unwrap();
        store.save_subscription(&active).unwrap();

        Self { store, trial, active }
    }

    /// Replaces the stored schedule.
    pub fn update_schedule(&self, update: impl FnOnce(&mut BillingSchedule)) {
        let mut schedule = self.store.schedule(&schedule_id()).unwrap();
        update(&mut schedule);
        self.store.save_schedule(&schedule).unwrap();
    }

    /// Reloads a subscription from the store.
    pub fn reload(&self, subscription: &Subscription) -> Subscription {
        self.store.subscription(&subscription.id).unwrap()
    }
}

/// Gateway that approves every capture and remembers the amounts.
#[derive(Debug, Default)]
pub struct ApprovingGateway {
    pub captured: Mutex<Vec<Decimal>>,
}

impl PaymentGateway for ApprovingGateway {
    fn capture(&self, method: &PaymentMethod, order: &Order, amount: Decimal) -> Result<Payment> {
        self.captured.lock().unwrap().push(amount);
        Ok(Payment::completed(method, order, amount))
    }
}

/// Gateway that declines every capture.
#[derive(Debug, Default)]
pub struct DecliningGateway;

impl PaymentGateway for DecliningGateway {
    fn capture(&self, _method: &PaymentMethod, _order: &Order, _amount: Decimal) -> Result<Payment> {
        Err(BillingError::Payment("Card 4111 1111 1111 1111 was declined.".into()))
    }
}

/// Store whose next order save fails once [`fail_next_order_save`] is called.
///
/// [`fail_next_order_save`]: FlakyStore::fail_next_order_save
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    fail_order_save: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self { inner, fail_order_save: AtomicBool::new(false) }
    }

    pub fn fail_next_order_save(&self) {
        self.fail_order_save.store(true, Ordering::SeqCst);
    }
}

impl EntityStore for FlakyStore {
    fn load_schedule(&self, id: &ScheduleId) -> Result<Option<BillingSchedule>> {
        self.inner.load_schedule(id)
    }

    fn save_schedule(&self, schedule: &BillingSchedule) -> Result<()> {
        self.inner.save_schedule(schedule)
    }

    fn load_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>> {
        self.inner.load_subscription(id)
    }

    fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.inner.save_subscription(subscription)
    }

    fn load_payment_method(&self, id: &str) -> Result<Option<PaymentMethod>> {
        self.inner.load_payment_method(id)
    }

    fn save_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        self.inner.save_payment_method(method)
    }

    fn delete_payment_method(&self, id: &str) -> Result<()> {
        self.inner.delete_payment_method(id)
    }

    fn load_order(&self, id: &OrderId) -> Result<Option<Order>> {
        self.inner.load_order(id)
    }

    fn save_order(&self, order: &Order) -> Result<()> {
        if self.fail_order_save.swap(false, Ordering::SeqCst) {
            return Err(BillingError::Storage("connection reset".into()));
        }
        self.inner.save_order(order)
    }

    fn find_draft_order(
        &self,
        key: &OrderGroupKey,
        period: &BillingPeriod,
    ) -> Result<Option<Order>> {
        self.inner.find_draft_order(key, period)
    }

    fn draft_recurring_orders_ending_by(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        self.inner.draft_recurring_orders_ending_by(now, limit)
    }

    fn save_payment(&self, payment: &Payment) -> Result<()> {
        self.inner.save_payment(payment)
    }

    fn payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>> {
        self.inner.payments_for_order(order_id)
    }
}
