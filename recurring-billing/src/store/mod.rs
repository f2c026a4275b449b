//! Entity storage seam.
//!
//! Persistence is an external collaborator. The manager only needs the operations
//! on [`EntityStore`]; [`InMemoryStore`] implements them over hash maps for tests
//! and embedding.
//!
//! Each call is one synchronous unit of work. The store does not serialize
//! concurrent writers to the same subscription or order: callers hold their own
//! per-entity lock around each manager operation.

mod memory;

use chrono::{DateTime, Utc};

pub use memory::InMemoryStore;

use crate::{
    error::{BillingError, Result},
    order::{Order, OrderGroupKey, OrderId},
    payment::{Payment, PaymentMethod},
    period::BillingPeriod,
    schedule::{BillingSchedule, ScheduleId},
    subscription::{Subscription, SubscriptionId},
};

/// Storage for schedules, subscriptions, payment methods, orders and payments.
pub trait EntityStore: Send + Sync {
    /// Loads a billing schedule.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn load_schedule(&self, id: &ScheduleId) -> Result<Option<BillingSchedule>>;

    /// Inserts or replaces a billing schedule.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn save_schedule(&self, schedule: &BillingSchedule) -> Result<()>;

    /// Loads a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn load_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>>;

    /// Inserts or replaces a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn save_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Loads a payment method.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn load_payment_method(&self, id: &str) -> Result<Option<PaymentMethod>>;

    /// Inserts or replaces a payment method.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn save_payment_method(&self, method: &PaymentMethod) -> Result<()>;

    /// Removes a payment method. Removing an unknown method is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn delete_payment_method(&self, id: &str) -> Result<()>;

    /// Loads an order.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn load_order(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Inserts or replaces an order.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn save_order(&self, order: &Order) -> Result<()>;

    /// Finds the draft recurring order for `key` covering exactly `period`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn find_draft_order(&self, key: &OrderGroupKey, period: &BillingPeriod)
    -> Result<Option<Order>>;

    /// Returns up to `limit` draft recurring orders whose period ended at or before
    /// `now`, oldest period first.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn draft_recurring_orders_ending_by(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Order>>;

    /// Records a payment.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn save_payment(&self, payment: &Payment) -> Result<()>;

    /// Returns all payments recorded for `order_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] on backend failure.
    fn payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>>;

    /// Loads a billing schedule that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::NotFound`] if it does not.
    fn schedule(&self, id: &ScheduleId) -> Result<BillingSchedule> {
        self.load_schedule(id)?
            .ok_or_else(|| BillingError::NotFound { entity: "billing schedule", id: id.to_string() })
    }

    /// Loads a subscription that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::NotFound`] if it does not.
    fn subscription(&self, id: &SubscriptionId) -> Result<Subscription> {
        self.load_subscription(id)?
            .ok_or_else(|| BillingError::NotFound { entity: "subscription", id: id.to_string() })
    }

    /// Loads an order that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::NotFound`] if it does not.
    fn order(&self, id: &OrderId) -> Result<Order> {
        self.load_order(id)?
            .ok_or_else(|| BillingError::NotFound { entity: "order", id: id.to_string() })
    }
}
