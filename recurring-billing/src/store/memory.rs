//! In-memory entity store.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};

use super::EntityStore;
use crate::{
    error::{BillingError, Result},
    order::{Order, OrderGroupKey, OrderId, OrderState, OrderType},
    payment::{Payment, PaymentMethod},
    period::BillingPeriod,
    schedule::{BillingSchedule, ScheduleId},
    subscription::{Subscription, SubscriptionId},
};

/// Hash-map backed [`EntityStore`].
///
/// Clones share the same data.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    schedules: RwLock<HashMap<ScheduleId, BillingSchedule>>,
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    payment_methods: RwLock<HashMap<String, PaymentMethod>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    payments: RwLock<Vec<Payment>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|e| BillingError::Storage(format!("lock poisoned: {e}")))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|e| BillingError::Storage(format!("lock poisoned: {e}")))
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored order.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Storage`] if a lock is poisoned.
    pub fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(read(&self.inner.orders)?.values().cloned().collect())
    }
}

impl EntityStore for InMemoryStore {
    fn load_schedule(&self, id: &ScheduleId) -> Result<Option<BillingSchedule>> {
        Ok(read(&self.inner.schedules)?.get(id).cloned())
    }

    fn save_schedule(&self, schedule: &BillingSchedule) -> Result<()> {
        write(&self.inner.schedules)?.insert(schedule.id.clone(), schedule.clone());
        Ok(())
    }

    fn load_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>> {
        Ok(read(&self.inner.subscriptions)?.get(id).cloned())
    }

    fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        write(&self.inner.subscriptions)?.insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    fn load_payment_method(&self, id: &str) -> Result<Option<PaymentMethod>> {
        Ok(read(&self.inner.payment_methods)?.get(id).cloned())
    }

    fn save_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        write(&self.inner.payment_methods)?.insert(method.id.clone(), method.clone());
        Ok(())
    }

    fn delete_payment_method(&self, id: &str) -> Result<()> {
        write(&self.inner.payment_methods)?.remove(id);
        Ok(())
    }

    fn load_order(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(read(&self.inner.orders)?.get(id).cloned())
    }

    fn save_order(&self, order: &Order) -> Result<()> {
        write(&self.inner.orders)?.insert(order.id, order.clone());
        Ok(())
    }

    fn find_draft_order(
        &self,
        key: &OrderGroupKey,
        period: &BillingPeriod,
    ) -> Result<Option<Order>> {
        let orders = read(&self.inner.orders)?;
        let found = orders
            .values()
            .filter(|order| {
                order.is_draft() && key.matches(order) && order.billing_period.as_ref() == Some(period)
            })
            .min_by_key(|order| order.created_at)
            .cloned();
        Ok(found)
    }

    fn draft_recurring_orders_ending_by(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        let orders = read(&self.inner.orders)?;
        let mut due: Vec<Order> = orders
            .values()
            .filter(|order| {
                order.order_type == OrderType::Recurring
                    && order.state == OrderState::Draft
                    && order.billing_period.is_some_and(|period| period.end() <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|order| (order.billing_period.map(|period| period.end()), order.created_at));
        due.truncate(limit);
        Ok(due)
    }

    fn save_payment(&self, payment: &Payment) -> Result<()> {
        let mut payments = write(&self.inner.payments)?;
        payments.retain(|existing| existing.id != payment.id);
        payments.push(payment.clone());
        Ok(())
    }

    fn payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>> {
        Ok(read(&self.inner.payments)?
            .iter()
            .filter(|payment| &payment.order_id == order_id)
            .cloned()
            .collect())
    }
}
