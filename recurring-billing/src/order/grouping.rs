//! Grouping subscriptions into recurring orders.
//!
//! Subscriptions that share a store, customer, billing schedule and payment method
//! are invoiced together on one order per billing period.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::models::{Order, OrderId, OrderState, OrderType};
use crate::{period::BillingPeriod, schedule::ScheduleId, subscription::Subscription};

/// Key under which subscriptions share a recurring order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderGroupKey {
    /// Store reference.
    pub store_id: String,
    /// Customer reference.
    pub customer_id: String,
    /// Billing schedule.
    pub billing_schedule: ScheduleId,
    /// Payment method reference.
    pub payment_method: Option<String>,
}

impl OrderGroupKey {
    /// Builds the key for `subscription`.
    #[must_use]
    pub fn of(subscription: &Subscription) -> Self {
        Self {
            store_id: subscription.store_id.clone(),
            customer_id: subscription.customer_id.clone(),
            billing_schedule: subscription.billing_schedule.clone(),
            payment_method: subscription.payment_method.clone(),
        }
    }

    /// Checks whether `order` is a recurring order for this key.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        order.order_type == OrderType::Recurring
            && order.store_id == self.store_id
            && order.customer_id == self.customer_id
            && order.billing_schedule.as_ref() == Some(&self.billing_schedule)
            && order.group_payment_method == self.payment_method
    }
}

/// Groups subscriptions by [`OrderGroupKey`], in key order.
#[must_use]
pub fn partition_subscriptions(
    subscriptions: Vec<Subscription>,
) -> BTreeMap<OrderGroupKey, Vec<Subscription>> {
    let mut groups: BTreeMap<OrderGroupKey, Vec<Subscription>> = BTreeMap::new();
    for subscription in subscriptions {
        groups.entry(OrderGroupKey::of(&subscription)).or_default().push(subscription);
    }
    groups
}

impl Order {
    /// Creates an empty draft recurring order for `key` covering `period`.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new_recurring(
        key: &OrderGroupKey,
        period: BillingPeriod,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            order_type: OrderType::Recurring,
            state: OrderState::Draft,
            store_id: key.store_id.clone(),
            customer_id: key.customer_id.clone(),
            billing_schedule: Some(key.billing_schedule.clone()),
            billing_period: Some(period),
            payment_method: key.payment_method.clone(),
            group_payment_method: key.payment_method.clone(),
            payment_gateway: None,
            billing_profile: None,
            currency: currency.into(),
            items: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    use super::*;
    use crate::subscription::SubscriptionId;

    fn subscription(id: &str, customer: &str, payment_method: Option<&str>) -> Subscription {
        let mut sub = Subscription::new(
            SubscriptionId::new(id).unwrap(),
            ScheduleId::new("test_id").unwrap(),
            Decimal::ONE,
            "USD",
        )
        .with_owner("store-1", customer);
        sub.payment_method = payment_method.map(str::to_owned);
        sub
    }

    #[test]
    fn test_partition_groups_by_customer_and_payment_method() {
        let groups = partition_subscriptions(vec![
            subscription("a", "alice", Some("card-1")),
            subscription("b", "bob", Some("card-2")),
            subscription("c", "alice", Some("card-1")),
            subscription("d", "alice", None),
        ]);

        assert_eq!(groups.len(), 3);
        let alice = OrderGroupKey::of(&subscription("x", "alice", Some("card-1")));
        let ids: Vec<&str> = groups[&alice].iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_partition_order_is_deterministic() {
        let groups = partition_subscriptions(vec![
            subscription("b", "bob", None),
            subscription("a", "alice", None),
        ]);
        let customers: Vec<&str> = groups.keys().map(|k| k.customer_id.as_str()).collect();
        assert_eq!(customers, vec!["alice", "bob"]);
    }

    #[test]
    fn test_new_recurring_order_matches_key() {
        let key = OrderGroupKey::of(&subscription("a", "alice", Some("card-1")));
        let start = Utc.with_ymd_and_hms(2017, 2, 24, 17, 0, 0).unwrap();
        let period = BillingPeriod::new(start, start + Duration::hours(1)).unwrap();

        let order = Order::new_recurring(&key, period, "USD");
        assert!(key.matches(&order));
        assert_eq!(order.billing_period, Some(period));
        assert!(!key.matches(&Order::new("store-1", "alice", "USD")));
    }

    #[test]
    fn test_key_matches_after_payment_method_is_cleared() {
        let key = OrderGroupKey::of(&subscription("a", "alice", Some("card-1")));
        let start = Utc.with_ymd_and_hms(2017, 2, 24, 17, 0, 0).unwrap();
        let period = BillingPeriod::new(start, start + Duration::hours(1)).unwrap();

        let mut order = Order::new_recurring(&key, period, "USD");
        order.payment_method = None;
        assert!(key.matches(&order));
    }
}
