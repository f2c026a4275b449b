//! Order data models.
//!
//! Prices follow a simple model: an item's `total_price` is `unit_price × quantity`
//! and its adjusted total adds every adjustment on top. Adjustments never modify
//! the unit price, so the original price stays visible for audit.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{period::BillingPeriod, schedule::ScheduleId, subscription::SubscriptionId};

/// Unique identifier for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Generates a new random order ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for an order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItemId(Uuid);

impl OrderItemId {
    /// Generates a new random order item ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Checkout order placed by the customer, e.g. the initial purchase.
    #[default]
    Default,
    /// Order generated for one billing cycle.
    Recurring,
}

/// Order workflow state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Open; items may still change.
    #[default]
    Draft,
    /// Closed and paid.
    Completed,
    /// Closed without payment.
    Canceled,
}

impl OrderState {
    /// Returns the machine name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

/// Kind of price adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Subscription proration, trial or deferral adjustment.
    Subscription,
}

/// A signed change to an order item's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Adjustment kind.
    #[serde(rename = "type")]
    pub adjustment_type: AdjustmentType,
    /// Human-readable label, e.g. "Proration".
    pub label: String,
    /// Signed amount added to the item total.
    pub amount: Decimal,
}

impl Adjustment {
    /// Creates a subscription adjustment.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn subscription(label: impl Into<String>, amount: Decimal) -> Self {
        Self { adjustment_type: AdjustmentType::Subscription, label: label.into(), amount }
    }
}

/// A line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Unique item identifier.
    pub id: OrderItemId,
    /// Display title.
    pub title: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Price of one unit (already prorated on recurring items).
    pub unit_price: Decimal,
    /// Period this item covers; may be shorter than the order's period.
    pub billing_period: Option<BillingPeriod>,
    /// Subscription that produced this item.
    pub subscription: Option<SubscriptionId>,
    /// Purchased entity reference.
    pub purchased_entity: Option<String>,
    /// Price adjustments.
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
}

impl OrderItem {
    /// Creates an item with no period, subscription or adjustments.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(title: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            id: OrderItemId::new(),
            title: title.into(),
            quantity,
            unit_price,
            billing_period: None,
            subscription: None,
            purchased_entity: None,
            adjustments: Vec::new(),
        }
    }

    /// Links the item to the subscription it bills for.
    #[must_use]
    pub fn with_subscription(mut self, subscription: SubscriptionId) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.unit_price * self.quantity
    }

    /// Total price plus all adjustments.
    #[must_use]
    pub fn adjusted_total_price(&self) -> Decimal {
        self.total_price() + self.adjustments.iter().map(|a| a.amount).sum::<Decimal>()
    }

    /// Adjusted total divided by quantity; zero for a zero quantity.
    #[must_use]
    pub fn adjusted_unit_price(&self) -> Decimal {
        if self.quantity.is_zero() {
            return Decimal::ZERO;
        }
        self.adjusted_total_price() / self.quantity
    }

    /// Checks whether an adjustment of `adjustment_type` is present.
    #[must_use]
    pub fn has_adjustment(&self, adjustment_type: AdjustmentType) -> bool {
        self.adjustments.iter().any(|a| a.adjustment_type == adjustment_type)
    }

    /// Appends an adjustment.
    pub fn add_adjustment(&mut self, adjustment: Adjustment) {
        self.adjustments.push(adjustment);
    }
}

/// An order: the checkout order or one billing cycle's invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Checkout or recurring.
    pub order_type: OrderType,
    /// Workflow state.
    pub state: OrderState,
    /// Owning store.
    pub store_id: String,
    /// Customer reference.
    pub customer_id: String,
    /// Billing schedule, for recurring orders.
    pub billing_schedule: Option<ScheduleId>,
    /// Nominal billing period, for recurring orders.
    pub billing_period: Option<BillingPeriod>,
    /// Payment method reference, cleared when the method no longer resolves.
    pub payment_method: Option<String>,
    /// Payment method reference the order is grouped under. Unlike
    /// `payment_method` it is kept when the method itself is deleted.
    #[serde(default)]
    pub group_payment_method: Option<String>,
    /// Payment gateway reference.
    pub payment_gateway: Option<String>,
    /// Billing profile reference.
    pub billing_profile: Option<String>,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Line items.
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when the order reaches `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates an empty draft checkout order.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(
        store_id: impl Into<String>,
        customer_id: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            order_type: OrderType::Default,
            state: OrderState::Draft,
            store_id: store_id.into(),
            customer_id: customer_id.into(),
            billing_schedule: None,
            billing_period: None,
            payment_method: None,
            group_payment_method: None,
            payment_gateway: None,
            billing_profile: None,
            currency: currency.into(),
            items: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Sum of item totals before adjustments.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(OrderItem::total_price).sum()
    }

    /// Sum of adjusted item totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(OrderItem::adjusted_total_price).sum()
    }

    /// Checks whether the order has any items.
    #[must_use]
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Checks whether the order is still open.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.state == OrderState::Draft
    }

    /// Returns the item billing `subscription`, if any.
    #[must_use]
    pub fn item_for(&self, subscription: &SubscriptionId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.subscription.as_ref() == Some(subscription))
    }

    /// Subscription IDs referenced by the items, in item order, without duplicates.
    #[must_use]
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<SubscriptionId> = Vec::new();
        for id in self.items.iter().filter_map(|item| item.subscription.as_ref()) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, unit_price: Decimal) -> OrderItem {
        OrderItem::new("Subscription", Decimal::from(quantity), unit_price)
    }

    // ========================================================================
    // Item Price Tests
    // ========================================================================

    #[test]
    fn test_item_totals() {
        let mut item = item(2, Decimal::from(2));
        assert_eq!(item.total_price(), Decimal::from(4));
        assert_eq!(item.adjusted_total_price(), Decimal::from(4));

        item.add_adjustment(Adjustment::subscription("Proration", Decimal::from(-2)));
        assert_eq!(item.total_price(), Decimal::from(4));
        assert_eq!(item.adjusted_total_price(), Decimal::from(2));
        assert_eq!(item.adjusted_unit_price(), Decimal::ONE);
        assert!(item.has_adjustment(AdjustmentType::Subscription));
    }

    #[test]
    fn test_zero_quantity_unit_price() {
        let item = item(0, Decimal::from(5));
        assert_eq!(item.adjusted_unit_price(), Decimal::ZERO);
    }

    // ========================================================================
    // Order Tests
    // ========================================================================

    #[test]
    fn test_order_subtotal_and_total() {
        let mut order = Order::new("store", "customer", "USD");
        assert!(!order.has_items());
        assert_eq!(order.total(), Decimal::ZERO);

        let mut first = item(2, Decimal::from(2));
        first.add_adjustment(Adjustment::subscription("Pay later", Decimal::from(-4)));
        order.items.push(first);
        order.items.push(item(1, Decimal::new(150, 2)));

        assert_eq!(order.subtotal(), Decimal::new(550, 2));
        assert_eq!(order.total(), Decimal::new(150, 2));
        assert!(order.is_draft());
    }

    #[test]
    fn test_subscription_lookup() {
        let sub = SubscriptionId::new("sub-1").unwrap();
        let mut order = Order::new("store", "customer", "USD");
        order.items.push(item(1, Decimal::ONE).with_subscription(sub.clone()));
        order.items.push(item(1, Decimal::ONE));

        assert!(order.item_for(&sub).is_some());
        assert!(order.item_for(&SubscriptionId::new("sub-2").unwrap()).is_none());
        assert_eq!(order.subscription_ids(), vec![sub]);
    }

    #[test]
    fn test_adjustment_serializes_type_field() {
        let json = serde_json::to_value(Adjustment::subscription("Proration", Decimal::ONE)).unwrap();
        assert_eq!(json["type"], "subscription");
        assert_eq!(json["label"], "Proration");
    }
}
