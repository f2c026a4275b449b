//! Subscription data models.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{BillingError, Result},
    order::OrderId,
    schedule::{ScheduleId, validate_id},
};

/// Unique identifier for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Creates a new subscription ID after validation.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidInput`] if the ID is empty, exceeds 64 characters,
    /// or contains characters other than alphanumerics, hyphens and underscores.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        validate_id("subscription_id", &id)?;
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubscriptionId {
    type Error = BillingError;

    fn try_from(id: String) -> Result<Self> {
        Self::new(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription lifecycle state.
///
/// ```text
/// Pending ···► Trial ──► Active ──► Canceled
///                │                     ▲
///                └─────────────────────┘
/// ```
///
/// `Pending` and `Expired` are managed outside this crate: they are never billed
/// and have no transitions here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Created but not yet started.
    #[default]
    Pending,
    /// In a free trial.
    Trial,
    /// Paid and billing.
    Active,
    /// Validity ended.
    Expired,
    /// Terminated by the customer or merchant.
    Canceled,
}

impl SubscriptionState {
    /// Returns the machine name used in error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer's subscription to a purchasable entity on a billing schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique subscription identifier.
    pub id: SubscriptionId,
    /// Store the subscription was purchased from.
    pub store_id: String,
    /// Customer reference.
    pub customer_id: String,
    /// Billing schedule the subscription follows.
    pub billing_schedule: ScheduleId,
    /// Payment method reference, if one is on file.
    pub payment_method: Option<String>,
    /// Purchased entity reference (product variation, plan, ...).
    pub purchased_entity: Option<String>,
    /// Title copied onto order items.
    pub title: String,
    /// Quantity; fractional quantities are allowed.
    pub quantity: Decimal,
    /// Price of one unit for one full billing period.
    pub unit_price: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Lifecycle state.
    #[serde(default)]
    pub state: SubscriptionState,
    /// Trial start instant.
    pub trial_starts: Option<DateTime<Utc>>,
    /// Trial end instant, set when the trial order is generated.
    pub trial_ends: Option<DateTime<Utc>>,
    /// Start of paid service.
    pub starts: Option<DateTime<Utc>>,
    /// End of service, set on cancellation.
    pub ends: Option<DateTime<Utc>>,
    /// Last time a renewal order was generated.
    pub renewed: Option<DateTime<Utc>>,
    /// Recurring orders generated for this subscription, oldest first.
    #[serde(default)]
    pub orders: Vec<OrderId>,
}

impl Subscription {
    /// Creates a pending subscription with quantity 1 and no payment method.
    ///
    /// Store, customer and title default to empty strings; set them directly or
    /// with the `with_*` helpers.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(
        id: SubscriptionId,
        billing_schedule: ScheduleId,
        unit_price: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id,
            store_id: String::new(),
            customer_id: String::new(),
            billing_schedule,
            payment_method: None,
            purchased_entity: None,
            title: String::new(),
            quantity: Decimal::ONE,
            unit_price,
            currency: currency.into(),
            state: SubscriptionState::Pending,
            trial_starts: None,
            trial_ends: None,
            starts: None,
            ends: None,
            renewed: None,
            orders: Vec::new(),
        }
    }

    /// Sets the owning store and customer.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_owner(mut self, store_id: impl Into<String>, customer_id: impl Into<String>) -> Self {
        self.store_id = store_id.into();
        self.customer_id = customer_id.into();
        self
    }

    /// Sets the title copied onto order items.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the payment method reference.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = Some(payment_method.into());
        self
    }

    /// Sets the lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: SubscriptionState) -> Self {
        self.state = state;
        self
    }

    /// Sets the trial start instant.
    #[must_use]
    pub fn with_trial_starts(mut self, trial_starts: DateTime<Utc>) -> Self {
        self.trial_starts = Some(trial_starts);
        self
    }

    /// Sets the paid service start instant.
    #[must_use]
    pub fn with_starts(mut self, starts: DateTime<Utc>) -> Self {
        self.starts = Some(starts);
        self
    }

    /// Checks whether `order_id` was generated for this subscription.
    #[must_use]
    pub fn has_order(&self, order_id: &OrderId) -> bool {
        self.orders.contains(order_id)
    }

    /// Records `order_id` as generated for this subscription. Adding twice is a no-op.
    pub fn add_order(&mut self, order_id: OrderId) {
        if !self.has_order(&order_id) {
            self.orders.push(order_id);
        }
    }
}
