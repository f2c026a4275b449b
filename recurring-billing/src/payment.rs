//! Payment methods, payments and the gateway seam.
//!
//! Capturing money is delegated to a [`PaymentGateway`] implementation. The crate
//! ships none: gateways are external collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::Result,
    order::{Order, OrderId},
};

/// A stored payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Payment method reference.
    pub id: String,
    /// Gateway that can charge this method.
    pub gateway_id: String,
    /// Billing profile attached to the method.
    pub billing_profile: Option<String>,
}

impl PaymentMethod {
    /// Creates a payment method without a billing profile.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(id: impl Into<String>, gateway_id: impl Into<String>) -> Self {
        Self { id: id.into(), gateway_id: gateway_id.into(), billing_profile: None }
    }

    /// Sets the billing profile.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_billing_profile(mut self, billing_profile: impl Into<String>) -> Self {
        self.billing_profile = Some(billing_profile.into());
        self
    }
}

/// Unique identifier for a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Generates a new random payment ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Created, not yet captured.
    New,
    /// Funds captured.
    Completed,
}

/// A payment recorded against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment identifier.
    pub id: PaymentId,
    /// Payment state.
    pub state: PaymentState,
    /// Gateway that processed the payment.
    pub gateway_id: String,
    /// Payment method charged.
    pub payment_method: String,
    /// Order paid for.
    pub order_id: OrderId,
    /// Amount captured.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Capture timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a completed payment of `order`'s total against `method`.
    ///
    /// Gateways call this once the capture succeeded.
    #[must_use]
    pub fn completed(method: &PaymentMethod, order: &Order, amount: Decimal) -> Self {
        Self {
            id: PaymentId::new(),
            state: PaymentState::Completed,
            gateway_id: method.gateway_id.clone(),
            payment_method: method.id.clone(),
            order_id: order.id,
            amount,
            currency: order.currency.clone(),
            completed_at: Some(Utc::now()),
        }
    }
}

/// Captures payments.
///
/// Implementations perform one blocking capture per call and never retry. A
/// declined or failed capture is reported as [`BillingError::Payment`] carrying
/// the gateway's reason.
///
/// [`BillingError::Payment`]: crate::error::BillingError::Payment
pub trait PaymentGateway: Send + Sync {
    /// Captures `amount` from `method` for `order`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Payment`](crate::error::BillingError::Payment) if the
    /// capture was declined or the gateway is unreachable.
    fn capture(&self, method: &PaymentMethod, order: &Order, amount: Decimal) -> Result<Payment>;
}
