//! Audit logging for billing events.
//!
//! Every state change that moves money or changes what a customer will be billed
//! is recorded as a structured event on the `audit` tracing target, with a
//! correlation ID and redacted error text.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum number of digits in a run that is masked by [`redact_sensitive`].
const MIN_REDACTED_DIGITS: usize = 12;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Trial order generated.
    TrialStarted,
    /// First paid recurring order generated.
    RecurringStarted,
    /// Recurring order items re-derived.
    OrderRefreshed,
    /// Recurring order canceled because nothing was left to bill.
    OrderCanceled,
    /// Recurring order completed.
    OrderClosed,
    /// Payment captured for an order.
    PaymentCaptured,
    /// Payment capture failed or no payment method was found.
    PaymentDeclined,
    /// Next-cycle order generated.
    OrderRenewed,
    /// Renewal requested but no subscription was still active.
    RenewalSkipped,
    /// Initial purchase item adjusted.
    InitialOrderProcessed,
}

/// Contextual details for an audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Order the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Subscription the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    /// Amount charged, adjusted or captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Error message (sensitive data redacted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use recurring_billing::audit::{AuditEvent, AuditEventType, audit_log};
/// use rust_decimal::Decimal;
///
/// let event = AuditEvent::new(AuditEventType::PaymentCaptured)
///     .with_order_id("3f1c0a52-5a8e-4a4e-9d0e-1f2b3c4d5e6f")
///     .with_amount(Decimal::new(400, 2));
///
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub event_type: AuditEventType,
    /// Correlation ID for tracking one operation across entries.
    pub correlation_id: Uuid,
    /// Event details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates an event with a fresh correlation ID.
    #[must_use]
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            correlation_id: Uuid::new_v4(),
            details: AuditDetails::default(),
        }
    }

    /// Reuses an existing correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Adds the order ID.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl ToString accepts both ID newtypes and plain strings"
    )]
    pub fn with_order_id(mut self, id: impl ToString) -> Self {
        self.details.order_id = Some(id.to_string());
        self
    }

    /// Adds the subscription ID.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl ToString accepts both ID newtypes and plain strings"
    )]
    pub fn with_subscription_id(mut self, id: impl ToString) -> Self {
        self.details.subscription_id = Some(id.to_string());
        self
    }

    /// Adds an amount.
    #[must_use]
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.details.amount = Some(amount);
        self
    }

    /// Adds an error message, redacting sensitive data.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.details.error = Some(redact_sensitive(&error.into()));
        self
    }
}

/// Logs an audit event to tracing with target "audit".
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = %event.timestamp.to_rfc3339(),
        event_type = ?event.event_type,
        correlation_id = %event.correlation_id,
        details = ?event.details,
        "AUDIT"
    );
}

/// Masks long digit runs, such as card numbers, in `input`.
///
/// A run is a sequence of digits optionally separated by single spaces or hyphens.
/// Runs with at least twelve digits have every digit replaced by `X`; separators
/// are kept.
///
/// # Examples
///
/// ```
/// use recurring_billing::audit::redact_sensitive;
///
/// let redacted = redact_sensitive("Card 4111-1111-1111-1111 was declined");
/// assert_eq!(redacted, "Card XXXX-XXXX-XXXX-XXXX was declined");
/// assert_eq!(redact_sensitive("Order total 1250"), "Order total 1250");
/// ```
#[must_use]
pub fn redact_sensitive(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            output.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        let mut digits = 0;
        while end < chars.len() {
            if chars[end].is_ascii_digit() {
                digits += 1;
                end += 1;
            } else if matches!(chars[end], '-' | ' ')
                && chars.get(end + 1).is_some_and(char::is_ascii_digit)
            {
                end += 1;
            } else {
                break;
            }
        }

        let masked = digits >= MIN_REDACTED_DIGITS;
        for &c in &chars[start..end] {
            output.push(if masked && c.is_ascii_digit() { 'X' } else { c });
        }
        i = end;
    }

    output
}
