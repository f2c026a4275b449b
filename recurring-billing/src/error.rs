//! Error types for recurring billing.
//!
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **State Errors** ([`BillingError::InvalidState`], [`BillingError::InvalidOrderState`]):
//!   an operation was called on a subscription or order in the wrong state
//! - **Schedule Errors** ([`BillingError::Configuration`]): the billing schedule lacks data
//!   the operation needs
//! - **Range Errors** ([`BillingError::InvalidRange`]): malformed or non-nested billing periods
//! - **Payment Errors** ([`BillingError::Payment`]): capture failed or no payment method
//! - **Storage Errors** ([`BillingError::NotFound`], [`BillingError::Storage`]): entity store
//!   failures
//!
//! "No renewal" and "order canceled on refresh" are not errors. Those outcomes are reported
//! through return values.
//!
//! # Examples
//!
//! ```
//! use recurring_billing::error::BillingError;
//!
//! let err = BillingError::InvalidState { state: "active".to_owned() };
//! assert_eq!(err.to_string(), "Unexpected subscription state \"active\".");
//! ```

use thiserror::Error;

/// Result type alias for billing operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur while computing periods or driving recurring orders.
///
/// # Error Recovery
///
/// - **Caller bugs** ([`InvalidState`](Self::InvalidState),
///   [`InvalidInput`](Self::InvalidInput)): not recoverable, fix the calling code
/// - **Schedule problems** ([`Configuration`](Self::Configuration)): correct the schedule
/// - **Calculator bugs** ([`InvalidRange`](Self::InvalidRange)): fatal
/// - **Payment failures** ([`Payment`](Self::Payment)): the order stays open; the caller decides
///   whether and when to try again
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum BillingError {
    /// Illegal subscription state for the requested transition.
    ///
    /// The offending state is named in the message, e.g.
    /// `Unexpected subscription state "trial".`
    #[error("Unexpected subscription state \"{state}\".")]
    InvalidState {
        /// Machine name of the state the subscription was in.
        state: String,
    },

    /// Illegal order state for the requested operation.
    #[error("Unexpected state \"{state}\" for order {order_id}.")]
    InvalidOrderState {
        /// Order identifier.
        order_id: String,
        /// Machine name of the state the order was in.
        state: String,
    },

    /// Billing schedule is missing interval data required by the operation.
    ///
    /// # Recovery
    ///
    /// Correct the schedule, e.g. configure a trial interval before starting trials.
    #[error("{0}")]
    Configuration(String),

    /// A billing period is malformed or not contained in the period it is prorated against.
    ///
    /// Indicates a bug in period computation; retrying will not help.
    #[error("Invalid billing period range: {0}")]
    InvalidRange(String),

    /// Payment capture failed or no payment method could be resolved.
    ///
    /// The order is left in its prior state. Nothing is retried automatically.
    #[error("{0}")]
    Payment(String),

    /// Entity lookup failed.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. "subscription").
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// Entity store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Caller supplied invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Billing settings failed to parse or validate.
    #[error("Invalid billing settings: {0}")]
    InvalidSettings(String),

    /// Decimal overflow during price computation.
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
}

impl BillingError {
    /// Returns `true` for payment capture failures.
    ///
    /// The renewal sweep uses this to keep going after a decline.
    #[must_use]
    pub fn is_payment_failure(&self) -> bool {
        matches!(self, Self::Payment(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_names_state() {
        let error = BillingError::InvalidState { state: "active".into() };
        assert_eq!(error.to_string(), "Unexpected subscription state \"active\".");
    }

    #[test]
    fn test_configuration_message_is_verbatim() {
        let error =
            BillingError::Configuration("The billing schedule \"test_id\" does not allow trials.".into());
        assert_eq!(error.to_string(), "The billing schedule \"test_id\" does not allow trials.");
    }

    #[test]
    fn test_payment_error() {
        let error = BillingError::Payment("Payment method not found.".into());
        assert_eq!(error.to_string(), "Payment method not found.");
        assert!(error.is_payment_failure());
    }

    #[test]
    fn test_not_found_error() {
        let error = BillingError::NotFound { entity: "subscription", id: "sub-1".into() };
        assert_eq!(error.to_string(), "subscription not found: sub-1");
        assert!(!error.is_payment_failure());
    }
}
