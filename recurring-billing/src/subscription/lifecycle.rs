//! Subscription state transitions.
//!
//! Subscriptions are loaded from and saved to the entity store, so their state is a
//! runtime value rather than a type parameter. Every transition checks the current
//! state and fails with [`BillingError::InvalidState`] naming it.

use chrono::{DateTime, Utc};

use super::models::{Subscription, SubscriptionState};
use crate::error::{BillingError, Result};

fn unexpected(state: SubscriptionState) -> BillingError {
    BillingError::InvalidState { state: state.as_str().to_owned() }
}

impl Subscription {
    /// Checks that a trial order may be generated.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidState`] unless the subscription is in `Trial`.
    pub fn ensure_can_start_trial(&self) -> Result<()> {
        match self.state {
            SubscriptionState::Trial => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Checks that a paid recurring order may be generated.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidState`] unless the subscription is `Active`.
    pub fn ensure_can_start_recurring(&self) -> Result<()> {
        match self.state {
            SubscriptionState::Active => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Only active subscriptions are carried into the next cycle.
    #[must_use]
    pub fn is_renewable(&self) -> bool {
        self.state == SubscriptionState::Active
    }

    /// Checks whether the trial has run out by `now`.
    #[must_use]
    pub fn is_trial_finished(&self, now: DateTime<Utc>) -> bool {
        self.state == SubscriptionState::Trial && self.trial_ends.is_some_and(|ends| ends <= now)
    }

    /// Converts a trial into a paid subscription starting at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidState`] unless the subscription is in `Trial`.
    pub fn activate(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_can_start_trial()?;
        self.state = SubscriptionState::Active;
        self.starts = Some(at);
        Ok(())
    }

    /// Cancels the subscription, ending service at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidState`] unless the subscription is in `Trial` or
    /// `Active`.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<()> {
        match self.state {
            SubscriptionState::Trial | SubscriptionState::Active => {
                self.state = SubscriptionState::Canceled;
                self.ends = Some(at);
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }

    /// Records that a renewal order was generated at `at`.
    pub fn mark_renewed(&mut self, at: DateTime<Utc>) {
        self.renewed = Some(at);
    }
}
