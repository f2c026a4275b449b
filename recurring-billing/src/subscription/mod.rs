//! Subscriptions and their state machine.

mod lifecycle;
mod models;

pub use models::{Subscription, SubscriptionId, SubscriptionState};
