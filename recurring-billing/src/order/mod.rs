//! Orders, order items and adjustments.

mod grouping;
mod models;

pub use grouping::{OrderGroupKey, partition_subscriptions};
pub use models::{
    Adjustment, AdjustmentType, Order, OrderId, OrderItem, OrderItemId, OrderState, OrderType,
};
