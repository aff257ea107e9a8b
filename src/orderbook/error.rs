//! Order book error types

use crate::ids::OrderId;
use std::fmt;

/// Errors that can occur within the OrderBook
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrderBookError {
    /// A tick with this order id is already indexed
    DuplicateOrder(OrderId),

    /// The order was cancelled earlier; stale gossip is not re-inserted
    OrderCancelled(OrderId),

    /// The tick failed its validity predicate
    InvalidTick {
        /// The order id of the rejected tick
        order_id: OrderId,
        /// Why the tick was rejected
        reason: String,
    },

    /// No tick with this order id is indexed
    TickNotFound(OrderId),
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::DuplicateOrder(order_id) => {
                write!(f, "tick already present for order {order_id}")
            }
            OrderBookError::OrderCancelled(order_id) => {
                write!(f, "order {order_id} was cancelled; tick rejected")
            }
            OrderBookError::InvalidTick { order_id, reason } => {
                write!(f, "invalid tick for order {order_id}: {reason}")
            }
            OrderBookError::TickNotFound(order_id) => {
                write!(f, "no tick found for order {order_id}")
            }
        }
    }
}

impl std::error::Error for OrderBookError {}
