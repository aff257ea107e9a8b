//! Ticks: the matchmaker-side replica of a remote (or local) order.

use crate::assets::AssetPair;
use crate::clock::{current_time_millis, MAX_ORDER_TIMEOUT, Timeout, Timestamp};
use crate::ids::OrderId;
use crate::order::Order;
use crate::price::Price;
use serde::Serialize;
use std::fmt;

/// A small tolerance on tick timestamps, to account for network delays.
pub const TIME_TOLERANCE_MILLIS: u64 = 10 * 1000;

/// The order-book entry representing an order. A tick replicates the order
/// sitting on the node it belongs to; only gossip updates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tick {
    order_id: OrderId,
    assets: AssetPair,
    timeout: Timeout,
    timestamp: Timestamp,
    is_ask: bool,
    traded: u64,
}

impl Tick {
    /// Build an ask tick.
    pub fn ask(
        order_id: OrderId,
        assets: AssetPair,
        timeout: Timeout,
        timestamp: Timestamp,
        traded: u64,
    ) -> Self {
        Tick {
            order_id,
            assets,
            timeout,
            timestamp,
            is_ask: true,
            traded,
        }
    }

    /// Build a bid tick.
    pub fn bid(
        order_id: OrderId,
        assets: AssetPair,
        timeout: Timeout,
        timestamp: Timestamp,
        traded: u64,
    ) -> Self {
        Tick {
            order_id,
            assets,
            timeout,
            timestamp,
            is_ask: false,
            traded,
        }
    }

    /// Build a tick with an explicit side flag.
    pub fn new(
        order_id: OrderId,
        assets: AssetPair,
        timeout: Timeout,
        timestamp: Timestamp,
        is_ask: bool,
        traded: u64,
    ) -> Self {
        Tick {
            order_id,
            assets,
            timeout,
            timestamp,
            is_ask,
            traded,
        }
    }

    /// Replicate a locally owned order.
    pub fn from_order(order: &Order) -> Self {
        Tick {
            order_id: order.order_id(),
            assets: order.assets().clone(),
            timeout: order.timeout(),
            timestamp: order.timestamp(),
            is_ask: order.is_ask(),
            traded: order.traded_quantity(),
        }
    }

    /// The identity of the replicated order.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// The assets being exchanged.
    pub fn assets(&self) -> &AssetPair {
        &self.assets
    }

    /// The price of the tick.
    pub fn price(&self) -> Price {
        self.assets.price()
    }

    /// When the tick expires, relative to its timestamp.
    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// When the order behind the tick was created.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Whether the tick replicates an ask.
    pub fn is_ask(&self) -> bool {
        self.is_ask
    }

    /// First-asset units already traded on the order.
    pub fn traded(&self) -> u64 {
        self.traded
    }

    /// Update the traded quantity.
    pub fn set_traded(&mut self, traded: u64) {
        self.traded = traded;
    }

    /// Validity predicate: not timed out, not stamped in the future beyond
    /// the skew tolerance, and with a timeout within the system maximum.
    pub fn is_valid(&self) -> bool {
        !self.timeout.is_timed_out(self.timestamp)
            && current_time_millis() + TIME_TOLERANCE_MILLIS >= self.timestamp.millis()
            && self.timeout.seconds() <= MAX_ORDER_TIMEOUT
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} P: {} Q: {} O: {}>",
            if self.is_ask { "Ask" } else { "Bid" },
            self.price(),
            self.assets.first(),
            self.order_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetAmount;
    use crate::ids::{OrderNumber, TraderId};

    fn tick(timeout: u64, timestamp_millis: u64) -> Tick {
        Tick::ask(
            OrderId::new(TraderId::new([0; 20]), OrderNumber::new(1)),
            AssetPair::new(AssetAmount::new(60, "BTC"), AssetAmount::new(30, "MB")).unwrap(),
            Timeout::new(timeout),
            Timestamp::from(timestamp_millis),
            0,
        )
    }

    #[test]
    fn fresh_tick_is_valid() {
        assert!(tick(3600, current_time_millis()).is_valid());
    }

    #[test]
    fn timed_out_tick_is_invalid() {
        assert!(!tick(1, current_time_millis() - 10_000).is_valid());
    }

    #[test]
    fn future_timestamp_beyond_skew_is_invalid() {
        assert!(!tick(3600, current_time_millis() + 60_000).is_valid());
        // Inside the tolerance window it passes.
        assert!(tick(3600, current_time_millis() + 5_000).is_valid());
    }

    #[test]
    fn oversized_timeout_is_invalid() {
        assert!(!tick(MAX_ORDER_TIMEOUT + 1, current_time_millis()).is_valid());
    }
}
