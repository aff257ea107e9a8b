//! Orders owned by the local trader, with quantity accounting.
//!
//! An [`Order`] tracks three quantities against its immutable total:
//! `reserved` (held by open proposals, per counterparty), `traded`
//! (first-asset units transferred out) and `received` (second-asset units
//! received). `available = total - reserved - traded` and is never
//! negative; a violation of that invariant terminates the peer.

mod manager;
mod repository;

pub use manager::OrderManager;
pub use repository::{MemoryOrderRepository, OrderRepository};

use crate::assets::{AssetAmount, AssetPair};
use crate::clock::{Timeout, Timestamp};
use crate::ids::OrderId;
use crate::price::Price;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use tracing::debug;

/// The derived lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Not yet confirmed by a matchmaker.
    Unverified,
    /// Live and eligible for matching.
    Open,
    /// Both legs have been fully exchanged.
    Completed,
    /// Cancelled by its owner.
    Cancelled,
    /// The timeout elapsed before completion.
    Expired,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Unverified => "unverified",
            OrderStatus::Open => "open",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// Errors from order quantity accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrderError {
    /// A reservation exceeds the available quantity.
    InsufficientAvailable {
        /// The order that rejected the reservation.
        order_id: OrderId,
        /// Quantity that was requested.
        requested: u64,
        /// Quantity that was available.
        available: u64,
    },
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::InsufficientAvailable {
                order_id,
                requested,
                available,
            } => write!(
                f,
                "order {order_id} cannot reserve {requested}: only {available} available"
            ),
        }
    }
}

impl std::error::Error for OrderError {}

/// An ask or bid created by the local trader.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    order_id: OrderId,
    assets: AssetPair,
    timeout: Timeout,
    timestamp: Timestamp,
    is_ask: bool,
    reserved_quantity: u64,
    traded_quantity: u64,
    received_quantity: u64,
    #[serde(skip)]
    reserved_ticks: HashMap<OrderId, u64>,
    cancelled: bool,
    verified: bool,
    completed_timestamp: Option<Timestamp>,
    /// Addresses the order was broadcast to at creation; cancel and
    /// completion broadcasts reuse the same set.
    #[serde(skip)]
    pub broadcast_peers: Vec<SocketAddr>,
}

impl Order {
    /// Create a fresh, unverified order.
    pub fn new(
        order_id: OrderId,
        assets: AssetPair,
        timeout: Timeout,
        timestamp: Timestamp,
        is_ask: bool,
    ) -> Self {
        Order {
            order_id,
            assets,
            timeout,
            timestamp,
            is_ask,
            reserved_quantity: 0,
            traded_quantity: 0,
            received_quantity: 0,
            reserved_ticks: HashMap::new(),
            cancelled: false,
            verified: false,
            completed_timestamp: None,
            broadcast_peers: Vec::new(),
        }
    }

    /// The order's globally unique identity.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// The assets exchanged by the order.
    pub fn assets(&self) -> &AssetPair {
        &self.assets
    }

    /// The order's price (second asset per first asset).
    pub fn price(&self) -> Price {
        self.assets.price()
    }

    /// Whether this order sells the first asset.
    pub fn is_ask(&self) -> bool {
        self.is_ask
    }

    /// When the order expires, relative to its creation time.
    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// When the order was created.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// When the order completed, if it has.
    pub fn completed_timestamp(&self) -> Option<Timestamp> {
        self.completed_timestamp
    }

    /// The immutable total quantity (first-asset units).
    pub fn total_quantity(&self) -> u64 {
        self.assets.first().amount()
    }

    /// The quantity not reserved or traded.
    pub fn available_quantity(&self) -> u64 {
        self.total_quantity()
            .saturating_sub(self.reserved_quantity)
            .saturating_sub(self.traded_quantity)
    }

    /// The quantity currently held by open proposals.
    pub fn reserved_quantity(&self) -> u64 {
        self.reserved_quantity
    }

    /// First-asset units already transferred out.
    pub fn traded_quantity(&self) -> u64 {
        self.traded_quantity
    }

    /// Second-asset units already received.
    pub fn received_quantity(&self) -> u64 {
        self.received_quantity
    }

    /// The per-counterparty reservation map.
    pub fn reserved_ticks(&self) -> &HashMap<OrderId, u64> {
        &self.reserved_ticks
    }

    /// Whether the order has been cancelled.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether a matchmaker has confirmed the order.
    pub fn verified(&self) -> bool {
        self.verified
    }

    /// Mark the order as verified.
    pub fn set_verified(&mut self) {
        self.verified = true;
    }

    /// Both legs fully exchanged?
    pub fn is_complete(&self) -> bool {
        self.traded_quantity >= self.assets.first().amount()
            && self.received_quantity >= self.assets.second().amount()
    }

    /// Not timed out and not cancelled.
    pub fn is_valid(&self) -> bool {
        !self.timeout.is_timed_out(self.timestamp) && !self.cancelled
    }

    /// The derived status of the order.
    pub fn status(&self) -> OrderStatus {
        if !self.verified {
            OrderStatus::Unverified
        } else if self.cancelled {
            OrderStatus::Cancelled
        } else if self.is_complete() {
            OrderStatus::Completed
        } else if self.timeout.is_timed_out(self.timestamp) {
            OrderStatus::Expired
        } else {
            OrderStatus::Open
        }
    }

    /// Whether an incoming proposal's price is acceptable: an ask accepts
    /// at or above its own price, a bid at or below, with the float
    /// tolerance bridging rationals that round identically.
    pub fn has_acceptable_price(&self, proposal_assets: &AssetPair) -> bool {
        let mine = self.price();
        let theirs = proposal_assets.price();
        if mine.nearly_equals(&theirs) {
            return true;
        }
        match mine.partial_cmp(&theirs) {
            Some(ordering) => {
                if self.is_ask {
                    ordering.is_le()
                } else {
                    ordering.is_ge()
                }
            }
            None => false,
        }
    }

    /// Reserve `quantity` for a proposal towards `order_id`.
    pub fn reserve_quantity_for_tick(
        &mut self,
        order_id: OrderId,
        quantity: u64,
    ) -> Result<(), OrderError> {
        if self.available_quantity() < quantity {
            return Err(OrderError::InsufficientAvailable {
                order_id: self.order_id,
                requested: quantity,
                available: self.available_quantity(),
            });
        }
        self.reserved_quantity += quantity;
        *self.reserved_ticks.entry(order_id).or_insert(0) += quantity;
        debug!(
            order_id = %self.order_id,
            other = %order_id,
            quantity,
            reserved = self.reserved_quantity,
            traded = self.traded_quantity,
            "reserved quantity"
        );
        Ok(())
    }

    /// Release `quantity` previously reserved for `order_id`.
    ///
    /// # Panics
    ///
    /// Releasing quantity that was never reserved is a double-release: a
    /// core invariant breach that terminates the peer.
    pub fn release_quantity_for_tick(&mut self, order_id: OrderId, quantity: u64) {
        let reserved = self
            .reserved_ticks
            .get_mut(&order_id)
            .unwrap_or_else(|| panic!("release without reservation for {order_id}"));
        assert!(
            *reserved >= quantity && self.reserved_quantity >= quantity,
            "double release for {order_id}: {quantity} exceeds reservation {reserved}"
        );
        *reserved -= quantity;
        self.reserved_quantity -= quantity;
        if self.reserved_ticks[&order_id] == 0 {
            self.reserved_ticks.remove(&order_id);
        }
        debug!(
            order_id = %self.order_id,
            other = %order_id,
            quantity,
            reserved = self.reserved_quantity,
            "released quantity"
        );
    }

    /// Release every outstanding reservation (used when cancelling).
    pub fn release_all_reservations(&mut self) {
        let held: Vec<(OrderId, u64)> = self
            .reserved_ticks
            .iter()
            .map(|(id, qty)| (*id, *qty))
            .collect();
        for (id, qty) in held {
            self.release_quantity_for_tick(id, qty);
        }
    }

    /// Cancel the order.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Record a confirmed transfer belonging to a trade with
    /// `other_order_id`. First-asset transfers advance `traded` and
    /// convert the matching reservation; second-asset transfers advance
    /// `received`.
    pub fn add_trade(&mut self, other_order_id: OrderId, transferred: &AssetAmount) {
        debug!(
            order_id = %self.order_id,
            other = %other_order_id,
            %transferred,
            "adding trade"
        );
        if transferred.asset_id() == self.assets.first().asset_id() {
            self.traded_quantity += transferred.amount();
            self.release_quantity_for_tick(other_order_id, transferred.amount());
        } else {
            self.received_quantity += transferred.amount();
        }

        if self.is_complete() && self.completed_timestamp.is_none() {
            self.completed_timestamp = Some(Timestamp::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{OrderNumber, TraderId};

    fn order_id(byte: u8, number: u32) -> OrderId {
        OrderId::new(TraderId::new([byte; 20]), OrderNumber::new(number))
    }

    fn pair(a: u64, b: u64) -> AssetPair {
        AssetPair::new(AssetAmount::new(a, "BTC"), AssetAmount::new(b, "MB")).unwrap()
    }

    fn open_order(total: u64) -> Order {
        let mut order = Order::new(
            order_id(1, 1),
            pair(total, total * 3),
            Timeout::new(3600),
            Timestamp::now(),
            true,
        );
        order.set_verified();
        order
    }

    #[test]
    fn accounting_invariant_holds() {
        let mut order = open_order(10);
        order.reserve_quantity_for_tick(order_id(2, 1), 4).unwrap();
        assert_eq!(order.available_quantity(), 6);
        assert_eq!(order.reserved_quantity(), 4);
        assert_eq!(
            order.available_quantity() + order.reserved_quantity() + order.traded_quantity(),
            order.total_quantity()
        );

        order.release_quantity_for_tick(order_id(2, 1), 4);
        assert_eq!(order.available_quantity(), 10);
        assert!(order.reserved_ticks().is_empty());
    }

    #[test]
    fn over_reservation_is_rejected() {
        let mut order = open_order(5);
        assert!(matches!(
            order.reserve_quantity_for_tick(order_id(2, 1), 6),
            Err(OrderError::InsufficientAvailable { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "release without reservation")]
    fn double_release_panics() {
        let mut order = open_order(5);
        order.reserve_quantity_for_tick(order_id(2, 1), 2).unwrap();
        order.release_quantity_for_tick(order_id(2, 1), 2);
        order.release_quantity_for_tick(order_id(2, 1), 2);
    }

    #[test]
    fn add_trade_converts_reservation() {
        let mut order = open_order(10);
        order.reserve_quantity_for_tick(order_id(2, 1), 10).unwrap();
        order.add_trade(order_id(2, 1), &AssetAmount::new(10, "BTC"));
        assert_eq!(order.traded_quantity(), 10);
        assert_eq!(order.reserved_quantity(), 0);
        assert!(!order.is_complete());

        order.add_trade(order_id(2, 1), &AssetAmount::new(30, "MB"));
        assert!(order.is_complete());
        assert_eq!(order.status(), OrderStatus::Completed);
        assert!(order.completed_timestamp().is_some());
    }

    #[test]
    fn status_transitions() {
        let mut order = Order::new(
            order_id(1, 1),
            pair(1, 1),
            Timeout::new(3600),
            Timestamp::now(),
            false,
        );
        assert_eq!(order.status(), OrderStatus::Unverified);
        order.set_verified();
        assert_eq!(order.status(), OrderStatus::Open);
        order.cancel();
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn expired_order_is_invalid() {
        let mut order = Order::new(
            order_id(1, 1),
            pair(1, 1),
            Timeout::new(0),
            Timestamp::now(),
            false,
        );
        order.set_verified();
        assert_eq!(order.status(), OrderStatus::Expired);
        assert!(!order.is_valid());
    }

    #[test]
    fn acceptable_price_for_ask_and_bid() {
        // Ask at 3 MB/BTC accepts 3 or better (higher).
        let ask = open_order(10); // 10 BTC / 30 MB => 3 MB/BTC
        assert!(ask.has_acceptable_price(&pair(10, 30)));
        assert!(ask.has_acceptable_price(&pair(10, 40)));
        assert!(!ask.has_acceptable_price(&pair(10, 20)));

        let mut bid = Order::new(
            order_id(3, 1),
            pair(10, 30),
            Timeout::new(3600),
            Timestamp::now(),
            false,
        );
        bid.set_verified();
        assert!(bid.has_acceptable_price(&pair(10, 30)));
        assert!(bid.has_acceptable_price(&pair(10, 20)));
        assert!(!bid.has_acceptable_price(&pair(10, 40)));
    }
}
