//! Core OrderBook implementation for indexing ticks and ageing them out.

use super::entry::TickEntry;
use super::error::OrderBookError;
use super::side::{MarketId, Side};
use super::tick::Tick;
use crate::clock::current_time_millis;
use crate::ids::{OrderId, TransactionId};
use crate::price::Price;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// The matchmaker's replica of the global order book: an ask side and a
/// bid side per market, plus the completed/cancelled sets used to reject
/// re-insertions of stale orders.
///
/// All mutating entry points take `&self`; the book is shared as an `Arc`
/// between the community, the matching engine and the expiry timers it
/// schedules.
pub struct OrderBook {
    asks: Side,
    bids: Side,
    completed_orders: DashMap<OrderId, ()>,
    cancelled_orders: DashMap<OrderId, ()>,
    processed_trades: DashMap<TransactionId, ()>,
}

impl OrderBook {
    /// Create an empty order book.
    pub fn new() -> Self {
        OrderBook {
            asks: Side::new(),
            bids: Side::new(),
            completed_orders: DashMap::new(),
            cancelled_orders: DashMap::new(),
            processed_trades: DashMap::new(),
        }
    }

    /// The ask side.
    pub fn asks(&self) -> &Side {
        &self.asks
    }

    /// The bid side.
    pub fn bids(&self) -> &Side {
        &self.bids
    }

    /// Insert an ask tick. Returns a receiver resolving with the order id
    /// when the tick's timeout elapses and it is removed from the book.
    pub fn insert_ask(
        self: &Arc<Self>,
        tick: Tick,
    ) -> Result<oneshot::Receiver<OrderId>, OrderBookError> {
        self.insert_tick(tick, true)
    }

    /// Insert a bid tick; expiry semantics as [`OrderBook::insert_ask`].
    pub fn insert_bid(
        self: &Arc<Self>,
        tick: Tick,
    ) -> Result<oneshot::Receiver<OrderId>, OrderBookError> {
        self.insert_tick(tick, false)
    }

    fn insert_tick(
        self: &Arc<Self>,
        tick: Tick,
        is_ask: bool,
    ) -> Result<oneshot::Receiver<OrderId>, OrderBookError> {
        let order_id = tick.order_id();
        if self.cancelled_orders.contains_key(&order_id) {
            return Err(OrderBookError::OrderCancelled(order_id));
        }
        if self.tick_exists(&order_id) {
            return Err(OrderBookError::DuplicateOrder(order_id));
        }
        if !tick.is_valid() {
            return Err(OrderBookError::InvalidTick {
                order_id,
                reason: "tick failed validity predicate".to_string(),
            });
        }
        debug_assert_eq!(tick.is_ask(), is_ask);

        let deadline = tick.timestamp().millis() + tick.timeout().seconds() * 1000;
        let remaining = deadline.saturating_sub(current_time_millis());
        let entry = Arc::new(TickEntry::new(tick));

        let (sender, receiver) = oneshot::channel();
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(remaining)).await;
            if let Some(book) = weak.upgrade() {
                trace!(order_id = %order_id, "tick expired");
                book.remove_tick(&order_id);
                let _ = sender.send(order_id);
            }
        });
        entry.set_expiry_task(handle);

        let side = if is_ask { &self.asks } else { &self.bids };
        side.insert_tick(entry);
        trace!(order_id = %order_id, is_ask, "tick inserted");
        Ok(receiver)
    }

    /// Remove the tick for `order_id` from whichever side holds it.
    pub fn remove_tick(&self, order_id: &OrderId) -> Option<Arc<TickEntry>> {
        let entry = self
            .asks
            .remove_tick(order_id)
            .or_else(|| self.bids.remove_tick(order_id))?;
        entry.cancel_expiry();
        trace!(order_id = %order_id, "tick removed");
        Some(entry)
    }

    /// Look up a tick entry on either side.
    pub fn get_tick(&self, order_id: &OrderId) -> Option<Arc<TickEntry>> {
        self.asks
            .get_tick(order_id)
            .or_else(|| self.bids.get_tick(order_id))
    }

    /// Whether a tick exists on either side.
    pub fn tick_exists(&self, order_id: &OrderId) -> bool {
        self.asks.tick_exists(order_id) || self.bids.tick_exists(order_id)
    }

    /// Whether an ask tick exists for `order_id`.
    pub fn ask_exists(&self, order_id: &OrderId) -> bool {
        self.asks.tick_exists(order_id)
    }

    /// Whether a bid tick exists for `order_id`.
    pub fn bid_exists(&self, order_id: &OrderId) -> bool {
        self.bids.tick_exists(order_id)
    }

    /// All resident order ids, for synchronization.
    pub fn get_order_ids(&self) -> Vec<OrderId> {
        let mut ids = self.asks.order_ids();
        ids.extend(self.bids.order_ids());
        ids
    }

    /// Advance `traded` on both ticks of a completed trade by `quantity`.
    /// Fully traded ticks are removed and recorded in `completed_orders`.
    /// Idempotent per `trade_id`: a repeated call is a no-op.
    pub fn update_ticks(
        &self,
        order_id_a: &OrderId,
        order_id_b: &OrderId,
        quantity: u64,
        trade_id: TransactionId,
    ) -> Vec<OrderId> {
        if self.processed_trades.insert(trade_id, ()).is_some() {
            debug!(trade_id = %trade_id, "trade already applied to book");
            return Vec::new();
        }

        let mut completed = Vec::new();
        for order_id in [order_id_a, order_id_b] {
            let done = self
                .asks
                .apply_trade(order_id, quantity)
                .or_else(|| self.bids.apply_trade(order_id, quantity));
            if done == Some(true) {
                self.completed_orders.insert(*order_id, ());
                completed.push(*order_id);
            }
        }
        debug!(
            a = %order_id_a,
            b = %order_id_b,
            quantity,
            completed = completed.len(),
            "book ticks updated"
        );
        completed
    }

    /// Record a completed order so its tick is not re-indexed.
    pub fn mark_completed(&self, order_id: OrderId) {
        self.completed_orders.insert(order_id, ());
    }

    /// Whether the order is known to be completed.
    pub fn is_completed(&self, order_id: &OrderId) -> bool {
        self.completed_orders.contains_key(order_id)
    }

    /// Record a cancelled order so stale gossip cannot re-insert it.
    pub fn mark_cancelled(&self, order_id: OrderId) {
        self.cancelled_orders.insert(order_id, ());
    }

    /// Whether the order is known to be cancelled.
    pub fn is_cancelled(&self, order_id: &OrderId) -> bool {
        self.cancelled_orders.contains_key(order_id)
    }

    /// The spread between the best bid and best ask of a market, when
    /// both sides are populated.
    pub fn bid_ask_spread(&self, market: &MarketId) -> Option<(Price, Price)> {
        let best_bid = self.bids.max_price(market)?;
        let best_ask = self.asks.min_price(market)?;
        Some((best_bid, best_ask))
    }

    /// Abort every pending expiry timer. Called on peer shutdown.
    pub fn shutdown(&self) {
        for order_id in self.get_order_ids() {
            if let Some(entry) = self.get_tick(&order_id) {
                entry.cancel_expiry();
            }
        }
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        OrderBook::new()
    }
}
