//! Tick entries: live book residents with matching state.

use super::tick::Tick;
use crate::assets::AssetPair;
use crate::clock::{Timeout, Timestamp};
use crate::ids::OrderId;
use crate::price::Price;
use dashmap::DashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// How long a counterparty stays blocked for matching after a declined
/// match involving it.
pub const BLOCK_WINDOW: Duration = Duration::from_secs(10);

/// A tick indexed in the order book, together with the state the
/// matchmaker keeps about it: the mutable traded counter, the temporary
/// per-counterparty matching blocks, and the expiry timer handle.
pub struct TickEntry {
    order_id: OrderId,
    assets: AssetPair,
    timeout: Timeout,
    timestamp: Timestamp,
    is_ask: bool,
    price: Price,
    traded: AtomicU64,
    blocked: DashMap<OrderId, Instant>,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl TickEntry {
    /// Wrap a tick for insertion into the book.
    pub fn new(tick: Tick) -> Self {
        let price = tick.price();
        TickEntry {
            order_id: tick.order_id(),
            assets: tick.assets().clone(),
            timeout: tick.timeout(),
            timestamp: tick.timestamp(),
            is_ask: tick.is_ask(),
            price,
            traded: AtomicU64::new(tick.traded()),
            blocked: DashMap::new(),
            expiry: Mutex::new(None),
        }
    }

    /// The identity of the replicated order.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// The assets of the tick.
    pub fn assets(&self) -> &AssetPair {
        &self.assets
    }

    /// The tick's price.
    pub fn price(&self) -> &Price {
        &self.price
    }

    /// Whether the entry sits on the ask side.
    pub fn is_ask(&self) -> bool {
        self.is_ask
    }

    /// First-asset units already traded.
    pub fn traded(&self) -> u64 {
        self.traded.load(Ordering::Acquire)
    }

    /// Advance the traded counter. Clamped so the remaining quantity
    /// never goes negative; returns the quantity actually applied.
    pub fn add_traded(&self, quantity: u64) -> u64 {
        let remaining = self.available_for_matching();
        let applied = remaining.min(quantity);
        self.traded.fetch_add(applied, Ordering::AcqRel);
        applied
    }

    /// The quantity still open for matching.
    pub fn available_for_matching(&self) -> u64 {
        self.assets.first().amount().saturating_sub(self.traded())
    }

    /// A snapshot of the underlying tick with the current traded counter.
    pub fn tick(&self) -> Tick {
        Tick::new(
            self.order_id,
            self.assets.clone(),
            self.timeout,
            self.timestamp,
            self.is_ask,
            self.traded(),
        )
    }

    /// Validity predicate of the snapshot.
    pub fn is_valid(&self) -> bool {
        self.tick().is_valid()
    }

    /// Temporarily block a counterparty order for matching.
    pub fn block_for_matching(&self, order_id: OrderId) {
        debug!(tick = %self.order_id, blocked = %order_id, "blocking for matching");
        self.blocked.insert(order_id, Instant::now());
    }

    /// Whether matching against `order_id` is currently blocked. Blocks
    /// lapse after [`BLOCK_WINDOW`].
    pub fn is_blocked_for_matching(&self, order_id: &OrderId) -> bool {
        let blocked_at = self.blocked.get(order_id).map(|entry| *entry.value());
        match blocked_at {
            Some(at) if at.elapsed() < BLOCK_WINDOW => true,
            Some(_) => {
                self.blocked.remove(order_id);
                false
            }
            None => false,
        }
    }

    /// Attach the expiry timer that removes this tick when its timeout
    /// elapses. Replaces (and aborts) any previous timer.
    pub fn set_expiry_task(&self, handle: JoinHandle<()>) {
        let mut slot = self.expiry.lock().expect("expiry lock poisoned");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Abort the expiry timer, if any.
    pub fn cancel_expiry(&self) {
        if let Some(handle) = self.expiry.lock().expect("expiry lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for TickEntry {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.expiry.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetAmount;
    use crate::ids::{OrderNumber, TraderId};

    fn entry() -> TickEntry {
        let tick = Tick::ask(
            OrderId::new(TraderId::new([0; 20]), OrderNumber::new(1)),
            AssetPair::new(AssetAmount::new(60, "BTC"), AssetAmount::new(30, "MB")).unwrap(),
            Timeout::new(3600),
            Timestamp::now(),
            0,
        );
        TickEntry::new(tick)
    }

    #[test]
    fn traded_is_clamped_to_remaining() {
        let entry = entry();
        assert_eq!(entry.available_for_matching(), 60);
        assert_eq!(entry.add_traded(50), 50);
        assert_eq!(entry.available_for_matching(), 10);
        assert_eq!(entry.add_traded(50), 10);
        assert_eq!(entry.available_for_matching(), 0);
    }

    #[test]
    fn blocking_is_per_counterparty() {
        let entry = entry();
        let other = OrderId::new(TraderId::new([9; 20]), OrderNumber::new(4));
        let third = OrderId::new(TraderId::new([8; 20]), OrderNumber::new(4));
        entry.block_for_matching(other);
        assert!(entry.is_blocked_for_matching(&other));
        assert!(!entry.is_blocked_for_matching(&third));
    }

    #[test]
    fn snapshot_reflects_traded() {
        let entry = entry();
        entry.add_traded(10);
        assert_eq!(entry.tick().traded(), 10);
    }
}
