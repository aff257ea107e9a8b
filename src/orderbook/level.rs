//! A single price level: a FIFO of tick entries with a cached depth.

use super::entry::TickEntry;
use crate::ids::OrderId;
use crate::price::Price;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// All ticks resting at one exact price, in insertion (time-priority)
/// order. `depth` caches the sum of `(first.amount - traded)` over the
/// resident ticks.
pub struct PriceLevel {
    price: Price,
    ticks: RwLock<VecDeque<Arc<TickEntry>>>,
    depth: AtomicU64,
}

impl PriceLevel {
    /// Create an empty level at `price`.
    pub fn new(price: Price) -> Self {
        PriceLevel {
            price,
            ticks: RwLock::new(VecDeque::new()),
            depth: AtomicU64::new(0),
        }
    }

    /// The exact price of this level.
    pub fn price(&self) -> &Price {
        &self.price
    }

    /// The cached remaining quantity across resident ticks.
    pub fn depth(&self) -> u64 {
        self.depth.load(Ordering::Acquire)
    }

    /// Number of resident ticks.
    pub fn len(&self) -> usize {
        self.ticks.read().expect("level lock poisoned").len()
    }

    /// Whether the level holds no ticks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a tick at the back of the FIFO.
    pub fn append_tick(&self, entry: Arc<TickEntry>) {
        self.depth
            .fetch_add(entry.available_for_matching(), Ordering::AcqRel);
        self.ticks
            .write()
            .expect("level lock poisoned")
            .push_back(entry);
    }

    /// Remove the tick for `order_id`, returning it.
    pub fn remove_tick(&self, order_id: &OrderId) -> Option<Arc<TickEntry>> {
        let mut ticks = self.ticks.write().expect("level lock poisoned");
        let position = ticks.iter().position(|t| t.order_id() == *order_id)?;
        let entry = ticks.remove(position)?;
        self.depth
            .fetch_sub(entry.available_for_matching(), Ordering::AcqRel);
        Some(entry)
    }

    /// Reduce the cached depth after a trade advanced a resident tick.
    pub fn reduce_depth(&self, quantity: u64) {
        self.depth.fetch_sub(quantity, Ordering::AcqRel);
    }

    /// Snapshot of the resident ticks in FIFO order.
    pub fn ticks(&self) -> Vec<Arc<TickEntry>> {
        self.ticks
            .read()
            .expect("level lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.ticks() {
            writeln!(
                f,
                "{}\t@\t{} {}",
                entry.assets().first(),
                entry.price().as_f64(),
                entry.assets().second().asset_id()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetAmount, AssetPair};
    use crate::clock::{Timeout, Timestamp};
    use crate::ids::{OrderNumber, TraderId};
    use crate::orderbook::Tick;

    fn entry(number: u32, amount: u64) -> Arc<TickEntry> {
        let tick = Tick::ask(
            OrderId::new(TraderId::new([0; 20]), OrderNumber::new(number)),
            AssetPair::new(
                AssetAmount::new(amount, "BTC"),
                AssetAmount::new(amount / 2, "MC"),
            )
            .unwrap(),
            Timeout::new(100),
            Timestamp::now(),
            0,
        );
        Arc::new(TickEntry::new(tick))
    }

    fn level() -> PriceLevel {
        PriceLevel::new(Price::new(1, 2, "MC", "BTC"))
    }

    #[test]
    fn depth_tracks_appends_and_removals() {
        let level = level();
        level.append_tick(entry(1, 60));
        level.append_tick(entry(2, 30));
        assert_eq!(level.len(), 2);
        assert_eq!(level.depth(), 90);

        level.remove_tick(&OrderId::new(TraderId::new([0; 20]), OrderNumber::new(1)));
        assert_eq!(level.len(), 1);
        assert_eq!(level.depth(), 30);
    }

    #[test]
    fn fifo_order_is_preserved() {
        let level = level();
        for n in 1..=4 {
            level.append_tick(entry(n, 10));
        }
        let numbers: Vec<u32> = level
            .ticks()
            .iter()
            .map(|t| t.order_id().order_number.value())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn depth_counts_remaining_not_total() {
        let level = level();
        let e = entry(1, 60);
        e.add_traded(20);
        level.append_tick(e);
        assert_eq!(level.depth(), 40);
    }
}
