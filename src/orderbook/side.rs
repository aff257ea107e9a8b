//! One side (asks or bids) of the order book.
//!
//! A side indexes ticks two ways: a concurrent id map for O(1) lookup and
//! removal, and a skip-list ladder per market keyed by the exact rational
//! price, which keeps levels sorted for best-price traversal without any
//! explicit sorting step.

use super::entry::TickEntry;
use super::level::PriceLevel;
use crate::ids::OrderId;
use crate::price::{Price, PriceKey};
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::sync::Arc;

/// Identity of a market: the asset the price is quoted in and the asset
/// quantities are counted in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketId {
    /// Asset the price is quoted in (the pair's second asset).
    pub price_asset: String,
    /// Asset quantities are counted in (the pair's first asset).
    pub quantity_asset: String,
}

impl MarketId {
    /// Build a market id from its two asset ids.
    pub fn new(price_asset: &str, quantity_asset: &str) -> Self {
        MarketId {
            price_asset: price_asset.to_string(),
            quantity_asset: quantity_asset.to_string(),
        }
    }

    /// The market a price belongs to.
    pub fn of_price(price: &Price) -> Self {
        MarketId::new(price.num_asset(), price.denom_asset())
    }
}

struct MarketLadder {
    levels: SkipMap<PriceKey, Arc<PriceLevel>>,
}

/// The ask side or the bid side of the book.
pub struct Side {
    ticks: DashMap<OrderId, Arc<TickEntry>>,
    markets: DashMap<MarketId, Arc<MarketLadder>>,
}

impl Side {
    /// Create an empty side.
    pub fn new() -> Self {
        Side {
            ticks: DashMap::new(),
            markets: DashMap::new(),
        }
    }

    /// Number of resident ticks across all markets.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Whether the side holds no ticks.
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Whether a tick exists for `order_id`.
    pub fn tick_exists(&self, order_id: &OrderId) -> bool {
        self.ticks.contains_key(order_id)
    }

    /// Look up the entry for `order_id`.
    pub fn get_tick(&self, order_id: &OrderId) -> Option<Arc<TickEntry>> {
        self.ticks.get(order_id).map(|entry| entry.value().clone())
    }

    /// All resident order ids.
    pub fn order_ids(&self) -> Vec<OrderId> {
        self.ticks.iter().map(|entry| *entry.key()).collect()
    }

    /// Insert a tick entry into its market ladder.
    pub fn insert_tick(&self, entry: Arc<TickEntry>) {
        let price = entry.price().clone();
        let market = MarketId::of_price(&price);
        let ladder = self
            .markets
            .entry(market)
            .or_insert_with(|| {
                Arc::new(MarketLadder {
                    levels: SkipMap::new(),
                })
            })
            .clone();
        let level = ladder
            .levels
            .get_or_insert_with(price.key(), || Arc::new(PriceLevel::new(price)))
            .value()
            .clone();
        level.append_tick(entry.clone());
        self.ticks.insert(entry.order_id(), entry);
    }

    /// Remove the tick for `order_id`; empty levels are dropped.
    pub fn remove_tick(&self, order_id: &OrderId) -> Option<Arc<TickEntry>> {
        let (_, entry) = self.ticks.remove(order_id)?;
        let market = MarketId::of_price(entry.price());
        if let Some(ladder) = self.markets.get(&market) {
            let key = entry.price().key();
            if let Some(level) = ladder.levels.get(&key) {
                level.value().remove_tick(order_id);
                if level.value().is_empty() {
                    ladder.levels.remove(&key);
                }
            }
        }
        Some(entry)
    }

    /// Apply a confirmed trade of `quantity` to the tick for `order_id`.
    /// Returns `None` when no such tick exists, otherwise whether the tick
    /// is now fully traded (and has been removed).
    pub fn apply_trade(&self, order_id: &OrderId, quantity: u64) -> Option<bool> {
        let entry = self.get_tick(order_id)?;
        let applied = entry.add_traded(quantity);
        let market = MarketId::of_price(entry.price());
        if let Some(ladder) = self.markets.get(&market) {
            if let Some(level) = ladder.levels.get(&entry.price().key()) {
                level.value().reduce_depth(applied);
            }
        }
        if entry.available_for_matching() == 0 {
            entry.cancel_expiry();
            // Already at zero depth; this just unlinks the entry.
            self.remove_tick(order_id);
            return Some(true);
        }
        Some(false)
    }

    /// The highest price in `market`, if any tick rests there.
    pub fn max_price(&self, market: &MarketId) -> Option<Price> {
        let ladder = self.markets.get(market)?;
        ladder
            .levels
            .back()
            .map(|entry| entry.value().price().clone())
    }

    /// The lowest price in `market`, if any tick rests there.
    pub fn min_price(&self, market: &MarketId) -> Option<Price> {
        let ladder = self.markets.get(market)?;
        ladder
            .levels
            .front()
            .map(|entry| entry.value().price().clone())
    }

    /// The level at the given exact price.
    pub fn level_at(&self, market: &MarketId, key: PriceKey) -> Option<Arc<PriceLevel>> {
        let ladder = self.markets.get(market)?;
        ladder.levels.get(&key).map(|entry| entry.value().clone())
    }

    /// Snapshot of the market's levels, cheapest first.
    pub fn levels_ascending(&self, market: &MarketId) -> Vec<Arc<PriceLevel>> {
        match self.markets.get(market) {
            Some(ladder) => ladder
                .levels
                .iter()
                .map(|entry| entry.value().clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot of the market's levels, dearest first.
    pub fn levels_descending(&self, market: &MarketId) -> Vec<Arc<PriceLevel>> {
        let mut levels = self.levels_ascending(market);
        levels.reverse();
        levels
    }

    /// Depth profile of a market: `(price, remaining quantity)` per level,
    /// cheapest first.
    pub fn depth_profile(&self, market: &MarketId) -> Vec<(Price, u64)> {
        self.levels_ascending(market)
            .into_iter()
            .map(|level| (level.price().clone(), level.depth()))
            .collect()
    }
}

impl Default for Side {
    fn default() -> Self {
        Side::new()
    }
}
