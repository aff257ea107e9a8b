//! Counterparty selection: the price-time matching strategy.
//!
//! Given a tick on one side, the engine walks the opposing side's price
//! ladder best-price-first for the taker (cheapest asks for an incoming
//! bid, dearest bids for an incoming ask), visiting ticks within a level
//! in insertion order. The engine is purely functional over the book; it
//! never mutates state.

use crate::orderbook::{MarketId, OrderBook, PriceLevel, TickEntry};
use crate::price::Price;
use std::sync::Arc;
use tracing::trace;

fn price_acceptable(taker_is_ask: bool, taker_price: &Price, level_price: &Price) -> bool {
    if taker_price.nearly_equals(level_price) {
        return true;
    }
    match level_price.partial_cmp(taker_price) {
        // An incoming bid accepts ask levels at or below its price; an
        // incoming ask accepts bid levels at or above its price.
        Some(ordering) => {
            if taker_is_ask {
                ordering.is_ge()
            } else {
                ordering.is_le()
            }
        }
        None => false,
    }
}

/// The price-time strategy over a shared order book.
pub struct PriceTimeStrategy {
    order_book: Arc<OrderBook>,
}

impl PriceTimeStrategy {
    /// Create a strategy over `order_book`.
    pub fn new(order_book: Arc<OrderBook>) -> Self {
        PriceTimeStrategy { order_book }
    }

    /// Collect counterparty ticks for `entry`, best price first, until
    /// the entry's remaining demand is covered. The result may be partial
    /// or empty.
    pub fn match_entry(&self, entry: &TickEntry) -> Vec<Arc<TickEntry>> {
        let mut demand = entry.available_for_matching();
        if demand == 0 {
            return Vec::new();
        }

        let price = entry.price();
        let market = MarketId::of_price(price);
        let levels: Vec<Arc<PriceLevel>> = if entry.is_ask() {
            self.order_book.bids().levels_descending(&market)
        } else {
            self.order_book.asks().levels_ascending(&market)
        };

        let mut matched = Vec::new();
        'levels: for level in levels {
            if !price_acceptable(entry.is_ask(), price, level.price()) {
                break;
            }
            for candidate in level.ticks() {
                if candidate.order_id() == entry.order_id()
                    || candidate.order_id().trader_id == entry.order_id().trader_id
                {
                    continue;
                }
                if candidate.is_blocked_for_matching(&entry.order_id()) {
                    continue;
                }
                let quantity = candidate.available_for_matching();
                if quantity == 0 || !candidate.is_valid() {
                    continue;
                }

                trace!(
                    tick = %entry.order_id(),
                    counterparty = %candidate.order_id(),
                    quantity,
                    "matched tick"
                );
                matched.push(candidate.clone());
                demand = demand.saturating_sub(quantity);
                if demand == 0 {
                    break 'levels;
                }
            }
        }
        matched
    }
}

/// The matching engine, parameterized by its strategy.
pub struct MatchingEngine {
    strategy: PriceTimeStrategy,
}

impl MatchingEngine {
    /// Create an engine running `strategy`.
    pub fn new(strategy: PriceTimeStrategy) -> Self {
        MatchingEngine { strategy }
    }

    /// Find counterparties for `entry`; see
    /// [`PriceTimeStrategy::match_entry`].
    pub fn match_entry(&self, entry: &TickEntry) -> Vec<Arc<TickEntry>> {
        self.strategy.match_entry(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetAmount, AssetPair};
    use crate::clock::{Timeout, Timestamp};
    use crate::ids::{OrderId, OrderNumber, TraderId};
    use crate::orderbook::Tick;

    fn pair(first: u64, second: u64) -> AssetPair {
        AssetPair::new(
            AssetAmount::new(first, "BTC"),
            AssetAmount::new(second, "MB"),
        )
        .unwrap()
    }

    struct Harness {
        book: Arc<OrderBook>,
        engine: MatchingEngine,
        ask_count: u32,
        bid_count: u32,
    }

    impl Harness {
        fn new() -> Self {
            let book = Arc::new(OrderBook::new());
            let engine = MatchingEngine::new(PriceTimeStrategy::new(book.clone()));
            Harness {
                book,
                engine,
                ask_count: 0,
                bid_count: 0,
            }
        }

        fn insert_ask(&mut self, first: u64, second: u64) -> OrderId {
            self.ask_count += 1;
            let id = OrderId::new(TraderId::new([2; 20]), OrderNumber::new(self.ask_count));
            let tick = Tick::ask(id, pair(first, second), Timeout::new(30), Timestamp::now(), 0);
            self.book.insert_ask(tick).unwrap();
            id
        }

        fn insert_bid(&mut self, first: u64, second: u64) -> OrderId {
            self.bid_count += 1;
            let id = OrderId::new(TraderId::new([3; 20]), OrderNumber::new(self.bid_count));
            let tick = Tick::bid(id, pair(first, second), Timeout::new(30), Timestamp::now(), 0);
            self.book.insert_bid(tick).unwrap();
            id
        }

        fn matches_for(&self, id: &OrderId) -> Vec<Arc<TickEntry>> {
            let entry = self.book.get_tick(id).unwrap();
            self.engine.match_entry(&entry)
        }
    }

    #[tokio::test]
    async fn empty_opposite_side_yields_no_matches() {
        let mut h = Harness::new();
        let ask = h.insert_ask(3000, 30);
        assert!(h.matches_for(&ask).is_empty());
    }

    #[tokio::test]
    async fn bid_matches_equal_priced_ask() {
        let mut h = Harness::new();
        h.insert_ask(3000, 30);
        let bid = h.insert_bid(3000, 30);
        assert_eq!(h.matches_for(&bid).len(), 1);
    }

    #[tokio::test]
    async fn ask_matches_equal_priced_bid() {
        let mut h = Harness::new();
        h.insert_bid(3000, 30);
        let ask = h.insert_ask(3000, 30);
        assert_eq!(h.matches_for(&ask).len(), 1);
    }

    #[tokio::test]
    async fn bid_sweeps_multiple_ask_levels() {
        let mut h = Harness::new();
        h.insert_ask(50, 350);
        h.insert_ask(18, 72);
        h.insert_ask(100, 700);
        let bid = h.insert_bid(200, 2000);
        assert_eq!(h.matches_for(&bid).len(), 3);
    }

    #[tokio::test]
    async fn ask_sweeps_multiple_bid_levels() {
        let mut h = Harness::new();
        h.insert_bid(50, 200);
        h.insert_bid(18, 72);
        h.insert_bid(100, 400);
        let ask = h.insert_ask(200, 200);
        assert_eq!(h.matches_for(&ask).len(), 3);
    }

    #[tokio::test]
    async fn unacceptable_levels_stop_the_walk() {
        let mut h = Harness::new();
        h.insert_bid(10, 60); // 6 MB/BTC
        h.insert_bid(10, 50); // 5 MB/BTC
        let ask = h.insert_ask(30, 180); // asks 6: only the 6-level is acceptable
        assert_eq!(h.matches_for(&ask).len(), 1);
    }

    #[tokio::test]
    async fn best_price_first_then_fifo() {
        let mut h = Harness::new();
        h.insert_ask(20, 100); // 5 MB/BTC
        h.insert_ask(25, 125); // 5 MB/BTC, later at same level
        h.insert_ask(10, 50); // 5 MB/BTC, last
        let bid = h.insert_bid(50, 250);
        let matched = h.matches_for(&bid);
        assert_eq!(matched.len(), 3);
        assert_eq!(matched.last().unwrap().assets().first().amount(), 10);
    }

    #[tokio::test]
    async fn demand_satisfied_stops_accumulation() {
        let mut h = Harness::new();
        h.insert_ask(100, 300);
        h.insert_ask(100, 300);
        let bid = h.insert_bid(100, 300);
        assert_eq!(h.matches_for(&bid).len(), 1);
    }

    #[tokio::test]
    async fn blocked_ticks_are_skipped() {
        let mut h = Harness::new();
        let ask = h.insert_ask(3000, 30);
        let bid = h.insert_bid(3000, 30);
        h.book
            .get_tick(&ask)
            .unwrap()
            .block_for_matching(bid);
        assert!(h.matches_for(&bid).is_empty());
    }

    #[tokio::test]
    async fn own_ticks_are_never_matched() {
        let mut h = Harness::new();
        // Same trader on both sides of the market.
        let id = OrderId::new(TraderId::new([3; 20]), OrderNumber::new(77));
        let tick = Tick::ask(id, pair(3000, 30), Timeout::new(30), Timestamp::now(), 0);
        h.book.insert_ask(tick).unwrap();
        let bid = h.insert_bid(3000, 30);
        assert!(h.matches_for(&bid).is_empty());
    }

    #[tokio::test]
    async fn fully_traded_ticks_are_skipped() {
        let mut h = Harness::new();
        let ask = h.insert_ask(3000, 30);
        h.book.get_tick(&ask).unwrap().add_traded(3000);
        let bid = h.insert_bid(3000, 30);
        assert!(h.matches_for(&bid).is_empty());
    }
}
