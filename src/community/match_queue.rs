//! The priority queue of pending match suggestions for one local order.

use crate::ids::OrderId;
use crate::price::Price;

/// One queued (or outstanding) match suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    /// How often this counterparty has been retried.
    pub retries: u32,
    /// The suggested counterparty price.
    pub price: Price,
    /// The suggested counterparty order.
    pub order_id: OrderId,
    /// The counterparty's remaining quantity at suggestion time.
    pub quantity: u64,
}

/// Pending match suggestions, ordered by retry count and then by the
/// taker's price preference: fewer retries first; within equal retries,
/// cheapest first when the local order is a bid, dearest first when it is
/// an ask. Insertion order breaks remaining ties.
#[derive(Debug)]
pub struct MatchPriorityQueue {
    is_ask: bool,
    items: Vec<QueueItem>,
}

impl MatchPriorityQueue {
    /// Create a queue for a local order of the given side.
    pub fn new(is_ask: bool) -> Self {
        MatchPriorityQueue {
            is_ask,
            items: Vec::new(),
        }
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of queued suggestions.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether a suggestion for `order_id` is queued.
    pub fn contains_order(&self, order_id: &OrderId) -> bool {
        self.items.iter().any(|item| item.order_id == *order_id)
    }

    /// Queue a suggestion.
    pub fn insert(&mut self, retries: u32, price: Price, order_id: OrderId, quantity: u64) {
        self.items.push(QueueItem {
            retries,
            price,
            order_id,
            quantity,
        });
        let is_ask = self.is_ask;
        // Stable sort: equal keys keep their arrival order.
        self.items.sort_by(|a, b| {
            a.retries.cmp(&b.retries).then_with(|| {
                let by_price = a.price.key().cmp(&b.price.key());
                if is_ask { by_price.reverse() } else { by_price }
            })
        });
    }

    /// Pop the best suggestion.
    pub fn delete(&mut self) -> Option<QueueItem> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Drop every suggestion involving `order_id`.
    pub fn remove_order(&mut self, order_id: &OrderId) {
        self.items.retain(|item| item.order_id != *order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{OrderNumber, TraderId};

    fn order_id(n: u32) -> OrderId {
        OrderId::new(TraderId::new([n as u8; 20]), OrderNumber::new(n))
    }

    fn price(num: u64, denom: u64) -> Price {
        Price::new(num, denom, "MB", "BTC")
    }

    #[test]
    fn bid_prefers_cheapest() {
        let mut queue = MatchPriorityQueue::new(false);
        queue.insert(0, price(3, 1), order_id(1), 10);
        queue.insert(0, price(1, 1), order_id(2), 10);
        queue.insert(0, price(2, 1), order_id(3), 10);

        assert_eq!(queue.delete().unwrap().order_id, order_id(2));
        assert_eq!(queue.delete().unwrap().order_id, order_id(3));
        assert_eq!(queue.delete().unwrap().order_id, order_id(1));
        assert!(queue.delete().is_none());
    }

    #[test]
    fn ask_prefers_dearest() {
        let mut queue = MatchPriorityQueue::new(true);
        queue.insert(0, price(3, 1), order_id(1), 10);
        queue.insert(0, price(1, 1), order_id(2), 10);
        queue.insert(0, price(2, 1), order_id(3), 10);

        assert_eq!(queue.delete().unwrap().order_id, order_id(1));
        assert_eq!(queue.delete().unwrap().order_id, order_id(3));
        assert_eq!(queue.delete().unwrap().order_id, order_id(2));
    }

    #[test]
    fn fewer_retries_win_over_better_price() {
        let mut queue = MatchPriorityQueue::new(false);
        queue.insert(1, price(1, 1), order_id(1), 10);
        queue.insert(0, price(3, 1), order_id(2), 10);

        assert_eq!(queue.delete().unwrap().order_id, order_id(2));
        assert_eq!(queue.delete().unwrap().order_id, order_id(1));
    }

    #[test]
    fn contains_and_remove() {
        let mut queue = MatchPriorityQueue::new(false);
        queue.insert(0, price(1, 1), order_id(1), 10);
        queue.insert(0, price(2, 1), order_id(2), 10);
        assert!(queue.contains_order(&order_id(1)));

        queue.remove_order(&order_id(1));
        assert!(!queue.contains_order(&order_id(1)));
        assert_eq!(queue.len(), 1);
    }
}
