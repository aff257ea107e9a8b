//! Order storage behind a repository seam.
//!
//! Persistence backends are out of scope; any store that can honour the
//! trait below can be plugged in. The in-memory implementation backs the
//! community and its tests.

use super::Order;
use crate::ids::{OrderId, OrderNumber, TraderId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Storage contract for locally owned orders.
pub trait OrderRepository: Send + Sync {
    /// Look up an order by id.
    fn find_by_id(&self, order_id: &OrderId) -> Option<Order>;

    /// All stored orders.
    fn find_all(&self) -> Vec<Order>;

    /// Store a new order.
    fn add(&self, order: Order);

    /// Write back a mutated order.
    fn update(&self, order: Order);

    /// Remove an order.
    fn remove(&self, order_id: &OrderId);

    /// The next free order number for this trader.
    fn next_identity(&self) -> OrderNumber;
}

/// A repository keeping orders in process memory.
pub struct MemoryOrderRepository {
    mid: TraderId,
    orders: DashMap<OrderId, Order>,
    next_number: AtomicU32,
}

impl MemoryOrderRepository {
    /// Create an empty repository for the trader `mid`.
    pub fn new(mid: TraderId) -> Self {
        MemoryOrderRepository {
            mid,
            orders: DashMap::new(),
            next_number: AtomicU32::new(1),
        }
    }

    /// The trader this repository belongs to.
    pub fn mid(&self) -> TraderId {
        self.mid
    }
}

impl OrderRepository for MemoryOrderRepository {
    fn find_by_id(&self, order_id: &OrderId) -> Option<Order> {
        self.orders.get(order_id).map(|entry| entry.value().clone())
    }

    fn find_all(&self) -> Vec<Order> {
        self.orders.iter().map(|entry| entry.value().clone()).collect()
    }

    fn add(&self, order: Order) {
        self.orders.insert(order.order_id(), order);
    }

    fn update(&self, order: Order) {
        self.orders.insert(order.order_id(), order);
    }

    fn remove(&self, order_id: &OrderId) {
        self.orders.remove(order_id);
    }

    fn next_identity(&self) -> OrderNumber {
        OrderNumber::new(self.next_number.fetch_add(1, Ordering::SeqCst))
    }
}
