//! Creation and cancellation of locally owned orders.

use super::{Order, OrderRepository};
use crate::assets::AssetPair;
use crate::clock::{Timeout, Timestamp};
use crate::ids::{OrderId, TraderId};
use std::sync::Arc;
use tracing::info;

/// Manager for the trader's own orders.
pub struct OrderManager {
    mid: TraderId,
    repository: Arc<dyn OrderRepository>,
}

impl OrderManager {
    /// Create a manager over `repository` for trader `mid`.
    pub fn new(mid: TraderId, repository: Arc<dyn OrderRepository>) -> Self {
        OrderManager { mid, repository }
    }

    /// The backing repository.
    pub fn repository(&self) -> &Arc<dyn OrderRepository> {
        &self.repository
    }

    /// Create an ask (sell) order.
    pub fn create_ask_order(&self, assets: AssetPair, timeout: Timeout) -> Order {
        self.create_order(assets, timeout, true)
    }

    /// Create a bid (buy) order.
    pub fn create_bid_order(&self, assets: AssetPair, timeout: Timeout) -> Order {
        self.create_order(assets, timeout, false)
    }

    fn create_order(&self, assets: AssetPair, timeout: Timeout, is_ask: bool) -> Order {
        let order_id = OrderId::new(self.mid, self.repository.next_identity());
        let mut order = Order::new(order_id, assets, timeout, Timestamp::now(), is_ask);
        // Matchmaker confirmation signatures live on the provenance ledger,
        // which is out of scope here; orders verify at creation.
        order.set_verified();
        self.repository.add(order.clone());
        info!(order_id = %order_id, is_ask, "order created");
        order
    }

    /// Cancel an order, releasing any outstanding reservations.
    pub fn cancel_order(&self, order_id: &OrderId) -> Option<Order> {
        let mut order = self.repository.find_by_id(order_id)?;
        order.release_all_reservations();
        order.cancel();
        self.repository.update(order.clone());
        info!(order_id = %order_id, "order cancelled");
        Some(order)
    }
}
