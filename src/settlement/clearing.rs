//! Clearing policies: whether to commit to a trade with a counterparty.

use super::TradingEngine;
use crate::ids::TraderId;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// A veto point consulted before a recipient commits to a proposed trade.
/// Implementations may perform I/O; the caller bounds them with the
/// proposal timeout.
#[async_trait]
pub trait ClearingPolicy: Send + Sync {
    /// Whether a trade with `trader_id` should go ahead.
    async fn should_trade(&self, trader_id: &TraderId) -> bool;
}

/// Allows one outstanding trade per counterparty: a trade goes ahead only
/// when every known transaction with that counterparty has settled.
pub struct SingleTradeClearingPolicy {
    engine: Arc<TradingEngine>,
}

impl SingleTradeClearingPolicy {
    /// Create the policy over the engine's provenance records.
    pub fn new(engine: Arc<TradingEngine>) -> Self {
        SingleTradeClearingPolicy { engine }
    }
}

#[async_trait]
impl ClearingPolicy for SingleTradeClearingPolicy {
    async fn should_trade(&self, trader_id: &TraderId) -> bool {
        let pending = self.engine.has_pending_with(trader_id);
        if pending {
            info!(
                trader = %trader_id,
                "clearing policy refusing trade: counterparty has an unsettled transaction"
            );
        }
        !pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetAmount, AssetPair};
    use crate::clock::Timestamp;
    use crate::ids::{OrderId, OrderNumber};
    use crate::trade::ProposedTrade;

    fn order_id(byte: u8, n: u32) -> OrderId {
        OrderId::new(TraderId::new([byte; 20]), OrderNumber::new(n))
    }

    #[tokio::test]
    async fn unsettled_counterparties_are_refused() {
        let engine = TradingEngine::new();
        let partner = TraderId::new([2; 20]);
        let stranger = TraderId::new([3; 20]);
        let policy = SingleTradeClearingPolicy::new(engine.clone());
        assert!(policy.should_trade(&partner).await);

        // No wallets registered: the settlement stalls and the
        // transaction stays pending.
        let trade = ProposedTrade::propose(
            TraderId::new([1; 20]),
            order_id(1, 1),
            order_id(2, 1),
            AssetPair::new(AssetAmount::new(1, "DUM1"), AssetAmount::new(1, "DUM2")).unwrap(),
            Timestamp::now(),
        );
        engine.trade(&trade, order_id(1, 1), true);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(!policy.should_trade(&partner).await);
        assert!(policy.should_trade(&stranger).await);
    }
}
