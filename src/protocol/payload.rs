//! Structured payloads carried by the wire messages.
//!
//! Trade negotiation messages reuse [`ProposedTrade`] and
//! [`DeclinedTrade`](crate::trade::DeclinedTrade) directly; the payloads
//! here cover the remaining message families.

use super::bloom::BloomFilter;
use crate::assets::AssetPair;
use crate::clock::{Timeout, Timestamp};
use crate::ids::{OrderId, OrderNumber, TraderId, TransactionId};
use crate::orderbook::Tick;
use crate::trade::{DeclineMatchReason, ProposedTrade};
use serde::{Deserialize, Serialize};

/// A full order tuple, broadcast on creation and unicast during sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// The trader owning the order.
    pub trader_id: TraderId,
    /// When the order was created.
    pub timestamp: Timestamp,
    /// The trader-local order number.
    pub order_number: OrderNumber,
    /// The assets on offer.
    pub assets: AssetPair,
    /// The order's lifetime.
    pub timeout: Timeout,
    /// First-asset units already traded.
    pub traded: u64,
    /// Whether the order is an ask.
    pub is_ask: bool,
}

impl OrderPayload {
    /// Replicate a tick into its payload form.
    pub fn from_tick(tick: &Tick) -> Self {
        OrderPayload {
            trader_id: tick.order_id().trader_id,
            timestamp: tick.timestamp(),
            order_number: tick.order_id().order_number,
            assets: tick.assets().clone(),
            timeout: tick.timeout(),
            traded: tick.traded(),
            is_ask: tick.is_ask(),
        }
    }

    /// The order id named by this payload.
    pub fn order_id(&self) -> OrderId {
        OrderId::new(self.trader_id, self.order_number)
    }

    /// Materialize the payload as a tick.
    pub fn to_tick(&self) -> Tick {
        Tick::new(
            self.order_id(),
            self.assets.clone(),
            self.timeout,
            self.timestamp,
            self.is_ask,
            self.traded,
        )
    }
}

/// A match notification from a matchmaker: the matched tick plus routing
/// data identifying the recipient order and the introducing matchmaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPayload {
    /// The matched counterparty tick.
    pub tick: OrderPayload,
    /// The recipient's order number (the recipient is the destination
    /// trader, so the number suffices).
    pub recipient_order_number: OrderNumber,
    /// The trader owning the matched tick.
    pub match_trader_id: TraderId,
    /// The matchmaker that found this match.
    pub matchmaker_trader_id: TraderId,
}

impl MatchPayload {
    /// The counterparty order suggested by this match.
    pub fn other_order_id(&self) -> OrderId {
        self.tick.order_id()
    }
}

/// A trader telling a matchmaker that a suggested match is declined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineMatchPayload {
    /// The declining trader.
    pub trader_id: TraderId,
    /// When the decline was created.
    pub timestamp: Timestamp,
    /// The declining trader's order number.
    pub order_number: OrderNumber,
    /// The suggested counterparty order.
    pub other_order_id: OrderId,
    /// Why the match is declined.
    pub reason: DeclineMatchReason,
}

/// A broadcast order cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderPayload {
    /// The trader cancelling its order.
    pub trader_id: TraderId,
    /// When the cancellation was created.
    pub timestamp: Timestamp,
    /// The cancelled order's number.
    pub order_number: OrderNumber,
}

impl CancelOrderPayload {
    /// The cancelled order id.
    pub fn order_id(&self) -> OrderId {
        OrderId::new(self.trader_id, self.order_number)
    }
}

/// A completed trade, broadcast to the network (and unicast to the
/// matchmakers that introduced the counterparty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTradePayload {
    /// The settled trade tuple.
    pub trade: ProposedTrade,
    /// The transaction identity of the settlement.
    pub trade_id: TransactionId,
}

/// The periodic orderbook synchronization offer: a Bloom filter over the
/// sender's known order ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderbookSyncPayload {
    /// The syncing matchmaker.
    pub trader_id: TraderId,
    /// When the sync was initiated.
    pub timestamp: Timestamp,
    /// Bloom summary of the sender's order ids.
    pub bloom: BloomFilter,
}

/// Ping/pong keep-alive carrying a request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPongPayload {
    /// The sender.
    pub trader_id: TraderId,
    /// When the message was created.
    pub timestamp: Timestamp,
    /// Correlates a pong with its ping.
    pub identifier: u32,
}
