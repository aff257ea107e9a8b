//! Trade negotiation messages and decline reasons.
//!
//! A negotiation attempt is scoped by a `proposal_id`: the proposer sends
//! a [`ProposedTrade`], the recipient answers with a start, a counter
//! (downscaled to what it can still fill) or a [`DeclinedTrade`] carrying
//! one of the [`DeclinedTradeReason`]s.

use crate::assets::AssetPair;
use crate::clock::Timestamp;
use crate::ids::{OrderId, TraderId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a trade proposal was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclinedTradeReason {
    /// The recipient order failed validation.
    OrderInvalid,
    /// The recipient order expired.
    OrderExpired,
    /// The recipient order was cancelled.
    OrderCancelled,
    /// The recipient order is already fully traded.
    OrderCompleted,
    /// The recipient order's quantity is fully reserved elsewhere.
    OrderReserved,
    /// The proposed price is not acceptable.
    UnacceptablePrice,
    /// No quantity was available when dispatching the proposal.
    NoAvailableQuantity,
    /// The clearing policy vetoed trading with this counterparty.
    AlreadyTrading,
    /// The counterparty's address could not be resolved.
    AddressLookupFail,
    /// Timeout or another unspecified failure.
    Other,
}

impl DeclinedTradeReason {
    /// Wire encoding of the reason.
    pub fn to_wire(self) -> u32 {
        match self {
            DeclinedTradeReason::OrderInvalid => 0,
            DeclinedTradeReason::OrderExpired => 1,
            DeclinedTradeReason::OrderCancelled => 2,
            DeclinedTradeReason::OrderCompleted => 3,
            DeclinedTradeReason::OrderReserved => 4,
            DeclinedTradeReason::UnacceptablePrice => 5,
            DeclinedTradeReason::NoAvailableQuantity => 6,
            DeclinedTradeReason::AlreadyTrading => 7,
            DeclinedTradeReason::AddressLookupFail => 8,
            DeclinedTradeReason::Other => 9,
        }
    }

    /// Decode a wire reason.
    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => DeclinedTradeReason::OrderInvalid,
            1 => DeclinedTradeReason::OrderExpired,
            2 => DeclinedTradeReason::OrderCancelled,
            3 => DeclinedTradeReason::OrderCompleted,
            4 => DeclinedTradeReason::OrderReserved,
            5 => DeclinedTradeReason::UnacceptablePrice,
            6 => DeclinedTradeReason::NoAvailableQuantity,
            7 => DeclinedTradeReason::AlreadyTrading,
            8 => DeclinedTradeReason::AddressLookupFail,
            9 => DeclinedTradeReason::Other,
            _ => return None,
        })
    }
}

impl fmt::Display for DeclinedTradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Why a trader declines a match suggestion back to its matchmaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclineMatchReason {
    /// Our own order is no longer open.
    OrderCompleted,
    /// The suggested counterparty order is completed.
    OtherOrderCompleted,
    /// The suggested counterparty order is cancelled.
    OtherOrderCancelled,
    /// Some other failure (e.g. address resolution).
    Other,
}

impl DeclineMatchReason {
    /// Wire encoding of the reason.
    pub fn to_wire(self) -> u32 {
        match self {
            DeclineMatchReason::OrderCompleted => 0,
            DeclineMatchReason::OtherOrderCompleted => 1,
            DeclineMatchReason::OtherOrderCancelled => 2,
            DeclineMatchReason::Other => 3,
        }
    }

    /// Decode a wire reason.
    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => DeclineMatchReason::OrderCompleted,
            1 => DeclineMatchReason::OtherOrderCompleted,
            2 => DeclineMatchReason::OtherOrderCancelled,
            3 => DeclineMatchReason::Other,
            _ => return None,
        })
    }
}

/// A proposed, countered or started trade between two orders. The same
/// shape travels under three wire tags; the tag carries the intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTrade {
    /// The sender of this message.
    pub trader_id: TraderId,
    /// The sender's order.
    pub order_id: OrderId,
    /// The counterparty's order.
    pub recipient_order_id: OrderId,
    /// Scope of this negotiation attempt.
    pub proposal_id: u32,
    /// The pair on offer (already scaled to the proposed quantity).
    pub assets: AssetPair,
    /// When the message was created.
    pub timestamp: Timestamp,
}

impl ProposedTrade {
    /// Build a fresh proposal with a random id.
    pub fn propose(
        trader_id: TraderId,
        order_id: OrderId,
        recipient_order_id: OrderId,
        assets: AssetPair,
        timestamp: Timestamp,
    ) -> Self {
        ProposedTrade {
            trader_id,
            order_id,
            recipient_order_id,
            proposal_id: rand::random(),
            assets,
            timestamp,
        }
    }

    /// Build the counter to `incoming`, offering `assets` instead. The
    /// proposal id is kept so both sides talk about one negotiation.
    pub fn counter(
        trader_id: TraderId,
        assets: AssetPair,
        timestamp: Timestamp,
        incoming: &ProposedTrade,
    ) -> Self {
        ProposedTrade {
            trader_id,
            order_id: incoming.recipient_order_id,
            recipient_order_id: incoming.order_id,
            proposal_id: incoming.proposal_id,
            assets,
            timestamp,
        }
    }

    /// Build the start message accepting `incoming` with `assets`.
    pub fn start(
        trader_id: TraderId,
        assets: AssetPair,
        timestamp: Timestamp,
        incoming: &ProposedTrade,
    ) -> Self {
        ProposedTrade {
            trader_id,
            order_id: incoming.recipient_order_id,
            recipient_order_id: incoming.order_id,
            proposal_id: incoming.proposal_id,
            assets,
            timestamp,
        }
    }
}

impl fmt::Display for ProposedTrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trade {} between {} and {} ({})",
            self.proposal_id, self.order_id, self.recipient_order_id, self.assets
        )
    }
}

/// A declined trade, echoing the proposal it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclinedTrade {
    /// The sender of the decline.
    pub trader_id: TraderId,
    /// The declining side's order.
    pub order_id: OrderId,
    /// The proposer's order.
    pub recipient_order_id: OrderId,
    /// Scope of the declined negotiation attempt.
    pub proposal_id: u32,
    /// The pair from the declined proposal.
    pub assets: AssetPair,
    /// When the decline was created.
    pub timestamp: Timestamp,
    /// Why the proposal was declined.
    pub reason: DeclinedTradeReason,
}

impl DeclinedTrade {
    /// Build the decline answering `incoming`.
    pub fn decline(
        trader_id: TraderId,
        timestamp: Timestamp,
        incoming: &ProposedTrade,
        reason: DeclinedTradeReason,
    ) -> Self {
        DeclinedTrade {
            trader_id,
            order_id: incoming.recipient_order_id,
            recipient_order_id: incoming.order_id,
            proposal_id: incoming.proposal_id,
            assets: incoming.assets.clone(),
            timestamp,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetAmount;
    use crate::ids::OrderNumber;

    fn pair() -> AssetPair {
        AssetPair::new(AssetAmount::new(10, "BTC"), AssetAmount::new(30, "MB")).unwrap()
    }

    fn order_id(byte: u8, n: u32) -> OrderId {
        OrderId::new(TraderId::new([byte; 20]), OrderNumber::new(n))
    }

    #[test]
    fn counter_and_start_swap_sides_and_keep_proposal_id() {
        let alice = TraderId::new([1; 20]);
        let bob = TraderId::new([2; 20]);
        let proposal = ProposedTrade::propose(
            alice,
            order_id(1, 1),
            order_id(2, 1),
            pair(),
            Timestamp::now(),
        );

        let counter = ProposedTrade::counter(bob, pair(), Timestamp::now(), &proposal);
        assert_eq!(counter.order_id, proposal.recipient_order_id);
        assert_eq!(counter.recipient_order_id, proposal.order_id);
        assert_eq!(counter.proposal_id, proposal.proposal_id);

        let start = ProposedTrade::start(bob, pair(), Timestamp::now(), &proposal);
        assert_eq!(start.order_id, order_id(2, 1));
        assert_eq!(start.recipient_order_id, order_id(1, 1));
    }

    #[test]
    fn decline_echoes_the_proposal() {
        let proposal = ProposedTrade::propose(
            TraderId::new([1; 20]),
            order_id(1, 1),
            order_id(2, 1),
            pair(),
            Timestamp::now(),
        );
        let declined = DeclinedTrade::decline(
            TraderId::new([2; 20]),
            Timestamp::now(),
            &proposal,
            DeclinedTradeReason::OrderReserved,
        );
        assert_eq!(declined.proposal_id, proposal.proposal_id);
        assert_eq!(declined.recipient_order_id, proposal.order_id);
        assert_eq!(declined.assets, proposal.assets);
    }

    #[test]
    fn reasons_round_trip_the_wire() {
        for value in 0..10 {
            let reason = DeclinedTradeReason::from_wire(value).unwrap();
            assert_eq!(reason.to_wire(), value);
        }
        assert!(DeclinedTradeReason::from_wire(10).is_none());
        for value in 0..4 {
            let reason = DeclineMatchReason::from_wire(value).unwrap();
            assert_eq!(reason.to_wire(), value);
        }
        assert!(DeclineMatchReason::from_wire(4).is_none());
    }
}
