//! Settling trades: the transaction accumulator and its payments.

use crate::assets::{AssetAmount, AssetPair};
use crate::clock::Timestamp;
use crate::ids::{OrderId, TraderId, TransactionId};
use crate::trade::ProposedTrade;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// A single confirmed asset transfer belonging to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    /// The trader that performed the transfer.
    pub trader_id: TraderId,
    /// The transaction this payment settles a leg of.
    pub transaction_id: TransactionId,
    /// What was transferred.
    pub transferred: AssetAmount,
    /// Source wallet address.
    pub address_from: String,
    /// Destination wallet address.
    pub address_to: String,
    /// The wallet-level transfer identifier.
    pub payment_id: String,
    /// When the payment was confirmed.
    pub timestamp: Timestamp,
}

/// The lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Some leg has not been fully transferred yet.
    Pending,
    /// Both legs are fully transferred.
    Completed,
}

/// A trade being settled between two orders. Accumulates payments until
/// both legs of the agreed pair have been transferred.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    transaction_id: TransactionId,
    assets: AssetPair,
    transferred: AssetPair,
    order_id: OrderId,
    partner_order_id: OrderId,
    proposal_id: u32,
    timestamp: Timestamp,
    payments: Vec<Payment>,
}

impl Transaction {
    /// Build a transaction for an accepted trade. `order_id` is the local
    /// order, `partner_order_id` the counterparty's.
    pub fn new(
        transaction_id: TransactionId,
        assets: AssetPair,
        order_id: OrderId,
        partner_order_id: OrderId,
        proposal_id: u32,
        timestamp: Timestamp,
    ) -> Self {
        let transferred = AssetPair::new(
            AssetAmount::new(0, assets.first().asset_id()),
            AssetAmount::new(0, assets.second().asset_id()),
        )
        .expect("zeroed pair preserves canonical order");
        Transaction {
            transaction_id,
            assets,
            transferred,
            order_id,
            partner_order_id,
            proposal_id,
            timestamp,
            payments: Vec::new(),
        }
    }

    /// Build the transaction agreed by a start-trade message, as seen by
    /// the side owning `own_order_id`.
    pub fn from_accepted_trade(trade: &ProposedTrade, own_order_id: OrderId) -> Self {
        let partner = if trade.order_id == own_order_id {
            trade.recipient_order_id
        } else {
            trade.order_id
        };
        let transaction_id = TransactionId::for_trade(
            &trade.order_id,
            &trade.recipient_order_id,
            trade.proposal_id,
            trade.assets.first().amount(),
            trade.assets.first().asset_id(),
            trade.assets.second().amount(),
            trade.assets.second().asset_id(),
            trade.timestamp.millis(),
        );
        Transaction::new(
            transaction_id,
            trade.assets.clone(),
            own_order_id,
            partner,
            trade.proposal_id,
            trade.timestamp,
        )
    }

    /// The transaction's content-hash identity.
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// The agreed pair.
    pub fn assets(&self) -> &AssetPair {
        &self.assets
    }

    /// What has been transferred so far, per leg.
    pub fn transferred(&self) -> &AssetPair {
        &self.transferred
    }

    /// The local order.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// The counterparty's order.
    pub fn partner_order_id(&self) -> OrderId {
        self.partner_order_id
    }

    /// The proposal that negotiated this transaction.
    pub fn proposal_id(&self) -> u32 {
        self.proposal_id
    }

    /// When the trade was agreed.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The payments recorded so far.
    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    /// The amount this side still has to send: the first leg for an ask,
    /// the second for a bid.
    pub fn next_payment(&self, order_is_ask: bool) -> AssetAmount {
        if order_is_ask {
            self.assets.first().clone()
        } else {
            self.assets.second().clone()
        }
    }

    /// Record a confirmed payment, advancing the matching leg.
    pub fn add_payment(&mut self, payment: Payment) {
        debug!(
            transaction_id = %self.transaction_id,
            transferred = %payment.transferred,
            "adding payment"
        );
        let first = self.transferred.first().clone();
        let second = self.transferred.second().clone();
        if payment.transferred.asset_id() == first.asset_id() {
            let advanced = first
                .checked_add(&payment.transferred)
                .expect("first leg overflow");
            self.transferred = AssetPair::new(advanced, second)
                .expect("leg advance preserves canonical order");
        } else {
            let advanced = second
                .checked_add(&payment.transferred)
                .expect("second leg overflow");
            self.transferred = AssetPair::new(first, advanced)
                .expect("leg advance preserves canonical order");
        }
        self.payments.push(payment);
    }

    /// Whether both legs have reached the agreed amounts.
    pub fn is_payment_complete(&self) -> bool {
        self.transferred.first().amount() >= self.assets.first().amount()
            && self.transferred.second().amount() >= self.assets.second().amount()
    }

    /// The derived status.
    pub fn status(&self) -> TransactionStatus {
        if self.is_payment_complete() {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Pending
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transaction {} ({} / {}): {}",
            self.transaction_id.as_hex(),
            self.order_id,
            self.partner_order_id,
            self.assets
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::OrderNumber;

    fn order_id(byte: u8, n: u32) -> OrderId {
        OrderId::new(TraderId::new([byte; 20]), OrderNumber::new(n))
    }

    fn pair(a: u64, b: u64) -> AssetPair {
        AssetPair::new(AssetAmount::new(a, "BTC"), AssetAmount::new(b, "MB")).unwrap()
    }

    fn transaction() -> Transaction {
        Transaction::new(
            TransactionId::new([0; 32]),
            pair(10, 30),
            order_id(1, 1),
            order_id(2, 1),
            7,
            Timestamp::now(),
        )
    }

    fn payment(transferred: AssetAmount) -> Payment {
        Payment {
            trader_id: TraderId::new([1; 20]),
            transaction_id: TransactionId::new([0; 32]),
            transferred,
            address_from: "a".to_string(),
            address_to: "b".to_string(),
            payment_id: "p".to_string(),
            timestamp: Timestamp::now(),
        }
    }

    #[test]
    fn payments_advance_their_leg() {
        let mut tx = transaction();
        assert_eq!(tx.status(), TransactionStatus::Pending);

        tx.add_payment(payment(AssetAmount::new(10, "BTC")));
        assert_eq!(tx.transferred().first().amount(), 10);
        assert_eq!(tx.transferred().second().amount(), 0);
        assert!(!tx.is_payment_complete());

        tx.add_payment(payment(AssetAmount::new(30, "MB")));
        assert!(tx.is_payment_complete());
        assert_eq!(tx.status(), TransactionStatus::Completed);
        assert_eq!(tx.payments().len(), 2);
    }

    #[test]
    fn next_payment_depends_on_side() {
        let tx = transaction();
        assert_eq!(tx.next_payment(true), AssetAmount::new(10, "BTC"));
        assert_eq!(tx.next_payment(false), AssetAmount::new(30, "MB"));
    }

    #[test]
    fn both_sides_agree_on_the_transaction_id() {
        let trade = ProposedTrade::propose(
            TraderId::new([1; 20]),
            order_id(1, 1),
            order_id(2, 1),
            pair(10, 30),
            Timestamp::now(),
        );
        let mine = Transaction::from_accepted_trade(&trade, order_id(1, 1));
        let theirs = Transaction::from_accepted_trade(&trade, order_id(2, 1));
        assert_eq!(mine.transaction_id(), theirs.transaction_id());
        assert_eq!(mine.partner_order_id(), order_id(2, 1));
        assert_eq!(theirs.partner_order_id(), order_id(1, 1));
    }
}
