//! The settlement driver: turns a started trade into wallet transfers.
//!
//! On a started trade both parties build the same [`Transaction`] (the
//! identity is a content hash of the start tuple), transfer their
//! outgoing leg through the matching wallet adapter and watch the
//! incoming leg via `monitor_transaction`. Each confirmed leg becomes a
//! [`Payment`]; once both legs are complete the community is told to
//! notify matchmakers and broadcast the completion. Everything is keyed
//! by `transaction_id`, so duplicate confirmations are no-ops.

mod clearing;

pub use clearing::{ClearingPolicy, SingleTradeClearingPolicy};

use crate::assets::AssetAmount;
use crate::clock::Timestamp;
use crate::community::MarketCommunity;
use crate::ids::{OrderId, TraderId, TransactionId};
use crate::trade::ProposedTrade;
use crate::transaction::{Payment, Transaction};
use crate::wallet::{Wallet, WalletError};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by the settlement driver.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettlementError {
    /// No wallet adapter is registered for an asset of the trade.
    #[error("no wallet registered for asset {0}")]
    MissingWallet(String),

    /// The wallet adapter failed; the transaction stays pending.
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Drives bilateral asset exchange through the registered wallet
/// adapters.
pub struct TradingEngine {
    wallets: DashMap<String, Arc<dyn Wallet>>,
    transactions: DashMap<TransactionId, Arc<Mutex<Transaction>>>,
    completed: DashMap<TransactionId, ()>,
    community: Mutex<Weak<MarketCommunity>>,
    monitor_interval: Duration,
}

impl TradingEngine {
    /// Create an engine with no wallets registered.
    pub fn new() -> Arc<Self> {
        Arc::new(TradingEngine {
            wallets: DashMap::new(),
            transactions: DashMap::new(),
            completed: DashMap::new(),
            community: Mutex::new(Weak::new()),
            monitor_interval: Duration::from_millis(100),
        })
    }

    /// Register the wallet adapter custodying its asset.
    pub fn register_wallet(&self, wallet: Arc<dyn Wallet>) {
        self.wallets
            .insert(wallet.get_identifier().to_string(), wallet);
    }

    /// The wallet for `asset_id`, if registered.
    pub fn wallet(&self, asset_id: &str) -> Option<Arc<dyn Wallet>> {
        self.wallets.get(asset_id).map(|entry| entry.value().clone())
    }

    /// Wire the community callback. Called once during community setup.
    pub fn attach_community(&self, community: &Arc<MarketCommunity>) {
        *self.community.lock().expect("community slot poisoned") = Arc::downgrade(community);
    }

    fn community(&self) -> Option<Arc<MarketCommunity>> {
        self.community
            .lock()
            .expect("community slot poisoned")
            .upgrade()
    }

    /// Snapshot of one transaction.
    pub fn find_transaction(&self, transaction_id: &TransactionId) -> Option<Transaction> {
        self.transactions.get(transaction_id).map(|entry| {
            entry
                .value()
                .lock()
                .expect("transaction lock poisoned")
                .clone()
        })
    }

    /// Snapshots of all known transactions.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .lock()
                    .expect("transaction lock poisoned")
                    .clone()
            })
            .collect()
    }

    /// Whether any transaction with `trader_id` is still settling. The
    /// single-trade clearing policy keys off this.
    pub fn has_pending_with(&self, trader_id: &TraderId) -> bool {
        self.transactions.iter().any(|entry| {
            let tx = entry.value().lock().expect("transaction lock poisoned");
            tx.partner_order_id().trader_id == *trader_id && !tx.is_payment_complete()
        })
    }

    /// Begin settling a started trade for the side owning
    /// `own_order_id`. Idempotent per derived transaction id.
    pub fn trade(self: &Arc<Self>, trade: &ProposedTrade, own_order_id: OrderId, own_is_ask: bool) {
        let transaction = Transaction::from_accepted_trade(trade, own_order_id);
        let transaction_id = transaction.transaction_id();
        if self.completed.contains_key(&transaction_id)
            || self.transactions.contains_key(&transaction_id)
        {
            debug!(%transaction_id, "trade already settling, ignoring duplicate start");
            return;
        }
        info!(
            %transaction_id,
            order_id = %own_order_id,
            partner = %transaction.partner_order_id(),
            "starting settlement"
        );
        let slot = Arc::new(Mutex::new(transaction));
        self.transactions.insert(transaction_id, slot.clone());

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(error) = engine.settle(transaction_id, slot, own_is_ask).await {
                warn!(%transaction_id, %error, "settlement stalled");
            }
        });
    }

    async fn settle(
        &self,
        transaction_id: TransactionId,
        slot: Arc<Mutex<Transaction>>,
        own_is_ask: bool,
    ) -> Result<(), SettlementError> {
        let (outgoing, incoming, own_order_id, partner_order_id) = {
            let tx = slot.lock().expect("transaction lock poisoned");
            let outgoing = tx.next_payment(own_is_ask);
            let incoming = if own_is_ask {
                tx.assets().second().clone()
            } else {
                tx.assets().first().clone()
            };
            (outgoing, incoming, tx.order_id(), tx.partner_order_id())
        };

        // Outgoing leg: transfer through our wallet.
        let wallet = self
            .wallet(outgoing.asset_id())
            .ok_or_else(|| SettlementError::MissingWallet(outgoing.asset_id().to_string()))?;
        let counterparty = partner_order_id.trader_id.as_hex();
        let payment_id = wallet.transfer(outgoing.amount(), &counterparty).await?;
        self.record_payment(
            &slot,
            Payment {
                trader_id: own_order_id.trader_id,
                transaction_id,
                transferred: outgoing.clone(),
                address_from: wallet.get_address(),
                address_to: counterparty.clone(),
                payment_id,
                timestamp: Timestamp::now(),
            },
            own_order_id,
            partner_order_id,
            &outgoing,
        );

        // Incoming leg: wait until our wallet observes the transfer.
        let incoming_wallet = self
            .wallet(incoming.asset_id())
            .ok_or_else(|| SettlementError::MissingWallet(incoming.asset_id().to_string()))?;
        let incoming_id = incoming.amount().to_string();
        incoming_wallet
            .monitor_transaction(&incoming_id, self.monitor_interval)
            .await?;
        self.record_payment(
            &slot,
            Payment {
                trader_id: partner_order_id.trader_id,
                transaction_id,
                transferred: incoming.clone(),
                address_from: counterparty,
                address_to: incoming_wallet.get_address(),
                payment_id: incoming_id,
                timestamp: Timestamp::now(),
            },
            own_order_id,
            partner_order_id,
            &incoming,
        );

        let snapshot = slot.lock().expect("transaction lock poisoned").clone();
        if snapshot.is_payment_complete() && self.completed.insert(transaction_id, ()).is_none() {
            info!(%transaction_id, "settlement complete");
            if let Some(community) = self.community() {
                community.on_transaction_completed(&snapshot);
            }
        }
        Ok(())
    }

    fn record_payment(
        &self,
        slot: &Arc<Mutex<Transaction>>,
        payment: Payment,
        own_order_id: OrderId,
        partner_order_id: OrderId,
        transferred: &AssetAmount,
    ) {
        slot.lock()
            .expect("transaction lock poisoned")
            .add_payment(payment);
        if let Some(community) = self.community() {
            community.on_payment(own_order_id, partner_order_id, transferred);
        }
    }
}
