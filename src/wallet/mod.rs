//! Per-asset wallet adapters.
//!
//! Asset custody is an external concern: every currency integrates by
//! implementing the [`Wallet`] trait, and the settlement driver only ever
//! talks to that interface. Amounts crossing the boundary are integers in
//! the asset's smallest unit.

mod dummy;

pub use dummy::DummyWallet;

use crate::clock::Timestamp;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by wallet adapters.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum WalletError {
    /// `create_wallet` was called for an already existing wallet.
    #[error("wallet already exists")]
    AlreadyExists,

    /// A transfer exceeds the available balance.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Amount that was requested.
        requested: u64,
        /// Amount that was available.
        available: u64,
    },

    /// The adapter's backend failed.
    #[error("wallet backend error: {0}")]
    Backend(String),
}

/// A wallet's balance snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletBalance {
    /// Confirmed spendable amount, in smallest units.
    pub available: u64,
    /// Amount awaiting confirmation.
    pub pending: u64,
    /// The asset identifier (e.g. `BTC`).
    pub currency: String,
    /// Display precision in decimal digits.
    pub precision: u32,
}

/// One entry of a wallet's transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletTransaction {
    /// The adapter-level transaction identifier.
    pub id: String,
    /// Whether the transfer left this wallet.
    pub outgoing: bool,
    /// Source address.
    pub from: String,
    /// Destination address.
    pub to: String,
    /// Transferred amount in smallest units.
    pub amount: u64,
    /// Fee paid, in smallest units.
    pub fee_amount: u64,
    /// The asset identifier.
    pub currency: String,
    /// When the adapter observed the transfer.
    pub timestamp: Timestamp,
    /// Free-form description.
    pub description: String,
}

/// The uniform custody interface per asset.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Short asset identifier, e.g. `BTC`.
    fn get_identifier(&self) -> &str;

    /// Human-readable wallet name.
    fn get_name(&self) -> &str;

    /// Create the underlying wallet.
    async fn create_wallet(&self) -> Result<(), WalletError>;

    /// The current balance.
    async fn get_balance(&self) -> Result<WalletBalance, WalletError>;

    /// Transfer `amount` smallest units to `address`, returning the
    /// adapter-level transaction id.
    async fn transfer(&self, amount: u64, address: &str) -> Result<String, WalletError>;

    /// This wallet's receive address.
    fn get_address(&self) -> String;

    /// The transaction history.
    async fn get_transactions(&self) -> Result<Vec<WalletTransaction>, WalletError>;

    /// The smallest transferable amount.
    fn min_unit(&self) -> u64;

    /// Display precision in decimal digits.
    fn precision(&self) -> u32;

    /// Resolve once `tx_id` shows up in the wallet's transaction list,
    /// polling every `interval`.
    async fn monitor_transaction(
        &self,
        tx_id: &str,
        interval: Duration,
    ) -> Result<(), WalletError> {
        loop {
            let transactions = self.get_transactions().await?;
            if transactions.iter().any(|tx| tx.id == tx_id) {
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }
    }
}
