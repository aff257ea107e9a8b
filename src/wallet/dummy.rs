//! An in-memory wallet for tests and local experimentation.

use super::{Wallet, WalletBalance, WalletError, WalletTransaction};
use crate::clock::Timestamp;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// A dummy wallet holding an in-memory balance.
///
/// The transfer id it returns encodes the transferred amount, and
/// monitoring an id credits that amount after a short delay. That lets
/// two isolated dummy wallets emulate a bilateral exchange without a
/// shared chain.
pub struct DummyWallet {
    identifier: String,
    name: String,
    address: String,
    monitor_delay: Duration,
    state: Mutex<DummyState>,
}

struct DummyState {
    balance: u64,
    history: Vec<WalletTransaction>,
}

impl DummyWallet {
    /// Create a wallet for `identifier` with an initial balance.
    pub fn new(identifier: &str, name: &str, balance: u64) -> Self {
        let mut rng = rand::thread_rng();
        let address: String = (0..10)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect();
        DummyWallet {
            identifier: identifier.to_string(),
            name: name.to_string(),
            address,
            monitor_delay: Duration::from_millis(100),
            state: Mutex::new(DummyState {
                balance,
                history: Vec::new(),
            }),
        }
    }

    /// Override the delay before a monitored transaction confirms.
    pub fn with_monitor_delay(mut self, delay: Duration) -> Self {
        self.monitor_delay = delay;
        self
    }
}

#[async_trait]
impl Wallet for DummyWallet {
    fn get_identifier(&self) -> &str {
        &self.identifier
    }

    fn get_name(&self) -> &str {
        &self.name
    }

    async fn create_wallet(&self) -> Result<(), WalletError> {
        Err(WalletError::AlreadyExists)
    }

    async fn get_balance(&self) -> Result<WalletBalance, WalletError> {
        let state = self.state.lock().expect("dummy wallet lock poisoned");
        Ok(WalletBalance {
            available: state.balance,
            pending: 0,
            currency: self.identifier.clone(),
            precision: self.precision(),
        })
    }

    async fn transfer(&self, amount: u64, address: &str) -> Result<String, WalletError> {
        info!(
            amount,
            currency = %self.identifier,
            to = %address,
            "dummy wallet transfer"
        );
        let mut state = self.state.lock().expect("dummy wallet lock poisoned");
        if state.balance < amount {
            return Err(WalletError::InsufficientFunds {
                requested: amount,
                available: state.balance,
            });
        }
        state.balance -= amount;
        let id = amount.to_string();
        state.history.push(WalletTransaction {
            id: id.clone(),
            outgoing: true,
            from: self.address.clone(),
            to: address.to_string(),
            amount,
            fee_amount: 0,
            currency: self.identifier.clone(),
            timestamp: Timestamp::now(),
            description: String::new(),
        });
        Ok(id)
    }

    fn get_address(&self) -> String {
        self.address.clone()
    }

    async fn get_transactions(&self) -> Result<Vec<WalletTransaction>, WalletError> {
        let state = self.state.lock().expect("dummy wallet lock poisoned");
        Ok(state.history.clone())
    }

    fn min_unit(&self) -> u64 {
        1
    }

    fn precision(&self) -> u32 {
        0
    }

    async fn monitor_transaction(
        &self,
        tx_id: &str,
        _interval: Duration,
    ) -> Result<(), WalletError> {
        tokio::time::sleep(self.monitor_delay).await;
        // The id encodes the incoming amount.
        let amount: u64 = tx_id
            .parse()
            .map_err(|_| WalletError::Backend(format!("unparsable dummy tx id {tx_id}")))?;
        let mut state = self.state.lock().expect("dummy wallet lock poisoned");
        state.balance += amount;
        state.history.push(WalletTransaction {
            id: tx_id.to_string(),
            outgoing: false,
            from: String::new(),
            to: self.address.clone(),
            amount,
            fee_amount: 0,
            currency: self.identifier.clone(),
            timestamp: Timestamp::now(),
            description: String::new(),
        });
        Ok(())
    }
}
