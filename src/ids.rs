//! Identifiers for traders, orders and transactions.
//!
//! A [`TraderId`] is the 20-byte peer identity derived from the sender's
//! public key. Orders are globally identified by the pair
//! `(trader_id, order_number)`; transactions by a 32-byte content hash.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// The 20-byte identity of a trader peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraderId([u8; 20]);

impl TraderId {
    /// Wrap raw identity bytes.
    pub fn new(bytes: [u8; 20]) -> Self {
        TraderId(bytes)
    }

    /// Derive the trader identity from a public key (truncated SHA-256).
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        TraderId(bytes)
    }

    /// The raw identity bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Hex rendering of the identity, used in logs and reporting.
    pub fn as_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl TryFrom<&[u8]> for TraderId {
    type Error = InvalidIdLength;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 20] = value.try_into().map_err(|_| InvalidIdLength {
            expected: 20,
            actual: value.len(),
        })?;
        Ok(TraderId(bytes))
    }
}

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Serialize for TraderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for TraderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = from_hex(&s).ok_or_else(|| D::Error::custom("invalid hex trader id"))?;
        TraderId::try_from(bytes.as_slice()).map_err(D::Error::custom)
    }
}

/// An identifier has the wrong number of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidIdLength {
    /// The required length in bytes.
    pub expected: usize,
    /// The length that was supplied.
    pub actual: usize,
}

impl fmt::Display for InvalidIdLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "identifier must be {} bytes, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for InvalidIdLength {}

/// The per-trader sequence number of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderNumber(u32);

impl OrderNumber {
    /// Wrap a raw order number.
    pub fn new(number: u32) -> Self {
        OrderNumber(number)
    }

    /// The raw number.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for OrderNumber {
    fn from(number: u32) -> Self {
        OrderNumber(number)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The globally unique identity of an order: owning trader plus sequence
/// number. An order is identified solely by this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId {
    /// The trader that owns the order.
    pub trader_id: TraderId,
    /// The trader-local sequence number.
    pub order_number: OrderNumber,
}

impl OrderId {
    /// Build an order id from its parts.
    pub fn new(trader_id: TraderId, order_number: OrderNumber) -> Self {
        OrderId {
            trader_id,
            order_number,
        }
    }

    /// A stable byte rendering, used as the Bloom filter key during
    /// orderbook synchronization.
    pub fn to_key(&self) -> Vec<u8> {
        format!("{self}").into_bytes()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.trader_id.as_hex(), self.order_number)
    }
}

/// The 32-byte content hash identifying a settling transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    /// Wrap raw hash bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        TransactionId(bytes)
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex rendering of the hash.
    pub fn as_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Derive the transaction identity for a negotiated trade.
    ///
    /// Both parties hash the canonical start-trade tuple so the identity
    /// agrees bilaterally without a further message. The two order ids are
    /// fed in sorted order to make the hash symmetric.
    pub fn for_trade(
        a: &OrderId,
        b: &OrderId,
        proposal_id: u32,
        first_amount: u64,
        first_asset: &str,
        second_amount: u64,
        second_asset: &str,
        timestamp_millis: u64,
    ) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update(lo.trader_id.as_bytes());
        hasher.update(lo.order_number.value().to_be_bytes());
        hasher.update(hi.trader_id.as_bytes());
        hasher.update(hi.order_number.value().to_be_bytes());
        hasher.update(proposal_id.to_be_bytes());
        hasher.update(first_amount.to_be_bytes());
        hasher.update(first_asset.as_bytes());
        hasher.update(second_amount.to_be_bytes());
        hasher.update(second_asset.as_bytes());
        hasher.update(timestamp_millis.to_be_bytes());
        TransactionId(hasher.finalize().into())
    }
}

impl TryFrom<&[u8]> for TransactionId {
    type Error = InvalidIdLength;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 32] = value.try_into().map_err(|_| InvalidIdLength {
            expected: 32,
            actual: value.len(),
        })?;
        Ok(TransactionId(bytes))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = from_hex(&s).ok_or_else(|| D::Error::custom("invalid hex transaction id"))?;
        TransactionId::try_from(bytes.as_slice()).map_err(D::Error::custom)
    }
}
