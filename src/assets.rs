//! Asset amounts and canonical asset pairs.

use crate::price::Price;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Errors raised by asset arithmetic and pair construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssetError {
    /// Arithmetic or comparison between two different asset types.
    AssetMismatch {
        /// Asset id of the left operand.
        left: String,
        /// Asset id of the right operand.
        right: String,
    },

    /// Subtraction would produce a negative amount.
    NegativeAmount {
        /// The amount being subtracted from.
        amount: u64,
        /// The amount being subtracted.
        subtracted: u64,
    },

    /// Addition overflowed the integer amount.
    AmountOverflow,

    /// A pair was built with its legs out of canonical order.
    NonCanonicalPair {
        /// Asset id of the first leg.
        first: String,
        /// Asset id of the second leg.
        second: String,
    },

    /// A proportional downscale was asked for a zero-quantity leg.
    EmptyLeg,
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::AssetMismatch { left, right } => {
                write!(f, "asset mismatch: {left} vs {right}")
            }
            AssetError::NegativeAmount { amount, subtracted } => {
                write!(f, "cannot subtract {subtracted} from {amount}")
            }
            AssetError::AmountOverflow => write!(f, "asset amount overflow"),
            AssetError::NonCanonicalPair { first, second } => {
                write!(f, "asset pair not canonical: {first} must sort before {second}")
            }
            AssetError::EmptyLeg => write!(f, "cannot downscale a zero-quantity leg"),
        }
    }
}

impl std::error::Error for AssetError {}

/// A specific quantity of one asset, counted in the asset's smallest unit
/// (e.g. satoshi). Arithmetic is only defined between equal asset types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetAmount {
    amount: u64,
    #[serde(rename = "type")]
    asset_id: String,
}

impl AssetAmount {
    /// Build an amount of `asset_id`.
    pub fn new(amount: u64, asset_id: &str) -> Self {
        AssetAmount {
            amount,
            asset_id: asset_id.to_string(),
        }
    }

    /// The integer amount in smallest units.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// The asset type identifier.
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    fn require_same_asset(&self, other: &AssetAmount) -> Result<(), AssetError> {
        if self.asset_id != other.asset_id {
            return Err(AssetError::AssetMismatch {
                left: self.asset_id.clone(),
                right: other.asset_id.clone(),
            });
        }
        Ok(())
    }

    /// Add two amounts of the same asset.
    pub fn checked_add(&self, other: &AssetAmount) -> Result<AssetAmount, AssetError> {
        self.require_same_asset(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(AssetError::AmountOverflow)?;
        Ok(AssetAmount::new(amount, &self.asset_id))
    }

    /// Subtract two amounts of the same asset.
    pub fn checked_sub(&self, other: &AssetAmount) -> Result<AssetAmount, AssetError> {
        self.require_same_asset(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(AssetError::NegativeAmount {
                amount: self.amount,
                subtracted: other.amount,
            })?;
        Ok(AssetAmount::new(amount, &self.asset_id))
    }
}

impl PartialOrd for AssetAmount {
    /// Amounts of different assets are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.asset_id != other.asset_id {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset_id)
    }
}

/// A pair of asset amounts, i.e. `10 BTC` against `30 MB`.
///
/// The pair is canonical: the first leg's asset id sorts lexicographically
/// before the second's, so `BTC/MB` and `MB/BTC` denote one market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPair {
    first: AssetAmount,
    second: AssetAmount,
}

impl AssetPair {
    /// Build a canonical pair. Fails when the legs are out of order or
    /// name the same asset.
    pub fn new(first: AssetAmount, second: AssetAmount) -> Result<Self, AssetError> {
        if first.asset_id() >= second.asset_id() {
            return Err(AssetError::NonCanonicalPair {
                first: first.asset_id().to_string(),
                second: second.asset_id().to_string(),
            });
        }
        Ok(AssetPair { first, second })
    }

    /// Build a pair from a price and a first-leg quantity. The second leg
    /// is the price applied to the quantity, rounded down to whole units.
    pub fn from_price(price: &Price, first_amount: u64) -> Result<Self, AssetError> {
        let second_amount = if price.denom() == 0 {
            0
        } else {
            (price.num() as u128 * first_amount as u128 / price.denom() as u128) as u64
        };
        AssetPair::new(
            AssetAmount::new(first_amount, price.denom_asset()),
            AssetAmount::new(second_amount, price.num_asset()),
        )
    }

    /// The first leg.
    pub fn first(&self) -> &AssetAmount {
        &self.first
    }

    /// The second leg.
    pub fn second(&self) -> &AssetAmount {
        &self.second
    }

    /// The price of this pair: the second asset expressed in the first.
    pub fn price(&self) -> Price {
        Price::new(
            self.second.amount(),
            self.first.amount(),
            self.second.asset_id(),
            self.first.asset_id(),
        )
    }

    /// Scale the pair down to `first` units of the first leg, preserving
    /// the rational price.
    pub fn proportional_downscale_first(&self, first: u64) -> Result<AssetPair, AssetError> {
        if self.first.amount() == 0 {
            return Err(AssetError::EmptyLeg);
        }
        let second =
            (self.second.amount() as u128 * first as u128 / self.first.amount() as u128) as u64;
        AssetPair::new(
            AssetAmount::new(first, self.first.asset_id()),
            AssetAmount::new(second, self.second.asset_id()),
        )
    }

    /// Scale the pair down to `second` units of the second leg, preserving
    /// the rational price.
    pub fn proportional_downscale_second(&self, second: u64) -> Result<AssetPair, AssetError> {
        if self.second.amount() == 0 {
            return Err(AssetError::EmptyLeg);
        }
        let first =
            (self.first.amount() as u128 * second as u128 / self.second.amount() as u128) as u64;
        AssetPair::new(
            AssetAmount::new(first, self.first.asset_id()),
            AssetAmount::new(second, self.second.asset_id()),
        )
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first, self.second)
    }
}
