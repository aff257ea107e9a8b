//! Exact rational prices.
//!
//! A price expresses the second asset of a pair in units of the first
//! (e.g. `0.3 MB/BTC`). It is kept as an exact `num/denom` fraction so two
//! asset pairs that reduce to the same ratio land in the same price level,
//! regardless of their absolute amounts.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Tolerance used when comparing the float projections of two prices.
/// Rationals that round to the same quote within this bound are treated as
/// equal by the matching and negotiation layers.
pub const PRICE_TOLERANCE: f64 = 1e-4;

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

/// An exact rational price: `num` units of `num_asset` per `denom` units
/// of `denom_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    num: u64,
    denom: u64,
    num_asset: String,
    denom_asset: String,
}

impl Price {
    /// Build a price from a raw fraction. The fraction is reduced so that
    /// equal ratios compare equal.
    pub fn new(num: u64, denom: u64, num_asset: &str, denom_asset: &str) -> Self {
        let d = gcd(num, denom);
        Price {
            num: num / d,
            denom: denom / d,
            num_asset: num_asset.to_string(),
            denom_asset: denom_asset.to_string(),
        }
    }

    /// Numerator of the reduced fraction.
    pub fn num(&self) -> u64 {
        self.num
    }

    /// Denominator of the reduced fraction.
    pub fn denom(&self) -> u64 {
        self.denom
    }

    /// The asset the price is quoted in.
    pub fn num_asset(&self) -> &str {
        &self.num_asset
    }

    /// The asset the price is quoted against.
    pub fn denom_asset(&self) -> &str {
        &self.denom_asset
    }

    /// Float projection of the fraction, for display and tolerance checks.
    pub fn as_f64(&self) -> f64 {
        if self.denom == 0 {
            return 0.0;
        }
        self.num as f64 / self.denom as f64
    }

    /// Whether the float projections of two prices differ by less than
    /// [`PRICE_TOLERANCE`].
    pub fn nearly_equals(&self, other: &Price) -> bool {
        (self.as_f64() - other.as_f64()).abs() < PRICE_TOLERANCE
    }

    /// Whether two prices quote the same market.
    pub fn same_market(&self, other: &Price) -> bool {
        self.num_asset == other.num_asset && self.denom_asset == other.denom_asset
    }

    /// Ordering key within a single market.
    pub fn key(&self) -> PriceKey {
        PriceKey {
            num: self.num,
            denom: self.denom,
        }
    }
}

impl PartialOrd for Price {
    /// Prices are only ordered against prices of the same market.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.same_market(other) {
            return None;
        }
        Some(self.key().cmp(&other.key()))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.as_f64(),
            self.num_asset,
            self.denom_asset
        )
    }
}

/// The asset-free ordering key of a price: a reduced fraction with a total
/// order by cross-multiplication. Used to key price ladders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceKey {
    num: u64,
    denom: u64,
}

impl PriceKey {
    /// Float projection, mirroring [`Price::as_f64`].
    pub fn as_f64(&self) -> f64 {
        if self.denom == 0 {
            return 0.0;
        }
        self.num as f64 / self.denom as f64
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as u128 * other.denom as u128;
        let rhs = other.num as u128 * self.denom as u128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratios_compare_equal() {
        let a = Price::new(30, 100, "MB", "BTC");
        let b = Price::new(3, 10, "MB", "BTC");
        assert_eq!(a, b);
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Equal));
    }

    #[test]
    fn ordering_by_cross_multiplication() {
        let cheap = Price::new(1, 4, "MB", "BTC");
        let dear = Price::new(1, 2, "MB", "BTC");
        assert!(cheap < dear);
        assert!(cheap.key() < dear.key());
    }

    #[test]
    fn different_markets_do_not_compare() {
        let a = Price::new(1, 2, "MB", "BTC");
        let b = Price::new(1, 2, "EUR", "BTC");
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn tolerance_covers_rounding_noise() {
        let a = Price::new(100_000, 300_000, "MB", "BTC");
        let b = Price::new(33_333, 99_999, "MB", "BTC");
        assert!(a.nearly_equals(&b));
    }
}
