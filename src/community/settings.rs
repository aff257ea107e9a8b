//! Deployment-tunable market settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the orderbook sync loop picks its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// No periodic synchronization.
    None,
    /// Sync with a random known matchmaker (or the fixed set).
    Neighbours,
}

/// How broadcast peers are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisseminationPolicy {
    /// Sample from currently connected verified peers.
    Neighbours,
    /// Sample from known matchmakers.
    Random,
}

/// The recognized configuration options of the market community.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    /// Broadcast sample size.
    pub fanout: usize,
    /// How long incoming matches are coalesced before dispatching
    /// proposals (zero means immediate).
    pub match_window: Duration,
    /// Random upper bound on the delay of an outgoing match message, to
    /// avoid bursting a peer.
    pub match_send_interval: Duration,
    /// Maximum outgoing proposals per match-cache wake.
    pub match_process_batch_size: usize,
    /// Maximum ticks returned per sync round.
    pub num_order_sync: usize,
    /// Seconds between sync attempts (matchmaker only).
    pub sync_interval: Duration,
    /// The sync policy.
    pub sync_policy: SyncPolicy,
    /// The dissemination policy.
    pub dissemination_policy: DisseminationPolicy,
    /// Enforce one outstanding trade per counterparty via the clearing
    /// policy.
    pub single_trade: bool,
    /// On an incoming tick, try matching our own orders before the tick.
    pub first_matches_own_orders: bool,
    /// Lifetime of an outstanding trade proposal.
    pub proposal_timeout: Duration,
    /// Lifetime of an outstanding ping.
    pub ping_timeout: Duration,
}

impl Default for MarketSettings {
    fn default() -> Self {
        MarketSettings {
            fanout: 20,
            match_window: Duration::ZERO,
            match_send_interval: Duration::ZERO,
            match_process_batch_size: 20,
            num_order_sync: 10,
            sync_interval: Duration::from_secs(30),
            sync_policy: SyncPolicy::Neighbours,
            dissemination_policy: DisseminationPolicy::Neighbours,
            single_trade: true,
            first_matches_own_orders: false,
            proposal_timeout: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_expectations() {
        let settings = MarketSettings::default();
        assert_eq!(settings.fanout, 20);
        assert_eq!(settings.match_process_batch_size, 20);
        assert_eq!(settings.num_order_sync, 10);
        assert!(settings.single_trade);
        assert_eq!(settings.proposal_timeout, Duration::from_secs(5));
    }

    #[test]
    fn settings_load_from_config_json() {
        let settings: MarketSettings = serde_json::from_str(
            r#"{
                "fanout": 5,
                "sync_policy": "none",
                "dissemination_policy": "random",
                "single_trade": false
            }"#,
        )
        .unwrap();
        assert_eq!(settings.fanout, 5);
        assert_eq!(settings.sync_policy, SyncPolicy::None);
        assert_eq!(settings.dissemination_policy, DisseminationPolicy::Random);
        assert!(!settings.single_trade);
        // Unspecified options keep their defaults.
        assert_eq!(settings.num_order_sync, 10);
    }
}
