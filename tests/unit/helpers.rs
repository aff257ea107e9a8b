//! Multi-peer wiring over the in-memory network.

use anydex::prelude::*;
use bytes::Bytes;
use rand::RngCore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One peer in a test network.
pub struct TestNode {
    pub community: Arc<MarketCommunity>,
    pub address: SocketAddr,
    pub public_key: Vec<u8>,
}

impl TestNode {
    pub fn order(&self, order_id: &OrderId) -> Order {
        self.community
            .order_manager()
            .repository()
            .find_by_id(order_id)
            .expect("order present")
    }

    pub async fn balance(&self, asset: &str) -> u64 {
        self.community
            .trading_engine()
            .wallet(asset)
            .expect("wallet registered")
            .get_balance()
            .await
            .expect("balance")
            .available
    }
}

/// A growing set of peers sharing one in-memory network.
pub struct TestNet {
    pub network: Arc<MemoryNetwork>,
    next_port: u16,
}

impl TestNet {
    pub fn new() -> Self {
        TestNet {
            network: MemoryNetwork::new(),
            next_port: 20_000,
        }
    }

    /// Spawn a node and return it together with its unstarted inbox, so
    /// tests can interpose on delivery.
    pub fn spawn_node_manual(
        &mut self,
        is_matchmaker: bool,
        settings: MarketSettings,
    ) -> (TestNode, mpsc::UnboundedReceiver<(SocketAddr, Bytes)>) {
        self.next_port += 1;
        let address: SocketAddr = format!("127.0.0.1:{}", self.next_port).parse().unwrap();
        let inbox = self.network.register(address);

        let trading_engine = TradingEngine::new();
        trading_engine.register_wallet(Arc::new(
            DummyWallet::new("DUM1", "Dummy 1", 1000)
                .with_monitor_delay(Duration::from_millis(20)),
        ));
        trading_engine.register_wallet(Arc::new(
            DummyWallet::new("DUM2", "Dummy 2", 10000)
                .with_monitor_delay(Duration::from_millis(20)),
        ));

        let mut public_key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut public_key);

        let community = MarketCommunity::new(CommunityConfig {
            public_key: public_key.clone(),
            address,
            settings,
            gateway: self.network.gateway(address),
            resolver: self.network.clone(),
            trading_engine,
            is_matchmaker,
        });
        self.network.announce(community.mid(), address);

        (
            TestNode {
                community,
                address,
                public_key,
            },
            inbox,
        )
    }

    /// Spawn a node with its inbox loop running.
    pub fn spawn_node(&mut self, is_matchmaker: bool, settings: MarketSettings) -> TestNode {
        let (node, inbox) = self.spawn_node_manual(is_matchmaker, settings);
        node.community.start(inbox);
        node
    }
}

/// Make every node know every other node's address (and matchmaker role),
/// the way the discovery substrate would.
pub fn introduce(nodes: &[&TestNode]) {
    for a in nodes {
        for b in nodes {
            if a.address == b.address {
                continue;
            }
            a.community.update_ip(b.community.mid(), b.address);
            if b.community.is_matchmaker() {
                a.community.add_matchmaker(b.community.mid(), b.address);
            }
        }
    }
}

pub fn dummy_pair(first: u64, second: u64) -> AssetPair {
    AssetPair::new(
        AssetAmount::new(first, "DUM1"),
        AssetAmount::new(second, "DUM2"),
    )
    .unwrap()
}

pub fn fast_settings() -> MarketSettings {
    MarketSettings {
        proposal_timeout: Duration::from_millis(500),
        ping_timeout: Duration::from_millis(300),
        sync_policy: SyncPolicy::None,
        ..MarketSettings::default()
    }
}
