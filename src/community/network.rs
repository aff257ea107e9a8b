//! Transport and discovery seams.
//!
//! The peer-to-peer substrate is an external collaborator: the community
//! only needs an outbound [`MessageGateway`] and an [`AddressResolver`]
//! standing in for the DHT's `trader_id -> address` lookup. The in-memory
//! implementations wire peers together for tests and local runs.

use crate::ids::TraderId;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// A reachable peer: identity plus network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    /// The peer's trader identity.
    pub trader_id: TraderId,
    /// Where the peer can be reached.
    pub address: SocketAddr,
}

/// Outbound message transport. Delivery is best-effort and authenticated
/// by the substrate; the community never retries sends.
pub trait MessageGateway: Send + Sync {
    /// Send an encoded packet to `address`.
    fn send(&self, address: SocketAddr, packet: Bytes);
}

/// DHT-backed resolution of a trader id to a network address.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve `trader_id`, returning `None` when the peer is unknown.
    async fn resolve(&self, trader_id: &TraderId) -> Option<SocketAddr>;
}

/// An in-process message network: registered inboxes keyed by address,
/// plus a trader-id register serving as the DHT stand-in.
pub struct MemoryNetwork {
    inboxes: DashMap<SocketAddr, mpsc::UnboundedSender<(SocketAddr, Bytes)>>,
    dht: DashMap<TraderId, SocketAddr>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryNetwork {
            inboxes: DashMap::new(),
            dht: DashMap::new(),
        })
    }

    /// Register an inbox for `address`, returning its receiving end.
    pub fn register(&self, address: SocketAddr) -> mpsc::UnboundedReceiver<(SocketAddr, Bytes)> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inboxes.insert(address, sender);
        receiver
    }

    /// Publish a trader's address into the stand-in DHT.
    pub fn announce(&self, trader_id: TraderId, address: SocketAddr) {
        self.dht.insert(trader_id, address);
    }

    /// A gateway sending on behalf of `local`.
    pub fn gateway(self: &Arc<Self>, local: SocketAddr) -> Arc<MemoryGateway> {
        Arc::new(MemoryGateway {
            network: self.clone(),
            local,
        })
    }

    fn deliver(&self, from: SocketAddr, to: SocketAddr, packet: Bytes) {
        match self.inboxes.get(&to) {
            Some(inbox) => {
                if inbox.send((from, packet)).is_err() {
                    warn!(%to, "inbox closed, dropping packet");
                }
            }
            None => warn!(%to, "no inbox registered, dropping packet"),
        }
    }
}

/// The sending half of a [`MemoryNetwork`] for one local address.
pub struct MemoryGateway {
    network: Arc<MemoryNetwork>,
    local: SocketAddr,
}

impl MessageGateway for MemoryGateway {
    fn send(&self, address: SocketAddr, packet: Bytes) {
        self.network.deliver(self.local, address, packet);
    }
}

#[async_trait]
impl AddressResolver for MemoryNetwork {
    async fn resolve(&self, trader_id: &TraderId) -> Option<SocketAddr> {
        self.dht.get(trader_id).map(|entry| *entry.value())
    }
}
