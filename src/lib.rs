//! # AnyDex Core
//!
//! The core trading subsystem of a decentralized cryptocurrency exchange:
//! peers publish buy/sell orders for asset pairs, discover counterparties
//! through a gossiped order book maintained by *matchmaker* peers,
//! negotiate bilateral trades, and settle them via per-asset wallet
//! adapters.
//!
//! ## Architecture
//!
//! A peer plays two independent roles:
//!
//! - **Trader**: owns local [`Order`]s, serializes incoming match
//!   suggestions per order through a `MatchCache`, negotiates proposals
//!   (propose / counter / decline / start) and settles accepted trades
//!   through the [`settlement`] driver and [`wallet`] adapters.
//! - **Matchmaker**: replicates the global [`OrderBook`], runs the
//!   price-time [`matching`] engine on incoming ticks, notifies the
//!   involved traders of matches and keeps its replica converged through
//!   Bloom-filter orderbook sync.
//!
//! Both roles are composed into a [`MarketCommunity`]. The peer-to-peer
//! substrate is abstracted behind the `MessageGateway`/`AddressResolver`
//! seams; an in-memory implementation wires peers together for tests.
//!
//! ## Invariants
//!
//! The crate's central guarantees:
//!
//! - An order's quantity is never double-spent:
//!   `available + reserved + traded = total` at all times, and every
//!   reservation is released on exactly one of decline, timeout, or
//!   trade completion.
//! - Matching is deterministic: best price first, FIFO within a price
//!   level.
//! - Matchmaker order books converge eventually via gossip and periodic
//!   Bloom-filter sync; stale updates are rejected through the
//!   completed/cancelled order sets and per-trade idempotency.
//!
//! ## Concurrency model
//!
//! All core state is owned by the community and mutated from its event
//! handlers; timers (match windows, proposal timeouts, tick expiry, the
//! sync loop) run as tokio tasks holding shared handles. Suspension only
//! happens at explicit await points: address resolution, wallet calls
//! and sleeps.

pub mod assets;
pub mod clock;
pub mod community;
pub mod ids;
pub mod matching;
pub mod order;
pub mod orderbook;
pub mod prelude;
pub mod price;
pub mod protocol;
pub mod settlement;
pub mod trade;
pub mod transaction;
pub mod wallet;

pub use assets::{AssetAmount, AssetError, AssetPair};
pub use clock::{MAX_ORDER_TIMEOUT, Timeout, Timestamp, current_time_millis};
pub use community::{CommunityConfig, MarketCommunity, MarketSettings, MemoryNetwork, OfferError};
pub use ids::{OrderId, OrderNumber, TraderId, TransactionId};
pub use matching::{MatchingEngine, PriceTimeStrategy};
pub use order::{Order, OrderManager, OrderStatus};
pub use orderbook::{OrderBook, OrderBookError, Tick, TickEntry};
pub use price::Price;
pub use settlement::TradingEngine;
pub use trade::{DeclineMatchReason, DeclinedTrade, DeclinedTradeReason, ProposedTrade};
pub use transaction::{Payment, Transaction};
pub use wallet::{DummyWallet, Wallet, WalletError};
