//! Prelude module that re-exports commonly used types and traits.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use anydex::prelude::*;
//! ```

// Value types
pub use crate::assets::{AssetAmount, AssetError, AssetPair};
pub use crate::clock::{MAX_ORDER_TIMEOUT, Timeout, Timestamp, current_time_millis};
pub use crate::ids::{OrderId, OrderNumber, TraderId, TransactionId};
pub use crate::price::Price;

// Orders and the order book
pub use crate::order::{MemoryOrderRepository, Order, OrderManager, OrderRepository, OrderStatus};
pub use crate::orderbook::{MarketId, OrderBook, OrderBookError, PriceLevel, Side, Tick, TickEntry};

// Matching
pub use crate::matching::{MatchingEngine, PriceTimeStrategy};

// Negotiation and settlement
pub use crate::settlement::{ClearingPolicy, SingleTradeClearingPolicy, TradingEngine};
pub use crate::trade::{DeclineMatchReason, DeclinedTrade, DeclinedTradeReason, ProposedTrade};
pub use crate::transaction::{Payment, Transaction, TransactionStatus};

// Community and transport seams
pub use crate::community::{
    AddressResolver, CommunityConfig, DisseminationPolicy, MarketCommunity, MarketSettings,
    MemoryNetwork, MessageGateway, OfferError, Peer, SyncPolicy,
};

// Wire protocol
pub use crate::protocol::{BloomFilter, Message, Packet, decode, encode};

// Wallets
pub use crate::wallet::{DummyWallet, Wallet, WalletBalance, WalletError, WalletTransaction};
