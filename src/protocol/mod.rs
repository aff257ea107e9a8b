//! Wire protocol: payload structs, the binary codec and the Bloom filter
//! used by orderbook synchronization.

mod bloom;
mod codec;
mod payload;

pub use bloom::{BloomFilter, DEFAULT_ERROR_RATE};
pub use codec::{
    CodecError, MSG_BOOK_SYNC, MSG_CANCEL_ORDER, MSG_COMPLETE_TRADE, MSG_COUNTER_TRADE,
    MSG_DECLINED_TRADE, MSG_MATCH, MSG_MATCH_DECLINE, MSG_MATCHED_TRADE_COMPLETE, MSG_ORDER,
    MSG_PING, MSG_PONG, MSG_PROPOSED_TRADE, MSG_START_TRADE, Message, Packet, decode, encode,
};
pub use payload::{
    CancelOrderPayload, CompletedTradePayload, DeclineMatchPayload, MatchPayload, OrderPayload,
    OrderbookSyncPayload, PingPongPayload,
};
