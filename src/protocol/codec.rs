//! Binary wire codec.
//!
//! Every packet is framed as a 1-byte type tag, the sender's public key
//! (length-prefixed), an optional global-time distribution header (order
//! cancellations and completed-trade broadcasts carry one), and the
//! structured payload. Integers are big-endian; strings and variable
//! byte fields carry a `u32` length prefix; trader ids are written as
//! fixed 20-byte fields and transaction ids as fixed 32-byte fields.

use super::bloom::BloomFilter;
use super::payload::{
    CancelOrderPayload, CompletedTradePayload, DeclineMatchPayload, MatchPayload, OrderPayload,
    OrderbookSyncPayload, PingPongPayload,
};
use crate::assets::{AssetAmount, AssetPair};
use crate::clock::{Timeout, Timestamp};
use crate::ids::{OrderId, OrderNumber, TraderId, TransactionId};
use crate::trade::{DeclineMatchReason, DeclinedTrade, DeclinedTradeReason, ProposedTrade};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Order cancellation broadcast.
pub const MSG_CANCEL_ORDER: u8 = 5;
/// Order creation broadcast / sync unicast.
pub const MSG_ORDER: u8 = 6;
/// Match notification from a matchmaker.
pub const MSG_MATCH: u8 = 7;
/// Match declined back to the matchmaker.
pub const MSG_MATCH_DECLINE: u8 = 9;
/// Trade proposal.
pub const MSG_PROPOSED_TRADE: u8 = 10;
/// Trade proposal declined.
pub const MSG_DECLINED_TRADE: u8 = 11;
/// Counter-proposal with a downscaled pair.
pub const MSG_COUNTER_TRADE: u8 = 12;
/// Trade acceptance; settlement starts.
pub const MSG_START_TRADE: u8 = 13;
/// Orderbook synchronization offer.
pub const MSG_BOOK_SYNC: u8 = 19;
/// Keep-alive request.
pub const MSG_PING: u8 = 20;
/// Keep-alive response.
pub const MSG_PONG: u8 = 21;
/// Completed trade unicast to an introducing matchmaker.
pub const MSG_MATCHED_TRADE_COMPLETE: u8 = 22;
/// Completed trade broadcast.
pub const MSG_COMPLETE_TRADE: u8 = 23;

/// Errors raised while encoding or decoding packets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The buffer ended before the payload was complete.
    Truncated,

    /// The packet's type tag is not a known message.
    UnknownTag(u8),

    /// A length-prefixed field is not valid UTF-8.
    InvalidString,

    /// The asset pair fields do not form a canonical pair.
    InvalidAssetPair {
        /// Underlying pair construction error.
        message: String,
    },

    /// A reason field holds an unknown discriminant.
    InvalidReason(u32),

    /// A length prefix exceeds the remaining buffer.
    InvalidLength {
        /// The declared length.
        declared: usize,
        /// Bytes actually remaining.
        remaining: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated => write!(f, "packet truncated"),
            CodecError::UnknownTag(tag) => write!(f, "unknown message tag {tag}"),
            CodecError::InvalidString => write!(f, "field is not valid UTF-8"),
            CodecError::InvalidAssetPair { message } => {
                write!(f, "invalid asset pair: {message}")
            }
            CodecError::InvalidReason(value) => write!(f, "unknown reason {value}"),
            CodecError::InvalidLength {
                declared,
                remaining,
            } => write!(
                f,
                "length prefix {declared} exceeds remaining {remaining} bytes"
            ),
        }
    }
}

impl std::error::Error for CodecError {}

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Tag 5.
    CancelOrder(CancelOrderPayload),
    /// Tag 6.
    Order(OrderPayload),
    /// Tag 7.
    Match(MatchPayload),
    /// Tag 9.
    MatchDecline(DeclineMatchPayload),
    /// Tag 10.
    ProposedTrade(ProposedTrade),
    /// Tag 11.
    DeclinedTrade(DeclinedTrade),
    /// Tag 12.
    CounterTrade(ProposedTrade),
    /// Tag 13.
    StartTrade(ProposedTrade),
    /// Tag 19.
    OrderbookSync(OrderbookSyncPayload),
    /// Tag 20.
    Ping(PingPongPayload),
    /// Tag 21.
    Pong(PingPongPayload),
    /// Tag 22.
    MatchedTradeComplete(CompletedTradePayload),
    /// Tag 23.
    CompleteTrade(CompletedTradePayload),
}

impl Message {
    /// The wire tag of this message.
    pub fn tag(&self) -> u8 {
        match self {
            Message::CancelOrder(_) => MSG_CANCEL_ORDER,
            Message::Order(_) => MSG_ORDER,
            Message::Match(_) => MSG_MATCH,
            Message::MatchDecline(_) => MSG_MATCH_DECLINE,
            Message::ProposedTrade(_) => MSG_PROPOSED_TRADE,
            Message::DeclinedTrade(_) => MSG_DECLINED_TRADE,
            Message::CounterTrade(_) => MSG_COUNTER_TRADE,
            Message::StartTrade(_) => MSG_START_TRADE,
            Message::OrderbookSync(_) => MSG_BOOK_SYNC,
            Message::Ping(_) => MSG_PING,
            Message::Pong(_) => MSG_PONG,
            Message::MatchedTradeComplete(_) => MSG_MATCHED_TRADE_COMPLETE,
            Message::CompleteTrade(_) => MSG_COMPLETE_TRADE,
        }
    }
}

fn has_distribution_header(tag: u8) -> bool {
    tag == MSG_CANCEL_ORDER || tag == MSG_COMPLETE_TRADE
}

/// A framed packet: authentication, optional distribution header, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The sender's public key.
    pub public_key: Vec<u8>,
    /// Lamport-style global time, when the message type carries one.
    pub global_time: Option<u64>,
    /// The payload.
    pub message: Message,
}

impl Packet {
    /// Frame a message authenticated by `public_key`.
    pub fn new(public_key: Vec<u8>, message: Message) -> Self {
        Packet {
            public_key,
            global_time: None,
            message,
        }
    }

    /// The sender identity derived from the authentication header.
    pub fn sender(&self) -> TraderId {
        TraderId::from_public_key(&self.public_key)
    }
}

// --- primitive readers ----------------------------------------------------

fn take_u8(buf: &mut &[u8]) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Truncated);
    }
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Truncated);
    }
    Ok(buf.get_u32())
}

fn take_u64(buf: &mut &[u8]) -> Result<u64, CodecError> {
    if buf.remaining() < 8 {
        return Err(CodecError::Truncated);
    }
    Ok(buf.get_u64())
}

fn take_bytes(buf: &mut &[u8], count: usize) -> Result<Vec<u8>, CodecError> {
    if buf.remaining() < count {
        return Err(CodecError::InvalidLength {
            declared: count,
            remaining: buf.remaining(),
        });
    }
    let mut out = vec![0u8; count];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn take_var_bytes(buf: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = take_u32(buf)? as usize;
    take_bytes(buf, len)
}

fn take_string(buf: &mut &[u8]) -> Result<String, CodecError> {
    String::from_utf8(take_var_bytes(buf)?).map_err(|_| CodecError::InvalidString)
}

fn take_trader_id(buf: &mut &[u8]) -> Result<TraderId, CodecError> {
    let bytes = take_bytes(buf, 20)?;
    TraderId::try_from(bytes.as_slice()).map_err(|_| CodecError::Truncated)
}

fn take_transaction_id(buf: &mut &[u8]) -> Result<TransactionId, CodecError> {
    let bytes = take_bytes(buf, 32)?;
    TransactionId::try_from(bytes.as_slice()).map_err(|_| CodecError::Truncated)
}

fn take_asset_pair(buf: &mut &[u8]) -> Result<AssetPair, CodecError> {
    let first_amount = take_u64(buf)?;
    let first_asset = take_string(buf)?;
    let second_amount = take_u64(buf)?;
    let second_asset = take_string(buf)?;
    AssetPair::new(
        AssetAmount::new(first_amount, &first_asset),
        AssetAmount::new(second_amount, &second_asset),
    )
    .map_err(|e| CodecError::InvalidAssetPair {
        message: e.to_string(),
    })
}

// --- primitive writers ----------------------------------------------------

fn put_var_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn put_string(buf: &mut BytesMut, s: &str) {
    put_var_bytes(buf, s.as_bytes());
}

fn put_asset_pair(buf: &mut BytesMut, pair: &AssetPair) {
    buf.put_u64(pair.first().amount());
    put_string(buf, pair.first().asset_id());
    buf.put_u64(pair.second().amount());
    put_string(buf, pair.second().asset_id());
}

// --- payload encodings ----------------------------------------------------

fn put_order(buf: &mut BytesMut, payload: &OrderPayload) {
    buf.put_slice(payload.trader_id.as_bytes());
    buf.put_u64(payload.timestamp.millis());
    buf.put_u32(payload.order_number.value());
    put_asset_pair(buf, &payload.assets);
    buf.put_u32(payload.timeout.seconds() as u32);
    buf.put_u64(payload.traded);
    buf.put_u8(payload.is_ask as u8);
}

fn take_order(buf: &mut &[u8]) -> Result<OrderPayload, CodecError> {
    let trader_id = take_trader_id(buf)?;
    let timestamp = Timestamp::from(take_u64(buf)?);
    let order_number = OrderNumber::new(take_u32(buf)?);
    let assets = take_asset_pair(buf)?;
    let timeout = Timeout::new(take_u32(buf)? as u64);
    let traded = take_u64(buf)?;
    let is_ask = take_u8(buf)? != 0;
    Ok(OrderPayload {
        trader_id,
        timestamp,
        order_number,
        assets,
        timeout,
        traded,
        is_ask,
    })
}

fn put_trade(buf: &mut BytesMut, trade: &ProposedTrade) {
    buf.put_slice(trade.trader_id.as_bytes());
    buf.put_u64(trade.timestamp.millis());
    buf.put_u32(trade.order_id.order_number.value());
    buf.put_slice(trade.recipient_order_id.trader_id.as_bytes());
    buf.put_u32(trade.recipient_order_id.order_number.value());
    buf.put_u32(trade.proposal_id);
    put_asset_pair(buf, &trade.assets);
}

fn take_trade(buf: &mut &[u8]) -> Result<ProposedTrade, CodecError> {
    let trader_id = take_trader_id(buf)?;
    let timestamp = Timestamp::from(take_u64(buf)?);
    let order_number = OrderNumber::new(take_u32(buf)?);
    let recipient_trader = take_trader_id(buf)?;
    let recipient_number = OrderNumber::new(take_u32(buf)?);
    let proposal_id = take_u32(buf)?;
    let assets = take_asset_pair(buf)?;
    Ok(ProposedTrade {
        trader_id,
        order_id: OrderId::new(trader_id, order_number),
        recipient_order_id: OrderId::new(recipient_trader, recipient_number),
        proposal_id,
        assets,
        timestamp,
    })
}

fn put_message(buf: &mut BytesMut, message: &Message) {
    match message {
        Message::CancelOrder(payload) => {
            buf.put_slice(payload.trader_id.as_bytes());
            buf.put_u64(payload.timestamp.millis());
            buf.put_u32(payload.order_number.value());
        }
        Message::Order(payload) => put_order(buf, payload),
        Message::Match(payload) => {
            put_order(buf, &payload.tick);
            buf.put_u32(payload.recipient_order_number.value());
            buf.put_slice(payload.match_trader_id.as_bytes());
            buf.put_slice(payload.matchmaker_trader_id.as_bytes());
        }
        Message::MatchDecline(payload) => {
            buf.put_slice(payload.trader_id.as_bytes());
            buf.put_u64(payload.timestamp.millis());
            buf.put_u32(payload.order_number.value());
            buf.put_slice(payload.other_order_id.trader_id.as_bytes());
            buf.put_u32(payload.other_order_id.order_number.value());
            buf.put_u32(payload.reason.to_wire());
        }
        Message::ProposedTrade(trade) | Message::CounterTrade(trade) | Message::StartTrade(trade) => {
            put_trade(buf, trade);
        }
        Message::DeclinedTrade(declined) => {
            buf.put_slice(declined.trader_id.as_bytes());
            buf.put_u64(declined.timestamp.millis());
            buf.put_u32(declined.order_id.order_number.value());
            buf.put_slice(declined.recipient_order_id.trader_id.as_bytes());
            buf.put_u32(declined.recipient_order_id.order_number.value());
            buf.put_u32(declined.proposal_id);
            put_asset_pair(buf, &declined.assets);
            buf.put_u32(declined.reason.to_wire());
        }
        Message::OrderbookSync(payload) => {
            buf.put_slice(payload.trader_id.as_bytes());
            buf.put_u64(payload.timestamp.millis());
            buf.put_u8(payload.bloom.functions());
            buf.put_u8(payload.bloom.prefix());
            put_var_bytes(buf, payload.bloom.bits());
        }
        Message::Ping(payload) | Message::Pong(payload) => {
            buf.put_slice(payload.trader_id.as_bytes());
            buf.put_u64(payload.timestamp.millis());
            buf.put_u32(payload.identifier);
        }
        Message::MatchedTradeComplete(payload) | Message::CompleteTrade(payload) => {
            put_trade(buf, &payload.trade);
            buf.put_slice(payload.trade_id.as_bytes());
        }
    }
}

fn take_message(tag: u8, buf: &mut &[u8]) -> Result<Message, CodecError> {
    let message = match tag {
        MSG_CANCEL_ORDER => Message::CancelOrder(CancelOrderPayload {
            trader_id: take_trader_id(buf)?,
            timestamp: Timestamp::from(take_u64(buf)?),
            order_number: OrderNumber::new(take_u32(buf)?),
        }),
        MSG_ORDER => Message::Order(take_order(buf)?),
        MSG_MATCH => {
            let tick = take_order(buf)?;
            Message::Match(MatchPayload {
                tick,
                recipient_order_number: OrderNumber::new(take_u32(buf)?),
                match_trader_id: take_trader_id(buf)?,
                matchmaker_trader_id: take_trader_id(buf)?,
            })
        }
        MSG_MATCH_DECLINE => {
            let trader_id = take_trader_id(buf)?;
            let timestamp = Timestamp::from(take_u64(buf)?);
            let order_number = OrderNumber::new(take_u32(buf)?);
            let other_trader = take_trader_id(buf)?;
            let other_number = OrderNumber::new(take_u32(buf)?);
            let raw = take_u32(buf)?;
            let reason =
                DeclineMatchReason::from_wire(raw).ok_or(CodecError::InvalidReason(raw))?;
            Message::MatchDecline(DeclineMatchPayload {
                trader_id,
                timestamp,
                order_number,
                other_order_id: OrderId::new(other_trader, other_number),
                reason,
            })
        }
        MSG_PROPOSED_TRADE => Message::ProposedTrade(take_trade(buf)?),
        MSG_COUNTER_TRADE => Message::CounterTrade(take_trade(buf)?),
        MSG_START_TRADE => Message::StartTrade(take_trade(buf)?),
        MSG_DECLINED_TRADE => {
            let trader_id = take_trader_id(buf)?;
            let timestamp = Timestamp::from(take_u64(buf)?);
            let order_number = OrderNumber::new(take_u32(buf)?);
            let recipient_trader = take_trader_id(buf)?;
            let recipient_number = OrderNumber::new(take_u32(buf)?);
            let proposal_id = take_u32(buf)?;
            let assets = take_asset_pair(buf)?;
            let raw = take_u32(buf)?;
            let reason =
                DeclinedTradeReason::from_wire(raw).ok_or(CodecError::InvalidReason(raw))?;
            Message::DeclinedTrade(DeclinedTrade {
                trader_id,
                order_id: OrderId::new(trader_id, order_number),
                recipient_order_id: OrderId::new(recipient_trader, recipient_number),
                proposal_id,
                assets,
                timestamp,
                reason,
            })
        }
        MSG_BOOK_SYNC => {
            let trader_id = take_trader_id(buf)?;
            let timestamp = Timestamp::from(take_u64(buf)?);
            let functions = take_u8(buf)?;
            let prefix = take_u8(buf)?;
            let bits = take_var_bytes(buf)?;
            Message::OrderbookSync(OrderbookSyncPayload {
                trader_id,
                timestamp,
                bloom: BloomFilter::from_parts(functions, prefix, bits),
            })
        }
        MSG_PING | MSG_PONG => {
            let payload = PingPongPayload {
                trader_id: take_trader_id(buf)?,
                timestamp: Timestamp::from(take_u64(buf)?),
                identifier: take_u32(buf)?,
            };
            if tag == MSG_PING {
                Message::Ping(payload)
            } else {
                Message::Pong(payload)
            }
        }
        MSG_MATCHED_TRADE_COMPLETE | MSG_COMPLETE_TRADE => {
            let trade = take_trade(buf)?;
            let trade_id = take_transaction_id(buf)?;
            let payload = CompletedTradePayload { trade, trade_id };
            if tag == MSG_MATCHED_TRADE_COMPLETE {
                Message::MatchedTradeComplete(payload)
            } else {
                Message::CompleteTrade(payload)
            }
        }
        other => return Err(CodecError::UnknownTag(other)),
    };
    Ok(message)
}

/// Encode a packet into its wire bytes.
pub fn encode(packet: &Packet) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);
    let tag = packet.message.tag();
    buf.put_u8(tag);
    put_var_bytes(&mut buf, &packet.public_key);
    if has_distribution_header(tag) {
        buf.put_u64(packet.global_time.unwrap_or(0));
    }
    put_message(&mut buf, &packet.message);
    buf.freeze()
}

/// Decode a packet from wire bytes.
pub fn decode(data: &[u8]) -> Result<Packet, CodecError> {
    let mut buf = data;
    let tag = take_u8(&mut buf)?;
    let public_key = take_var_bytes(&mut buf)?;
    let global_time = if has_distribution_header(tag) {
        Some(take_u64(&mut buf)?)
    } else {
        None
    };
    let message = take_message(tag, &mut buf)?;
    Ok(Packet {
        public_key,
        global_time,
        message,
    })
}
