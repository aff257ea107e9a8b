//! The market community: a peer playing the trader and/or matchmaker
//! roles.
//!
//! A trader owns local orders, negotiates proposals and settles through
//! the trading engine. A matchmaker replicates the global order book,
//! runs the matching engine on incoming ticks and notifies the involved
//! traders. One peer may play both roles.
//!
//! All mutable state lives behind interior concurrency so the community
//! can be shared as an `Arc` with its timers (match windows, proposal
//! timeouts, the sync loop, tick expiry).

mod cache;
mod match_queue;
mod network;
mod settings;

pub use cache::{MatchCache, PingCache, ProposedTradeCache, RequestCache};
pub use match_queue::{MatchPriorityQueue, QueueItem};
pub use network::{AddressResolver, MemoryGateway, MemoryNetwork, MessageGateway, Peer};
pub use settings::{DisseminationPolicy, MarketSettings, SyncPolicy};

use crate::assets::{AssetAmount, AssetPair};
use crate::clock::{MAX_ORDER_TIMEOUT, Timeout, Timestamp};
use crate::ids::{OrderId, OrderNumber, TraderId, TransactionId};
use crate::matching::{MatchingEngine, PriceTimeStrategy};
use crate::order::{MemoryOrderRepository, Order, OrderManager, OrderStatus};
use crate::orderbook::{OrderBook, Tick, TickEntry};
use crate::price::Price;
use crate::protocol::{
    self, BloomFilter, CancelOrderPayload, CompletedTradePayload, DeclineMatchPayload,
    MatchPayload, Message, OrderPayload, OrderbookSyncPayload, Packet, PingPongPayload,
};
use crate::settlement::{ClearingPolicy, SingleTradeClearingPolicy, TradingEngine};
use crate::trade::{DeclineMatchReason, DeclinedTrade, DeclinedTradeReason, ProposedTrade};
use crate::transaction::Transaction;
use bytes::Bytes;
use dashmap::DashMap;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors rejecting an order creation at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OfferError {
    /// One of the legs has a zero amount.
    EmptyAmount,

    /// The timeout exceeds the system maximum of one day.
    TimeoutTooLarge {
        /// The requested timeout in seconds.
        seconds: u64,
    },
}

impl fmt::Display for OfferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferError::EmptyAmount => write!(f, "both legs of an order need a non-zero amount"),
            OfferError::TimeoutTooLarge { seconds } => {
                write!(
                    f,
                    "order timeout of {seconds}s exceeds the maximum of {MAX_ORDER_TIMEOUT}s"
                )
            }
        }
    }
}

impl std::error::Error for OfferError {}

/// Construction parameters for a [`MarketCommunity`].
pub struct CommunityConfig {
    /// The peer's public key; its trader id derives from it.
    pub public_key: Vec<u8>,
    /// The peer's own network address.
    pub address: SocketAddr,
    /// Market settings.
    pub settings: MarketSettings,
    /// Outbound transport.
    pub gateway: Arc<dyn MessageGateway>,
    /// DHT stand-in for trader address lookup.
    pub resolver: Arc<dyn AddressResolver>,
    /// The settlement driver.
    pub trading_engine: Arc<TradingEngine>,
    /// Whether this peer replicates the order book and matches.
    pub is_matchmaker: bool,
}

/// A peer in the market overlay.
pub struct MarketCommunity {
    public_key: Vec<u8>,
    mid: TraderId,
    address: SocketAddr,
    settings: MarketSettings,
    gateway: Arc<dyn MessageGateway>,
    resolver: Arc<dyn AddressResolver>,
    order_manager: OrderManager,
    order_book: Arc<OrderBook>,
    matching_engine: MatchingEngine,
    trading_engine: Arc<TradingEngine>,
    clearing_policy: Option<Arc<dyn ClearingPolicy>>,
    request_cache: RequestCache,
    is_matchmaker: AtomicBool,
    matching_enabled: AtomicBool,
    mid_register: DashMap<TraderId, SocketAddr>,
    matchmakers: DashMap<TraderId, SocketAddr>,
    fixed_broadcast_set: Mutex<Vec<SocketAddr>>,
    sent_matches: Mutex<HashSet<(OrderId, OrderId)>>,
    global_time: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MarketCommunity {
    /// Build a community and wire it to its trading engine.
    pub fn new(config: CommunityConfig) -> Arc<Self> {
        let mid = TraderId::from_public_key(&config.public_key);
        let order_book = Arc::new(OrderBook::new());
        let clearing_policy: Option<Arc<dyn ClearingPolicy>> = if config.settings.single_trade {
            Some(Arc::new(SingleTradeClearingPolicy::new(
                config.trading_engine.clone(),
            )))
        } else {
            None
        };
        let community = Arc::new(MarketCommunity {
            public_key: config.public_key,
            mid,
            address: config.address,
            settings: config.settings,
            gateway: config.gateway,
            resolver: config.resolver,
            order_manager: OrderManager::new(mid, Arc::new(MemoryOrderRepository::new(mid))),
            matching_engine: MatchingEngine::new(PriceTimeStrategy::new(order_book.clone())),
            order_book,
            trading_engine: config.trading_engine.clone(),
            clearing_policy,
            request_cache: RequestCache::new(),
            is_matchmaker: AtomicBool::new(config.is_matchmaker),
            matching_enabled: AtomicBool::new(true),
            mid_register: DashMap::new(),
            matchmakers: DashMap::new(),
            fixed_broadcast_set: Mutex::new(Vec::new()),
            sent_matches: Mutex::new(HashSet::new()),
            global_time: AtomicU64::new(0),
            tasks: Mutex::new(Vec::new()),
        });
        config.trading_engine.attach_community(&community);
        info!(mid = %mid, matchmaker = community.is_matchmaker(), "market community initialized");
        community
    }

    /// Start the inbox loop over `inbox` and, for matchmakers, the
    /// orderbook sync loop.
    pub fn start(self: &Arc<Self>, mut inbox: mpsc::UnboundedReceiver<(SocketAddr, Bytes)>) {
        let this = self.clone();
        let receive_loop = tokio::spawn(async move {
            while let Some((from, packet)) = inbox.recv().await {
                this.handle_packet(from, &packet).await;
            }
        });
        self.track_task(receive_loop);

        if self.is_matchmaker() && self.settings.sync_policy == SyncPolicy::Neighbours {
            let this = self.clone();
            let sync_loop = tokio::spawn(async move {
                let jitter = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(Duration::ZERO..Duration::from_secs(10))
                };
                tokio::time::sleep(jitter).await;
                loop {
                    this.sync_orderbook();
                    tokio::time::sleep(this.settings.sync_interval).await;
                }
            });
            self.track_task(sync_loop);
        }
    }

    /// Stop loops, cancel all pending timers and drop request state.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().expect("task list poisoned").drain(..) {
            task.abort();
        }
        self.request_cache.clear();
        self.order_book.shutdown();
    }

    // --- accessors --------------------------------------------------------

    /// This peer's trader identity.
    pub fn mid(&self) -> TraderId {
        self.mid
    }

    /// This peer's network address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// The community settings.
    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    /// The manager of locally owned orders.
    pub fn order_manager(&self) -> &OrderManager {
        &self.order_manager
    }

    /// The matchmaker-side order book replica.
    pub fn order_book(&self) -> &Arc<OrderBook> {
        &self.order_book
    }

    /// The settlement driver.
    pub fn trading_engine(&self) -> &Arc<TradingEngine> {
        &self.trading_engine
    }

    /// The request cache.
    pub fn request_cache(&self) -> &RequestCache {
        &self.request_cache
    }

    /// Whether this peer currently acts as a matchmaker.
    pub fn is_matchmaker(&self) -> bool {
        self.is_matchmaker.load(Ordering::Acquire)
    }

    /// Toggle matching (matchmakers only); used operationally to drain.
    pub fn set_matching_enabled(&self, enabled: bool) {
        self.matching_enabled.store(enabled, Ordering::Release);
    }

    /// Record a known matchmaker.
    pub fn add_matchmaker(&self, trader_id: TraderId, address: SocketAddr) {
        if trader_id != self.mid {
            self.matchmakers.insert(trader_id, address);
        }
    }

    /// Override peer sampling with a fixed broadcast set.
    pub fn set_fixed_broadcast_set(&self, addresses: Vec<SocketAddr>) {
        *self
            .fixed_broadcast_set
            .lock()
            .expect("broadcast set poisoned") = addresses;
    }

    /// Learn (or refresh) a trader's address.
    pub fn update_ip(&self, trader_id: TraderId, address: SocketAddr) {
        self.mid_register.insert(trader_id, address);
    }

    /// The locally known address of a trader.
    pub fn lookup_ip(&self, trader_id: &TraderId) -> Option<SocketAddr> {
        self.mid_register.get(trader_id).map(|entry| *entry.value())
    }

    /// Resolve a trader's address, falling back to the DHT.
    pub async fn get_address_for_trader(&self, trader_id: &TraderId) -> Option<SocketAddr> {
        if *trader_id == self.mid {
            return Some(self.address);
        }
        if let Some(address) = self.lookup_ip(trader_id) {
            return Some(address);
        }
        debug!(trader = %trader_id, "address unknown, querying resolver");
        let address = self.resolver.resolve(trader_id).await?;
        self.update_ip(*trader_id, address);
        Some(address)
    }

    fn claim_global_time(&self) -> u64 {
        self.global_time.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn track_task(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().expect("task list poisoned");
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn send_message(&self, address: SocketAddr, message: Message) {
        let mut packet = Packet::new(self.public_key.clone(), message);
        packet.global_time = Some(self.claim_global_time());
        self.gateway.send(address, protocol::encode(&packet));
    }

    // --- order creation and dissemination ---------------------------------

    /// Validate an order creation request.
    pub fn verify_offer_creation(assets: &AssetPair, timeout: Timeout) -> Result<(), OfferError> {
        if assets.first().amount() == 0 || assets.second().amount() == 0 {
            return Err(OfferError::EmptyAmount);
        }
        if timeout.seconds() > MAX_ORDER_TIMEOUT {
            return Err(OfferError::TimeoutTooLarge {
                seconds: timeout.seconds(),
            });
        }
        Ok(())
    }

    /// Create and broadcast an ask (sell) order.
    pub fn create_ask(
        self: &Arc<Self>,
        assets: AssetPair,
        timeout: Timeout,
    ) -> Result<Order, OfferError> {
        Self::verify_offer_creation(&assets, timeout)?;
        let order = self.order_manager.create_ask_order(assets, timeout);
        self.index_and_broadcast(order)
    }

    /// Create and broadcast a bid (buy) order.
    pub fn create_bid(
        self: &Arc<Self>,
        assets: AssetPair,
        timeout: Timeout,
    ) -> Result<Order, OfferError> {
        Self::verify_offer_creation(&assets, timeout)?;
        let order = self.order_manager.create_bid_order(assets, timeout);
        self.index_and_broadcast(order)
    }

    fn index_and_broadcast(self: &Arc<Self>, mut order: Order) -> Result<Order, OfferError> {
        if self.is_matchmaker() {
            let tick = Tick::from_order(&order);
            let result = if order.is_ask() {
                self.order_book.insert_ask(tick)
            } else {
                self.order_book.insert_bid(tick)
            };
            match result {
                Ok(_expiry) => {
                    if let Some(entry) = self.order_book.get_tick(&order.order_id()) {
                        self.match_tick(&entry);
                    }
                }
                Err(error) => debug!(%error, "own tick not indexed"),
            }
        }
        self.broadcast_order(&mut order);
        info!(order_id = %order.order_id(), "order created and broadcast");
        Ok(order)
    }

    fn select_broadcast_addresses(&self) -> Vec<SocketAddr> {
        let fixed = self
            .fixed_broadcast_set
            .lock()
            .expect("broadcast set poisoned")
            .clone();
        let candidates: Vec<SocketAddr> = match self.settings.dissemination_policy {
            DisseminationPolicy::Neighbours => {
                if !fixed.is_empty() {
                    return fixed;
                }
                self.mid_register.iter().map(|entry| *entry.value()).collect()
            }
            DisseminationPolicy::Random => {
                self.matchmakers.iter().map(|entry| *entry.value()).collect()
            }
        };
        let mut rng = rand::thread_rng();
        candidates
            .choose_multiple(&mut rng, self.settings.fanout)
            .copied()
            .collect()
    }

    fn broadcast_order(&self, order: &mut Order) {
        let addresses = self.select_broadcast_addresses();
        order.broadcast_peers = addresses.clone();
        self.order_manager.repository().update(order.clone());

        let tick = Tick::from_order(order);
        for address in addresses {
            self.send_message(address, Message::Order(OrderPayload::from_tick(&tick)));
        }
    }

    /// Cancel a local order: drain its proposals and match cache, drop
    /// the tick and broadcast the cancellation to the peers that saw the
    /// order.
    pub fn cancel_order(&self, order_id: &OrderId) {
        let Some(order) = self.order_manager.repository().find_by_id(order_id) else {
            return;
        };
        if order.status() != OrderStatus::Open && order.status() != OrderStatus::Unverified {
            return;
        }

        for proposal_id in self.request_cache.proposals_from_order(order_id) {
            self.request_cache.pop_proposed(proposal_id);
        }
        self.request_cache
            .pop_match_cache(order_id.order_number.value());

        let Some(order) = self.order_manager.cancel_order(order_id) else {
            return;
        };

        if self.is_matchmaker() {
            self.order_book.remove_tick(order_id);
            self.order_book.mark_cancelled(*order_id);
        }

        let addresses = if order.broadcast_peers.is_empty() {
            self.select_broadcast_addresses()
        } else {
            order.broadcast_peers.clone()
        };
        for address in addresses {
            self.send_message(
                address,
                Message::CancelOrder(CancelOrderPayload {
                    trader_id: order_id.trader_id,
                    timestamp: order.timestamp(),
                    order_number: order_id.order_number,
                }),
            );
        }
    }

    // --- matchmaking ------------------------------------------------------

    /// Run the matching engine for a tick and notify the matched traders.
    pub fn match_tick(self: &Arc<Self>, entry: &Arc<TickEntry>) -> usize {
        if !self.is_matchmaker() || !self.matching_enabled.load(Ordering::Acquire) {
            return 0;
        }
        if entry.available_for_matching() == 0 {
            debug!(order_id = %entry.order_id(), "tick has no quantity to match");
            return 0;
        }
        let matched = self.matching_engine.match_entry(entry);
        let count = matched.len();
        for counterparty in matched {
            self.send_match_message(counterparty.tick(), entry.order_id());
        }
        count
    }

    /// Re-run matching for the given order ids, where ticks still exist.
    pub fn match_order_ids(self: &Arc<Self>, order_ids: &[OrderId]) {
        for order_id in order_ids {
            if let Some(entry) = self.order_book.get_tick(order_id) {
                self.match_tick(&entry);
            }
        }
    }

    fn send_match_message(self: &Arc<Self>, tick: Tick, recipient_order_id: OrderId) {
        {
            let mut sent = self.sent_matches.lock().expect("sent matches poisoned");
            if !sent.insert((recipient_order_id, tick.order_id())) {
                return;
            }
        }

        let this = self.clone();
        let task = tokio::spawn(async move {
            if !this.settings.match_send_interval.is_zero() {
                let delay = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(Duration::ZERO..this.settings.match_send_interval)
                };
                tokio::time::sleep(delay).await;
            }
            let Some(address) = this
                .get_address_for_trader(&recipient_order_id.trader_id)
                .await
            else {
                debug!(
                    recipient = %recipient_order_id,
                    "match not sent: recipient address unknown"
                );
                return;
            };
            info!(
                recipient = %recipient_order_id,
                tick = %tick.order_id(),
                "sending match message"
            );
            let payload = MatchPayload {
                match_trader_id: tick.order_id().trader_id,
                matchmaker_trader_id: this.mid,
                recipient_order_number: recipient_order_id.order_number,
                tick: OrderPayload::from_tick(&tick),
            };
            this.send_message(address, Message::Match(payload));
        });
        self.track_task(task);
    }

    fn send_decline_match_message(
        &self,
        order: &Order,
        other_order_id: OrderId,
        matchmaker_trader_id: TraderId,
        reason: DeclineMatchReason,
    ) {
        let Some(address) = self.lookup_ip(&matchmaker_trader_id) else {
            warn!(matchmaker = %matchmaker_trader_id, "decline-match: matchmaker address unknown");
            return;
        };
        info!(
            order_id = %order.order_id(),
            matchmaker = %matchmaker_trader_id,
            ?reason,
            "sending decline-match"
        );
        self.send_message(
            address,
            Message::MatchDecline(DeclineMatchPayload {
                trader_id: self.mid,
                timestamp: Timestamp::now(),
                order_number: order.order_id().order_number,
                other_order_id,
                reason,
            }),
        );
    }

    // --- match cache ------------------------------------------------------

    fn process_match_payload(self: &Arc<Self>, payload: MatchPayload) {
        let order_id = OrderId::new(self.mid, payload.recipient_order_number);
        let Some(order) = self.order_manager.repository().find_by_id(&order_id) else {
            warn!(order_id = %order_id, "match for unknown local order");
            return;
        };

        if order.status() != OrderStatus::Open {
            self.send_decline_match_message(
                &order,
                payload.other_order_id(),
                payload.matchmaker_trader_id,
                DeclineMatchReason::OrderCompleted,
            );
            return;
        }

        let cache = self.request_cache.get_or_create_match_cache(&order);
        let order_number = order_id.order_number.value();
        let mut process_now = false;
        {
            let mut state = cache.lock().expect("match cache lock poisoned");
            let other_order_id = payload.other_order_id();
            let price = payload.tick.assets.price();
            let quantity = payload.tick.assets.first().amount();
            if state.store_match(payload) {
                debug!(
                    order_id = %order_id,
                    other = %other_order_id,
                    "queueing match suggestion"
                );
                state.queue.insert(0, price, other_order_id, quantity);
            }

            if state.schedule_task.is_none() {
                let this = self.clone();
                state.schedule_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(this.settings.match_window).await;
                    this.start_process_matches(order_number);
                }));
            } else if state.schedule_task_done && state.outstanding_requests.is_empty() {
                process_now = true;
            }
        }
        if process_now {
            self.process_match(order_number);
        }
    }

    fn start_process_matches(self: &Arc<Self>, order_number: u32) {
        let order_id = OrderId::new(self.mid, OrderNumber::new(order_number));
        let Some(cache) = self.request_cache.match_cache(order_number) else {
            return;
        };
        let Some(order) = self.order_manager.repository().find_by_id(&order_id) else {
            return;
        };

        let mut declines = Vec::new();
        {
            let mut state = cache.lock().expect("match cache lock poisoned");
            state.schedule_task_done = true;
            if order.status() != OrderStatus::Open {
                info!(order_id = %order_id, "order closed while batching, declining matches");
                for payloads in state.matches.values() {
                    for payload in payloads {
                        declines.push((payload.other_order_id(), payload.matchmaker_trader_id));
                    }
                }
                state.matches.clear();
            }
        }
        if !declines.is_empty() {
            for (other_order_id, matchmaker) in declines {
                self.send_decline_match_message(
                    &order,
                    other_order_id,
                    matchmaker,
                    DeclineMatchReason::OrderCompleted,
                );
            }
            return;
        }
        self.process_match(order_number);
    }

    fn process_match(self: &Arc<Self>, order_number: u32) {
        let order_id = OrderId::new(self.mid, OrderNumber::new(order_number));
        let Some(cache) = self.request_cache.match_cache(order_number) else {
            return;
        };
        let Some(mut order) = self.order_manager.repository().find_by_id(&order_id) else {
            return;
        };

        // (item, reserved quantity for fresh dispatches)
        let mut dispatch: Vec<(QueueItem, Option<u64>)> = Vec::new();
        {
            let mut state = cache.lock().expect("match cache lock poisoned");
            while order.available_quantity() > 0 {
                let Some(item) = state.queue.delete() else {
                    break;
                };
                state.outstanding_requests.push(item.clone());
                if item.retries == 0 {
                    let propose_quantity = order.available_quantity().min(item.quantity);
                    order
                        .reserve_quantity_for_tick(item.order_id, propose_quantity)
                        .expect("propose quantity bounded by available");
                    dispatch.push((item, Some(propose_quantity)));
                } else {
                    dispatch.push((item, None));
                }
                if dispatch.len() == self.settings.match_process_batch_size {
                    break;
                }
            }
        }
        self.order_manager.repository().update(order.clone());
        debug!(
            order_id = %order_id,
            batch = dispatch.len(),
            "processed match batch"
        );

        for (item, reserved) in dispatch {
            let this = self.clone();
            let task = tokio::spawn(async move {
                if reserved.is_none() {
                    // Retried entries get a randomized delay to break
                    // simultaneous races.
                    let delay = {
                        let mut rng = rand::thread_rng();
                        rng.gen_range(Duration::from_secs(1)..Duration::from_secs(2))
                    };
                    tokio::time::sleep(delay).await;
                }
                this.accept_match_and_propose(order_id, item, reserved).await;
            });
            self.track_task(task);
        }
    }

    async fn accept_match_and_propose(
        self: &Arc<Self>,
        order_id: OrderId,
        item: QueueItem,
        reserved: Option<u64>,
    ) {
        let Some(mut order) = self.order_manager.repository().find_by_id(&order_id) else {
            return;
        };
        let propose_quantity = match reserved {
            Some(quantity) => quantity,
            None => {
                if order.available_quantity() == 0 {
                    info!(
                        order_id = %order_id,
                        "no available quantity, not sending outgoing proposal"
                    );
                    self.match_cache_received_decline(
                        order_id.order_number.value(),
                        item.order_id,
                        DeclinedTradeReason::NoAvailableQuantity,
                    );
                    return;
                }
                let quantity = order.available_quantity().min(item.quantity);
                order
                    .reserve_quantity_for_tick(item.order_id, quantity)
                    .expect("propose quantity bounded by available");
                self.order_manager.repository().update(order.clone());
                quantity
            }
        };
        self.propose_trade(&order, item.order_id, propose_quantity, item.price)
            .await;
    }

    async fn propose_trade(
        self: &Arc<Self>,
        order: &Order,
        other_order_id: OrderId,
        propose_quantity: u64,
        other_price: Price,
    ) {
        let Ok(assets) = AssetPair::from_price(&other_price, propose_quantity) else {
            warn!(order_id = %order.order_id(), "cannot scale proposal pair");
            return;
        };
        let trade = ProposedTrade::propose(
            self.mid,
            order.order_id(),
            other_order_id,
            assets,
            Timestamp::now(),
        );

        match self.get_address_for_trader(&other_order_id.trader_id).await {
            Some(address) => self.send_proposed_trade(trade, address, false),
            None => {
                if let Some(mut order) = self
                    .order_manager
                    .repository()
                    .find_by_id(&order.order_id())
                {
                    order.release_quantity_for_tick(other_order_id, propose_quantity);
                    self.order_manager.repository().update(order);
                }
                self.match_cache_received_decline(
                    order.order_id().order_number.value(),
                    other_order_id,
                    DeclinedTradeReason::AddressLookupFail,
                );
            }
        }
    }

    fn send_proposed_trade(self: &Arc<Self>, trade: ProposedTrade, address: SocketAddr, counter: bool) {
        let proposal_id = trade.proposal_id;
        let this = self.clone();
        let timeout_task = tokio::spawn(async move {
            tokio::time::sleep(this.settings.proposal_timeout).await;
            this.on_proposal_timeout(proposal_id);
        });
        self.request_cache
            .add_proposed(ProposedTradeCache::new(trade.clone(), timeout_task));

        info!(
            proposal_id,
            own = %trade.order_id,
            other = %trade.recipient_order_id,
            assets = %trade.assets,
            counter,
            "sending proposed trade"
        );
        let message = if counter {
            Message::CounterTrade(trade)
        } else {
            Message::ProposedTrade(trade)
        };
        self.send_message(address, message);
    }

    fn on_proposal_timeout(self: &Arc<Self>, proposal_id: u32) {
        let Some(trade) = self.request_cache.pop_proposed(proposal_id) else {
            return;
        };
        warn!(proposal_id, other = %trade.recipient_order_id, "proposed trade timed out");
        if let Some(mut order) = self.order_manager.repository().find_by_id(&trade.order_id) {
            order.release_quantity_for_tick(trade.recipient_order_id, trade.assets.first().amount());
            self.order_manager.repository().update(order);
        }
        self.match_cache_received_decline(
            trade.order_id.order_number.value(),
            trade.recipient_order_id,
            DeclinedTradeReason::Other,
        );
    }

    /// Feed a decline (from the wire, a timeout or a local failure) into
    /// the order's match cache and keep the pipeline moving.
    fn match_cache_received_decline(
        self: &Arc<Self>,
        order_number: u32,
        other_order_id: OrderId,
        reason: DeclinedTradeReason,
    ) {
        let order_id = OrderId::new(self.mid, OrderNumber::new(order_number));
        let Some(cache) = self.request_cache.match_cache(order_number) else {
            return;
        };
        let Some(order) = self.order_manager.repository().find_by_id(&order_id) else {
            return;
        };

        let mut matchmaker_notices: Vec<(TraderId, DeclineMatchReason)> = Vec::new();
        {
            let mut state = cache.lock().expect("match cache lock poisoned");
            state.received_responses.insert(other_order_id);
            match reason {
                DeclinedTradeReason::OrderCompleted => {
                    for payload in state.matches_for(&other_order_id) {
                        matchmaker_notices.push((
                            payload.matchmaker_trader_id,
                            DeclineMatchReason::OtherOrderCompleted,
                        ));
                    }
                }
                DeclinedTradeReason::OrderCancelled => {
                    for payload in state.matches_for(&other_order_id) {
                        matchmaker_notices.push((
                            payload.matchmaker_trader_id,
                            DeclineMatchReason::OtherOrderCancelled,
                        ));
                    }
                }
                DeclinedTradeReason::AddressLookupFail => {
                    for payload in state.matches_for(&other_order_id) {
                        matchmaker_notices
                            .push((payload.matchmaker_trader_id, DeclineMatchReason::Other));
                    }
                }
                DeclinedTradeReason::OrderReserved | DeclinedTradeReason::AlreadyTrading => {
                    if let Some(item) = state.get_outstanding_request_with(&other_order_id) {
                        debug!(other = %other_order_id, "re-queueing declined match with bumped retries");
                        state
                            .queue
                            .insert(item.retries + 1, item.price, item.order_id, item.quantity);
                    }
                }
                DeclinedTradeReason::NoAvailableQuantity => {
                    if let Some(item) = state.get_outstanding_request_with(&other_order_id) {
                        state
                            .queue
                            .insert(item.retries, item.price, item.order_id, item.quantity);
                    }
                }
                _ => {}
            }
            state.remove_outstanding_requests_with(&other_order_id);
        }

        for (matchmaker, notice) in matchmaker_notices {
            self.send_decline_match_message(&order, other_order_id, matchmaker, notice);
        }
        if order.status() == OrderStatus::Open {
            self.process_match(order_number);
        }
    }

    /// Remove a completed/cancelled order from every match cache queue.
    fn on_order_completed(&self, order_id: OrderId) {
        for cache in self.request_cache.match_caches() {
            cache
                .lock()
                .expect("match cache lock poisoned")
                .remove_order(&order_id);
        }
    }

    // --- negotiation handlers ---------------------------------------------

    fn check_trade_payload_validity(&self, recipient_order_id: &OrderId) -> Option<Order> {
        if recipient_order_id.trader_id != self.mid {
            warn!("trade payload not meant for this node");
            return None;
        }
        let order = self.order_manager.repository().find_by_id(recipient_order_id);
        if order.is_none() {
            warn!(order_id = %recipient_order_id, "trade payload names unknown order");
        }
        order
    }

    async fn received_proposed_trade(self: &Arc<Self>, trade: ProposedTrade, from: SocketAddr) {
        let Some(order) = self.check_trade_payload_validity(&trade.recipient_order_id) else {
            return;
        };
        self.update_ip(trade.trader_id, from);
        debug!(
            proposal_id = trade.proposal_id,
            from_trader = %trade.trader_id,
            order_id = %order.order_id(),
            "proposed trade received"
        );

        // Crossed proposals: both sides may have proposed to each other
        // simultaneously. The ask yields its own outstanding proposal and
        // handles the incoming one.
        let crossed = self
            .request_cache
            .outstanding_proposals(&order.order_id(), &trade.order_id);
        if !crossed.is_empty() && order.is_ask() {
            for proposal_id in crossed {
                let Some(dropped) = self.request_cache.pop_proposed(proposal_id) else {
                    continue;
                };
                info!(proposal_id, "discarding crossed outgoing proposal (ask yields)");
                if let Some(mut own) = self
                    .order_manager
                    .repository()
                    .find_by_id(&dropped.order_id)
                {
                    own.release_quantity_for_tick(
                        dropped.recipient_order_id,
                        dropped.assets.first().amount(),
                    );
                    self.order_manager.repository().update(own);
                }
                self.match_cache_received_decline(
                    dropped.order_id.order_number.value(),
                    dropped.recipient_order_id,
                    DeclinedTradeReason::Other,
                );
            }
        }

        let Some(mut order) = self
            .order_manager
            .repository()
            .find_by_id(&trade.recipient_order_id)
        else {
            return;
        };

        if order.available_quantity() == 0 {
            let reason = if order.status() == OrderStatus::Completed {
                DeclinedTradeReason::OrderCompleted
            } else {
                DeclinedTradeReason::OrderReserved
            };
            self.send_decline_trade(DeclinedTrade::decline(
                self.mid,
                Timestamp::now(),
                &trade,
                reason,
            ));
            return;
        }

        // Pre-actively reserve what we can fill.
        let quantity_in_propose = trade.assets.first().amount();
        let available_before = order.available_quantity();
        let should_counter = quantity_in_propose > available_before;
        let reserve_quantity = quantity_in_propose.min(available_before);
        order
            .reserve_quantity_for_tick(trade.order_id, reserve_quantity)
            .expect("reserve quantity bounded by available");
        self.order_manager.repository().update(order.clone());

        let mut decline_reason = None;
        match order.status() {
            OrderStatus::Expired => decline_reason = Some(DeclinedTradeReason::OrderExpired),
            OrderStatus::Cancelled => decline_reason = Some(DeclinedTradeReason::OrderCancelled),
            _ if !order.is_valid() => decline_reason = Some(DeclinedTradeReason::OrderInvalid),
            _ => {}
        }
        if decline_reason.is_none() {
            if let Some(policy) = &self.clearing_policy {
                if !policy.should_trade(&trade.trader_id).await {
                    decline_reason = Some(DeclinedTradeReason::AlreadyTrading);
                }
            }
        }

        if let Some(reason) = decline_reason {
            debug!(
                order_id = %order.order_id(),
                ?reason,
                available = order.available_quantity(),
                reserved = order.reserved_quantity(),
                "declining proposed trade"
            );
            self.send_decline_trade(DeclinedTrade::decline(
                self.mid,
                Timestamp::now(),
                &trade,
                reason,
            ));
            if let Some(mut order) = self
                .order_manager
                .repository()
                .find_by_id(&trade.recipient_order_id)
            {
                order.release_quantity_for_tick(trade.order_id, reserve_quantity);
                self.order_manager.repository().update(order);
            }
            return;
        }

        if !should_counter {
            self.start_trade(&trade, trade.assets.clone());
        } else {
            let Ok(new_pair) = order.assets().proportional_downscale_first(reserve_quantity)
            else {
                warn!(order_id = %order.order_id(), "cannot downscale for counter");
                return;
            };
            let counter = ProposedTrade::counter(self.mid, new_pair, Timestamp::now(), &trade);
            debug!(assets = %counter.assets, "countering proposed trade");
            let address = self.lookup_ip(&trade.trader_id).unwrap_or(from);
            self.send_proposed_trade(counter, address, true);
        }
    }

    fn send_decline_trade(&self, declined: DeclinedTrade) {
        let Some(address) = self.lookup_ip(&declined.recipient_order_id.trader_id) else {
            warn!(
                recipient = %declined.recipient_order_id,
                "decline trade: recipient address unknown"
            );
            return;
        };
        self.send_message(address, Message::DeclinedTrade(declined));
    }

    fn received_decline_trade(self: &Arc<Self>, declined: DeclinedTrade) {
        let Some(_) = self.check_trade_payload_validity(&declined.recipient_order_id) else {
            return;
        };
        if !self.request_cache.has_proposed(declined.proposal_id) {
            warn!(proposal_id = declined.proposal_id, "declined trade for unknown proposal");
            return;
        }
        let proposed = self
            .request_cache
            .pop_proposed(declined.proposal_id)
            .expect("checked above");

        if let Some(mut order) = self
            .order_manager
            .repository()
            .find_by_id(&declined.recipient_order_id)
        {
            order.release_quantity_for_tick(declined.order_id, proposed.assets.first().amount());
            self.order_manager.repository().update(order);
        }

        debug!(
            proposal_id = declined.proposal_id,
            reason = %declined.reason,
            "received declined trade"
        );
        let other_order_id = declined.order_id;
        self.match_cache_received_decline(
            declined.recipient_order_id.order_number.value(),
            other_order_id,
            declined.reason,
        );

        if declined.reason == DeclinedTradeReason::OrderCompleted
            || declined.reason == DeclinedTradeReason::OrderCancelled
        {
            self.on_order_completed(other_order_id);
        }
    }

    fn received_counter_trade(self: &Arc<Self>, counter: ProposedTrade) {
        let Some(_) = self.check_trade_payload_validity(&counter.recipient_order_id) else {
            return;
        };
        if !self.request_cache.has_proposed(counter.proposal_id) {
            warn!(proposal_id = counter.proposal_id, "counter trade for unknown proposal");
            return;
        }
        let proposed = self
            .request_cache
            .pop_proposed(counter.proposal_id)
            .expect("checked above");

        let Some(mut order) = self
            .order_manager
            .repository()
            .find_by_id(&counter.recipient_order_id)
        else {
            return;
        };
        info!(
            order_id = %order.order_id(),
            quantity = counter.assets.first().amount(),
            "received counter trade"
        );

        let decline_reason = if !order.is_valid() {
            Some(DeclinedTradeReason::OrderInvalid)
        } else if !order.has_acceptable_price(&counter.assets) {
            info!(
                order_id = %order.order_id(),
                counter_assets = %counter.assets,
                "unacceptable counter price"
            );
            Some(DeclinedTradeReason::UnacceptablePrice)
        } else {
            None
        };

        if let Some(reason) = decline_reason {
            self.send_decline_trade(DeclinedTrade::decline(
                self.mid,
                Timestamp::now(),
                &counter,
                reason,
            ));
            order.release_quantity_for_tick(counter.order_id, proposed.assets.first().amount());
            self.order_manager.repository().update(order);
            return;
        }

        // Adjust the reservation to the countered quantity and trade.
        order.release_quantity_for_tick(counter.order_id, proposed.assets.first().amount());
        order
            .reserve_quantity_for_tick(counter.order_id, counter.assets.first().amount())
            .expect("countered quantity fits after release");
        self.order_manager.repository().update(order);

        self.start_trade(&counter, counter.assets.clone());
    }

    /// Accept `incoming` with the agreed `assets`: hand the trade to the
    /// settlement driver and tell the counterparty to start.
    fn start_trade(self: &Arc<Self>, incoming: &ProposedTrade, assets: AssetPair) {
        let start = ProposedTrade::start(self.mid, assets, Timestamp::now(), incoming);
        info!(
            own = %start.order_id,
            other = %start.recipient_order_id,
            "starting trade"
        );
        let own_is_ask = self
            .order_manager
            .repository()
            .find_by_id(&start.order_id)
            .map(|order| order.is_ask())
            .unwrap_or(false);
        self.trading_engine.trade(&start, start.order_id, own_is_ask);

        if let Some(address) = self.lookup_ip(&incoming.trader_id) {
            self.send_message(address, Message::StartTrade(start));
        }
    }

    fn received_start_trade(self: &Arc<Self>, start: ProposedTrade) {
        let Some(order) = self.check_trade_payload_validity(&start.recipient_order_id) else {
            return;
        };
        if !self.request_cache.has_proposed(start.proposal_id) {
            warn!(proposal_id = start.proposal_id, "start trade for unknown proposal");
            return;
        }
        self.request_cache.pop_proposed(start.proposal_id);
        info!(from_trader = %start.trader_id, "received start trade");
        self.trading_engine
            .trade(&start, start.recipient_order_id, order.is_ask());
    }

    // --- settlement callbacks ---------------------------------------------

    /// A payment leg confirmed: update the local order's accounting.
    pub fn on_payment(
        &self,
        order_id: OrderId,
        partner_order_id: OrderId,
        transferred: &AssetAmount,
    ) {
        let Some(mut order) = self.order_manager.repository().find_by_id(&order_id) else {
            return;
        };
        order.add_trade(partner_order_id, transferred);
        self.order_manager.repository().update(order);
    }

    /// A transaction completed: notify the introducing matchmakers and
    /// broadcast the completion.
    pub fn on_transaction_completed(self: &Arc<Self>, transaction: &Transaction) {
        info!(
            transaction_id = %transaction.transaction_id(),
            "trade completed"
        );
        let trade = ProposedTrade {
            trader_id: self.mid,
            order_id: transaction.order_id(),
            recipient_order_id: transaction.partner_order_id(),
            proposal_id: transaction.proposal_id(),
            assets: transaction.assets().clone(),
            timestamp: transaction.timestamp(),
        };
        let trade_id = transaction.transaction_id();
        self.match_cache_did_trade(&trade, trade_id);
        self.broadcast_trade_completed(&trade, trade_id);
    }

    fn match_cache_did_trade(self: &Arc<Self>, trade: &ProposedTrade, trade_id: TransactionId) {
        let order_number = trade.order_id.order_number.value();
        let Some(cache) = self.request_cache.match_cache(order_number) else {
            return;
        };
        let Some(order) = self.order_manager.repository().find_by_id(&trade.order_id) else {
            return;
        };

        let other_order_id = trade.recipient_order_id;
        let matchmakers: Vec<TraderId> = {
            let mut state = cache.lock().expect("match cache lock poisoned");
            state.remove_outstanding_requests_with(&other_order_id);
            let payloads = state.matches_for(&other_order_id);
            if !payloads.is_empty() {
                state.received_responses.insert(other_order_id);
            }
            payloads
                .iter()
                .map(|payload| payload.matchmaker_trader_id)
                .collect()
        };

        for matchmaker in matchmakers {
            let Some(address) = self.lookup_ip(&matchmaker) else {
                continue;
            };
            info!(
                order_id = %trade.order_id,
                matchmaker = %matchmaker,
                "sending trade completion to matchmaker"
            );
            self.send_message(
                address,
                Message::MatchedTradeComplete(CompletedTradePayload {
                    trade: trade.clone(),
                    trade_id,
                }),
            );
        }

        if order.status() == OrderStatus::Open {
            self.process_match(order_number);
        } else {
            self.request_cache.pop_match_cache(order_number);
        }
    }

    fn broadcast_trade_completed(self: &Arc<Self>, trade: &ProposedTrade, trade_id: TransactionId) {
        debug!(
            a = %trade.order_id,
            b = %trade.recipient_order_id,
            "broadcasting trade completion"
        );

        // Settle our own replica first, if we are a matchmaker.
        if self.is_matchmaker() {
            let completed = self.order_book.update_ticks(
                &trade.order_id,
                &trade.recipient_order_id,
                trade.assets.first().amount(),
                trade_id,
            );
            for order_id in completed {
                self.on_order_completed(order_id);
            }
            self.match_order_ids(&[trade.order_id, trade.recipient_order_id]);
        }

        let order = self
            .order_manager
            .repository()
            .find_by_id(&trade.order_id)
            .or_else(|| {
                self.order_manager
                    .repository()
                    .find_by_id(&trade.recipient_order_id)
            });
        let addresses = match order {
            Some(order) if !order.broadcast_peers.is_empty() => order.broadcast_peers,
            _ => self.select_broadcast_addresses(),
        };
        for address in addresses {
            self.send_message(
                address,
                Message::CompleteTrade(CompletedTradePayload {
                    trade: trade.clone(),
                    trade_id,
                }),
            );
        }
    }

    // --- matchmaker message handlers --------------------------------------

    fn on_tick(self: &Arc<Self>, tick: Tick) {
        if !self.is_matchmaker() {
            return;
        }
        let order_id = tick.order_id();
        if self.order_book.tick_exists(&order_id) || self.order_book.is_cancelled(&order_id) {
            return;
        }
        info!(order_id = %order_id, assets = %tick.assets(), "inserting gossiped tick");
        let inserted = if tick.is_ask() {
            self.order_book.insert_ask(tick)
        } else {
            self.order_book.insert_bid(tick)
        };
        if let Err(error) = inserted {
            debug!(%error, "gossiped tick rejected");
            return;
        }

        if self.settings.first_matches_own_orders {
            for order in self.order_manager.repository().find_all() {
                if !order.is_valid() {
                    continue;
                }
                if let Some(entry) = self.order_book.get_tick(&order.order_id()) {
                    self.match_tick(&entry);
                }
            }
        }
        if let Some(entry) = self.order_book.get_tick(&order_id) {
            self.match_tick(&entry);
        }
    }

    fn received_cancel_order(self: &Arc<Self>, payload: CancelOrderPayload) {
        if !self.is_matchmaker() {
            return;
        }
        let order_id = payload.order_id();
        info!(order_id = %order_id, "received order cancellation");
        self.order_book.remove_tick(&order_id);
        self.order_book.mark_cancelled(order_id);
        self.on_order_completed(order_id);
    }

    fn received_decline_match(self: &Arc<Self>, payload: DeclineMatchPayload) {
        if !self.is_matchmaker() {
            return;
        }
        let order_id = OrderId::new(payload.trader_id, payload.order_number);
        let matched_order_id = payload.other_order_id;
        info!(
            tick = %order_id,
            matched = %matched_order_id,
            reason = ?payload.reason,
            "received decline-match"
        );

        let tick_entry = self.order_book.get_tick(&order_id);
        let matched_entry = self.order_book.get_tick(&matched_order_id);

        if let (Some(tick), Some(matched)) = (&tick_entry, &matched_entry) {
            tick.block_for_matching(matched_order_id);
            matched.block_for_matching(order_id);
        }

        if matched_entry.is_some()
            && (payload.reason == DeclineMatchReason::OtherOrderCompleted
                || payload.reason == DeclineMatchReason::OtherOrderCancelled)
        {
            self.order_book.remove_tick(&matched_order_id);
            self.order_book.mark_completed(matched_order_id);
            self.on_order_completed(matched_order_id);
        }

        if payload.reason == DeclineMatchReason::OrderCompleted {
            if tick_entry.is_some() {
                self.order_book.remove_tick(&order_id);
                self.order_book.mark_completed(order_id);
            }
        } else if let Some(entry) = tick_entry {
            // The match fell through; look for another counterparty.
            self.match_tick(&entry);
        }
    }

    fn received_completed_trade(self: &Arc<Self>, payload: CompletedTradePayload, rematch: bool) {
        if !self.is_matchmaker() {
            return;
        }
        let trade = &payload.trade;
        let completed = self.order_book.update_ticks(
            &trade.order_id,
            &trade.recipient_order_id,
            trade.assets.first().amount(),
            payload.trade_id,
        );
        for order_id in completed {
            self.on_order_completed(order_id);
        }
        if rematch {
            self.match_order_ids(&[trade.order_id, trade.recipient_order_id]);
        }
    }

    // --- orderbook sync ---------------------------------------------------

    /// The Bloom summary of this matchmaker's order ids.
    pub fn orders_bloom_filter(&self) -> BloomFilter {
        let order_ids = self.order_book.get_order_ids();
        let mut bloom =
            BloomFilter::new(protocol::DEFAULT_ERROR_RATE, order_ids.len().max(1), b' ');
        for order_id in &order_ids {
            bloom.add(&order_id.to_key());
        }
        bloom
    }

    fn sync_orderbook(&self) {
        if !self.is_matchmaker() {
            return;
        }
        let fixed = self
            .fixed_broadcast_set
            .lock()
            .expect("broadcast set poisoned")
            .clone();
        let candidates: Vec<SocketAddr> = if !fixed.is_empty() {
            fixed
        } else {
            self.matchmakers.iter().map(|entry| *entry.value()).collect()
        };
        let Some(address) = ({
            let mut rng = rand::thread_rng();
            candidates.choose(&mut rng).copied()
        }) else {
            return;
        };
        self.send_orderbook_sync(address);
    }

    /// Offer our order-id set to one peer.
    pub fn send_orderbook_sync(&self, address: SocketAddr) {
        debug!(%address, "sending orderbook sync");
        self.send_message(
            address,
            Message::OrderbookSync(OrderbookSyncPayload {
                trader_id: self.mid,
                timestamp: Timestamp::now(),
                bloom: self.orders_bloom_filter(),
            }),
        );
    }

    fn received_orderbook_sync(&self, payload: OrderbookSyncPayload, from: SocketAddr) {
        if !self.is_matchmaker() {
            return;
        }
        let mut missing: Vec<OrderId> = self
            .order_book
            .get_order_ids()
            .into_iter()
            .filter(|order_id| !payload.bloom.contains(&order_id.to_key()))
            .collect();
        {
            let mut rng = rand::thread_rng();
            missing.shuffle(&mut rng);
        }
        missing.truncate(self.settings.num_order_sync);

        debug!(%from, count = missing.len(), "answering orderbook sync");
        for order_id in missing {
            if let Some(entry) = self.order_book.get_tick(&order_id) {
                self.send_message(
                    from,
                    Message::Order(OrderPayload::from_tick(&entry.tick())),
                );
            }
        }
    }

    // --- ping -------------------------------------------------------------

    /// Ping a peer; resolves `true` when a pong arrives in time.
    pub fn ping_peer(self: &Arc<Self>, address: SocketAddr) -> oneshot::Receiver<bool> {
        let identifier: u32 = rand::random();
        let (responder, receiver) = oneshot::channel();
        let this = self.clone();
        let timeout_task = tokio::spawn(async move {
            tokio::time::sleep(this.settings.ping_timeout).await;
            this.request_cache.resolve_ping(identifier, false);
        });
        self.request_cache
            .add_ping(identifier, PingCache::new(responder, timeout_task));
        self.send_message(
            address,
            Message::Ping(PingPongPayload {
                trader_id: self.mid,
                timestamp: Timestamp::now(),
                identifier,
            }),
        );
        receiver
    }

    // --- dispatch ---------------------------------------------------------

    /// Decode and handle one packet from the transport.
    pub async fn handle_packet(self: &Arc<Self>, from: SocketAddr, data: &[u8]) {
        let packet = match protocol::decode(data) {
            Ok(packet) => packet,
            Err(error) => {
                warn!(%from, %error, "dropping undecodable packet");
                return;
            }
        };
        let sender = packet.sender();
        self.update_ip(sender, from);

        match packet.message {
            Message::Order(payload) => self.on_tick(payload.to_tick()),
            Message::CancelOrder(payload) => self.received_cancel_order(payload),
            Message::Match(payload) => {
                self.update_ip(payload.matchmaker_trader_id, from);
                self.add_matchmaker(payload.matchmaker_trader_id, from);
                self.process_match_payload(payload);
            }
            Message::MatchDecline(payload) => self.received_decline_match(payload),
            Message::ProposedTrade(trade) => self.received_proposed_trade(trade, from).await,
            Message::DeclinedTrade(declined) => self.received_decline_trade(declined),
            Message::CounterTrade(counter) => self.received_counter_trade(counter),
            Message::StartTrade(start) => self.received_start_trade(start),
            Message::OrderbookSync(payload) => self.received_orderbook_sync(payload, from),
            Message::Ping(payload) => {
                self.send_message(
                    from,
                    Message::Pong(PingPongPayload {
                        trader_id: self.mid,
                        timestamp: Timestamp::now(),
                        identifier: payload.identifier,
                    }),
                );
            }
            Message::Pong(payload) => {
                if !self.request_cache.resolve_ping(payload.identifier, true) {
                    warn!(identifier = payload.identifier, "pong for unknown ping");
                }
            }
            Message::MatchedTradeComplete(payload) => self.received_completed_trade(payload, false),
            Message::CompleteTrade(payload) => self.received_completed_trade(payload, true),
        }
    }
}

impl Drop for MarketCommunity {
    fn drop(&mut self) {
        for task in self.tasks.lock().expect("task list poisoned").drain(..) {
            task.abort();
        }
    }
}
