//! The request cache: per-order match state and outstanding requests.
//!
//! Every pending interaction with a timer lives here, keyed the way the
//! wire correlates it: match caches by local order number, proposed
//! trades by proposal id, pings by their random identifier. Peer shutdown
//! clears the cache and aborts every timer.

use super::match_queue::{MatchPriorityQueue, QueueItem};
use crate::ids::OrderId;
use crate::order::Order;
use crate::protocol::MatchPayload;
use crate::trade::ProposedTrade;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Per-order serialization of incoming match suggestions.
///
/// Matchmakers may suggest the same counterparty redundantly and with
/// conflicting prices; the cache keeps every introducing matchmaker per
/// counterparty (for completion notices), while the queue and the
/// outstanding list ensure at most one live proposal per counterparty.
pub struct MatchCache {
    /// The local order this cache belongs to.
    pub order_id: OrderId,
    /// Payloads seen per counterparty, one per introducing matchmaker.
    pub(crate) matches: HashMap<OrderId, Vec<MatchPayload>>,
    /// Suggestions waiting to be turned into proposals.
    pub(crate) queue: MatchPriorityQueue,
    /// Suggestions currently being negotiated.
    pub(crate) outstanding_requests: Vec<QueueItem>,
    /// Counterparties that have answered (for dedup bookkeeping).
    pub(crate) received_responses: HashSet<OrderId>,
    /// The coalescing window timer, once armed.
    pub(crate) schedule_task: Option<JoinHandle<()>>,
    /// Whether the window already fired.
    pub(crate) schedule_task_done: bool,
}

impl MatchCache {
    /// Create the cache for a local order.
    pub fn new(order: &Order) -> Self {
        MatchCache {
            order_id: order.order_id(),
            matches: HashMap::new(),
            queue: MatchPriorityQueue::new(order.is_ask()),
            outstanding_requests: Vec::new(),
            received_responses: HashSet::new(),
            schedule_task: None,
            schedule_task_done: false,
        }
    }

    /// Record a payload under its counterparty, keeping one entry per
    /// introducing matchmaker. Returns whether the counterparty should be
    /// queued (neither queued nor outstanding yet).
    pub(crate) fn store_match(&mut self, payload: MatchPayload) -> bool {
        let other_order_id = payload.other_order_id();
        let known = self.matches.entry(other_order_id).or_default();
        if !known
            .iter()
            .any(|p| p.matchmaker_trader_id == payload.matchmaker_trader_id)
        {
            known.push(payload);
        }

        !self.queue.contains_order(&other_order_id)
            && !self.has_outstanding_request_with(&other_order_id)
    }

    /// The stored payloads for a counterparty.
    pub(crate) fn matches_for(&self, other_order_id: &OrderId) -> Vec<MatchPayload> {
        self.matches
            .get(other_order_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Counterparties that have answered (or timed out) a proposal of
    /// this order.
    pub fn received_responses(&self) -> &HashSet<OrderId> {
        &self.received_responses
    }

    /// Whether a request towards `order_id` is outstanding.
    pub(crate) fn has_outstanding_request_with(&self, order_id: &OrderId) -> bool {
        self.outstanding_requests
            .iter()
            .any(|item| item.order_id == *order_id)
    }

    /// The outstanding request towards `order_id`, if any.
    pub(crate) fn get_outstanding_request_with(&self, order_id: &OrderId) -> Option<QueueItem> {
        self.outstanding_requests
            .iter()
            .find(|item| item.order_id == *order_id)
            .cloned()
    }

    /// Drop every outstanding request towards `order_id`.
    pub(crate) fn remove_outstanding_requests_with(&mut self, order_id: &OrderId) {
        self.outstanding_requests
            .retain(|item| item.order_id != *order_id);
    }

    /// Drop queued suggestions for a gone counterparty order.
    pub(crate) fn remove_order(&mut self, order_id: &OrderId) {
        self.queue.remove_order(order_id);
    }

    /// Abort the coalescing timer.
    pub(crate) fn cancel_schedule_task(&mut self) {
        if let Some(task) = self.schedule_task.take() {
            task.abort();
        }
    }
}

/// An outstanding proposed (or counter) trade awaiting its answer.
pub struct ProposedTradeCache {
    /// The dispatched proposal.
    pub proposed_trade: ProposedTrade,
    timeout_task: Option<JoinHandle<()>>,
}

impl ProposedTradeCache {
    /// Track `proposed_trade` with its timeout task.
    pub fn new(proposed_trade: ProposedTrade, timeout_task: JoinHandle<()>) -> Self {
        ProposedTradeCache {
            proposed_trade,
            timeout_task: Some(timeout_task),
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.timeout_task.take() {
            task.abort();
        }
    }
}

/// An outstanding ping awaiting its pong.
pub struct PingCache {
    responder: Option<oneshot::Sender<bool>>,
    timeout_task: Option<JoinHandle<()>>,
}

impl PingCache {
    /// Track a ping; `responder` fires `true` on pong, `false` on timeout.
    pub fn new(responder: oneshot::Sender<bool>, timeout_task: JoinHandle<()>) -> Self {
        PingCache {
            responder: Some(responder),
            timeout_task: Some(timeout_task),
        }
    }

    fn resolve(mut self, alive: bool) {
        if let Some(task) = self.timeout_task.take() {
            task.abort();
        }
        if let Some(responder) = self.responder.take() {
            let _ = responder.send(alive);
        }
    }
}

/// All pending request state of one community.
pub struct RequestCache {
    matches: DashMap<u32, Arc<Mutex<MatchCache>>>,
    proposed: DashMap<u32, ProposedTradeCache>,
    pings: DashMap<u32, PingCache>,
}

impl RequestCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        RequestCache {
            matches: DashMap::new(),
            proposed: DashMap::new(),
            pings: DashMap::new(),
        }
    }

    /// The match cache for a local order number, if present.
    pub fn match_cache(&self, order_number: u32) -> Option<Arc<Mutex<MatchCache>>> {
        self.matches
            .get(&order_number)
            .map(|entry| entry.value().clone())
    }

    /// The match cache for `order`, created on first use.
    pub fn get_or_create_match_cache(&self, order: &Order) -> Arc<Mutex<MatchCache>> {
        self.matches
            .entry(order.order_id().order_number.value())
            .or_insert_with(|| Arc::new(Mutex::new(MatchCache::new(order))))
            .clone()
    }

    /// Remove the match cache for an order number, aborting its timer.
    pub fn pop_match_cache(&self, order_number: u32) -> Option<Arc<Mutex<MatchCache>>> {
        let (_, cache) = self.matches.remove(&order_number)?;
        cache
            .lock()
            .expect("match cache lock poisoned")
            .cancel_schedule_task();
        Some(cache)
    }

    /// All live match caches.
    pub fn match_caches(&self) -> Vec<Arc<Mutex<MatchCache>>> {
        self.matches
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Track an outstanding proposal.
    pub fn add_proposed(&self, cache: ProposedTradeCache) {
        self.proposed
            .insert(cache.proposed_trade.proposal_id, cache);
    }

    /// Whether a proposal is outstanding.
    pub fn has_proposed(&self, proposal_id: u32) -> bool {
        self.proposed.contains_key(&proposal_id)
    }

    /// Pop an outstanding proposal, aborting its timeout task.
    pub fn pop_proposed(&self, proposal_id: u32) -> Option<ProposedTrade> {
        let (_, mut cache) = self.proposed.remove(&proposal_id)?;
        cache.cancel();
        Some(cache.proposed_trade)
    }

    /// Proposal ids of outstanding proposals from `order_id` towards
    /// `partner_order_id`. Used to detect crossed proposals.
    pub fn outstanding_proposals(
        &self,
        order_id: &OrderId,
        partner_order_id: &OrderId,
    ) -> Vec<u32> {
        self.proposed
            .iter()
            .filter(|entry| {
                entry.value().proposed_trade.order_id == *order_id
                    && entry.value().proposed_trade.recipient_order_id == *partner_order_id
            })
            .map(|entry| *entry.key())
            .collect()
    }

    /// Proposal ids of every outstanding proposal sent from `order_id`.
    /// Used when the order is cancelled.
    pub fn proposals_from_order(&self, order_id: &OrderId) -> Vec<u32> {
        self.proposed
            .iter()
            .filter(|entry| entry.value().proposed_trade.order_id == *order_id)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Track an outstanding ping.
    pub fn add_ping(&self, identifier: u32, cache: PingCache) {
        self.pings.insert(identifier, cache);
    }

    /// Resolve an outstanding ping.
    pub fn resolve_ping(&self, identifier: u32, alive: bool) -> bool {
        match self.pings.remove(&identifier) {
            Some((_, cache)) => {
                cache.resolve(alive);
                true
            }
            None => false,
        }
    }

    /// Abort every timer and drop all pending state.
    pub fn clear(&self) {
        for entry in self.matches.iter() {
            entry
                .value()
                .lock()
                .expect("match cache lock poisoned")
                .cancel_schedule_task();
        }
        self.matches.clear();

        let proposal_ids: Vec<u32> = self.proposed.iter().map(|entry| *entry.key()).collect();
        for proposal_id in proposal_ids {
            if let Some((_, mut cache)) = self.proposed.remove(&proposal_id) {
                cache.cancel();
            }
        }

        let ping_ids: Vec<u32> = self.pings.iter().map(|entry| *entry.key()).collect();
        for identifier in ping_ids {
            if let Some((_, cache)) = self.pings.remove(&identifier) {
                cache.resolve(false);
            }
        }
        debug!("request cache cleared");
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        RequestCache::new()
    }
}
