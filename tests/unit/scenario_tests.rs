//! End-to-end trading scenarios over the in-memory network.

use crate::helpers::{TestNet, TestNode, dummy_pair, fast_settings, introduce};
use anydex::prelude::*;
use anydex::protocol::MSG_PROPOSED_TRADE;
use std::time::Duration;
use tokio::time::sleep;

fn complete_locally(node: &TestNode, order_id: &OrderId) {
    // Simulate a fill the rest of the network has not seen yet.
    let mut order = node.order(order_id);
    let ghost = OrderId::new(TraderId::new([0xEE; 20]), OrderNumber::new(1));
    let first = order.assets().first().clone();
    let second = order.assets().second().clone();
    order
        .reserve_quantity_for_tick(ghost, first.amount())
        .unwrap();
    order.add_trade(ghost, &first);
    order.add_trade(ghost, &second);
    node.community.order_manager().repository().update(order);
}

#[tokio::test]
async fn match_and_fully_settle() {
    let mut net = TestNet::new();
    let b = net.spawn_node(true, fast_settings());
    let a = net.spawn_node(false, fast_settings());
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    let ask = a
        .community
        .create_ask(dummy_pair(10, 10), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(b.community.order_book().ask_exists(&ask.order_id()));

    let bid = c
        .community
        .create_bid(dummy_pair(10, 10), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    let a_order = a.order(&ask.order_id());
    assert_eq!(a_order.traded_quantity(), 10);
    assert_eq!(a_order.received_quantity(), 10);
    assert_eq!(a_order.status(), OrderStatus::Completed);
    assert_eq!(a_order.reserved_quantity(), 0);

    let c_order = c.order(&bid.order_id());
    assert_eq!(c_order.status(), OrderStatus::Completed);

    // Both ticks are gone from the matchmaker's book.
    assert!(!b.community.order_book().tick_exists(&ask.order_id()));
    assert!(!b.community.order_book().tick_exists(&bid.order_id()));

    assert_eq!(a.community.trading_engine().transactions().len(), 1);
    assert_eq!(c.community.trading_engine().transactions().len(), 1);
}

#[tokio::test]
async fn settled_balances_move_through_the_wallets() {
    let mut net = TestNet::new();
    let b = net.spawn_node(true, fast_settings());
    let a = net.spawn_node(false, fast_settings());
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    a.community
        .create_ask(dummy_pair(10, 13), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    c.community
        .create_bid(dummy_pair(10, 13), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(a.balance("DUM1").await, 990);
    assert_eq!(a.balance("DUM2").await, 10013);
    assert_eq!(c.balance("DUM1").await, 1010);
    assert_eq!(c.balance("DUM2").await, 9987);
}

#[tokio::test]
async fn partial_fill_keeps_the_order_open() {
    let mut net = TestNet::new();
    let b = net.spawn_node(true, fast_settings());
    let a = net.spawn_node(false, fast_settings());
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    let ask = a
        .community
        .create_ask(dummy_pair(10, 10), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    c.community
        .create_bid(dummy_pair(2, 2), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    let a_order = a.order(&ask.order_id());
    assert_eq!(a_order.traded_quantity(), 2);
    assert_eq!(a_order.available_quantity(), 8);
    assert_eq!(a_order.status(), OrderStatus::Open);
    assert_eq!(a.community.trading_engine().transactions().len(), 1);
    assert_eq!(c.community.trading_engine().transactions().len(), 1);

    // The matchmaker's replica of the ask advanced as well.
    let remaining = b
        .community
        .order_book()
        .get_tick(&ask.order_id())
        .expect("ask still in book");
    assert_eq!(remaining.available_for_matching(), 8);

    // A second bid for the remainder closes the ask.
    c.community
        .create_bid(dummy_pair(8, 8), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    let a_order = a.order(&ask.order_id());
    assert_eq!(a_order.status(), OrderStatus::Completed);
    assert_eq!(a.community.trading_engine().transactions().len(), 2);
    assert!(!b.community.order_book().tick_exists(&ask.order_id()));
}

#[tokio::test]
async fn counter_trade_downscales_to_available_quantity() {
    let mut net = TestNet::new();
    let b = net.spawn_node(true, fast_settings());
    let a = net.spawn_node(false, fast_settings());
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    let ask = a
        .community
        .create_ask(dummy_pair(2, 2), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_millis(200)).await;

    // Partially fill the ask behind the matchmaker's back, so the
    // incoming proposal for 2 exceeds what is left.
    {
        let mut order = a.order(&ask.order_id());
        let ghost = OrderId::new(TraderId::new([0xEE; 20]), OrderNumber::new(1));
        order.reserve_quantity_for_tick(ghost, 1).unwrap();
        order.add_trade(ghost, &AssetAmount::new(1, "DUM1"));
        a.community.order_manager().repository().update(order);
    }

    c.community
        .create_bid(dummy_pair(2, 2), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    let transactions = c.community.trading_engine().transactions();
    assert_eq!(transactions.len(), 1);
    // The countered trade covers only the single remaining unit.
    assert_eq!(transactions[0].assets().first().amount(), 1);

    let a_order = a.order(&ask.order_id());
    assert_eq!(a_order.traded_quantity(), 2);
    assert_eq!(a_order.reserved_quantity(), 0);
}

#[tokio::test]
async fn completed_order_declines_matches() {
    let mut net = TestNet::new();
    let b = net.spawn_node(true, fast_settings());
    let a = net.spawn_node(false, fast_settings());
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    let ask = a
        .community
        .create_ask(dummy_pair(1, 1), Timeout::new(3600))
        .unwrap();
    complete_locally(&a, &ask.order_id());
    sleep(Duration::from_millis(200)).await;
    assert!(b.community.order_book().ask_exists(&ask.order_id()));

    c.community
        .create_bid(dummy_pair(1, 1), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    // The decline chain reached the matchmaker: the stale ask is gone
    // and nothing traded.
    assert!(!b.community.order_book().tick_exists(&ask.order_id()));
    assert!(a.community.trading_engine().transactions().is_empty());
    assert!(c.community.trading_engine().transactions().is_empty());
}

#[tokio::test]
async fn cancel_race_never_trades() {
    let mut net = TestNet::new();
    let b = net.spawn_node(true, fast_settings());
    let a = net.spawn_node(false, fast_settings());
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    let ask = a
        .community
        .create_ask(dummy_pair(2, 2), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_millis(200)).await;

    let bid = c
        .community
        .create_bid(dummy_pair(2, 2), Timeout::new(3600))
        .unwrap();
    // Cancel before yielding to the network.
    c.community.cancel_order(&bid.order_id());

    sleep(Duration::from_secs(1)).await;

    assert!(a.community.trading_engine().transactions().is_empty());
    assert!(c.community.trading_engine().transactions().is_empty());
    assert!(!b.community.order_book().tick_exists(&bid.order_id()));
    assert!(b.community.order_book().tick_exists(&ask.order_id()));

    let a_order = a.order(&ask.order_id());
    assert_eq!(a_order.reserved_quantity(), 0);
    assert_eq!(a_order.status(), OrderStatus::Open);
}

#[tokio::test]
async fn crossed_proposals_settle_exactly_once() {
    let mut net = TestNet::new();
    // No real matchmaker: the crossed matches are injected by hand, with
    // a bystander node playing the matchmaker role in the payloads.
    let b = net.spawn_node(false, fast_settings());
    let a = net.spawn_node(false, fast_settings());
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    let bid = a
        .community
        .create_bid(dummy_pair(1, 1), Timeout::new(3600))
        .unwrap();
    let ask = c
        .community
        .create_ask(dummy_pair(1, 1), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    let match_for = |own: &Order, other: &Order| {
        Message::Match(anydex::protocol::MatchPayload {
            tick: anydex::protocol::OrderPayload::from_tick(&Tick::from_order(other)),
            recipient_order_number: own.order_id().order_number,
            match_trader_id: other.order_id().trader_id,
            matchmaker_trader_id: b.community.mid(),
        })
    };
    let to_a = encode(&Packet::new(b.public_key.clone(), match_for(&bid, &ask)));
    let to_c = encode(&Packet::new(b.public_key.clone(), match_for(&ask, &bid)));

    // Both sides learn of each other at the same instant and race their
    // proposals; the ask yields on the crossing.
    a.community.handle_packet(b.address, &to_a).await;
    c.community.handle_packet(b.address, &to_c).await;

    sleep(Duration::from_secs(4)).await;

    assert_eq!(a.community.trading_engine().transactions().len(), 1);
    assert_eq!(c.community.trading_engine().transactions().len(), 1);

    let a_order = a.order(&bid.order_id());
    let c_order = c.order(&ask.order_id());
    assert_eq!(a_order.status(), OrderStatus::Completed);
    assert_eq!(c_order.status(), OrderStatus::Completed);
    assert_eq!(a_order.reserved_quantity(), 0);
    assert_eq!(c_order.reserved_quantity(), 0);
}

#[tokio::test]
async fn proposal_timeout_releases_the_reservation() {
    let mut net = TestNet::new();
    let b = net.spawn_node(true, fast_settings());
    // A drops every incoming proposed trade on the floor.
    let (a, mut a_inbox) = net.spawn_node_manual(false, fast_settings());
    let a_community = a.community.clone();
    tokio::spawn(async move {
        while let Some((from, bytes)) = a_inbox.recv().await {
            if bytes.first() == Some(&MSG_PROPOSED_TRADE) {
                continue;
            }
            a_community.handle_packet(from, &bytes).await;
        }
    });
    let c = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b, &c]);

    let ask = a
        .community
        .create_ask(dummy_pair(1, 1), Timeout::new(3600))
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    let bid = c
        .community
        .create_bid(dummy_pair(1, 1), Timeout::new(3600))
        .unwrap();

    // C reserves on dispatch; A never sees the proposal.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(c.order(&bid.order_id()).reserved_quantity(), 1);

    // After the proposal timeout the reservation is gone on both sides.
    sleep(Duration::from_secs(2)).await;
    assert_eq!(a.order(&ask.order_id()).reserved_quantity(), 0);
    assert_eq!(c.order(&bid.order_id()).reserved_quantity(), 0);
    assert!(a.community.trading_engine().transactions().is_empty());
    assert!(c.community.trading_engine().transactions().is_empty());
    assert_eq!(a.order(&ask.order_id()).status(), OrderStatus::Open);
    assert_eq!(c.order(&bid.order_id()).status(), OrderStatus::Open);

    // C's match cache went back to idle and recorded the (timed out)
    // response from A's order.
    let cache = c
        .community
        .request_cache()
        .match_cache(bid.order_id().order_number.value())
        .expect("match cache present");
    let state = cache.lock().unwrap();
    assert!(state.received_responses().contains(&ask.order_id()));
}
