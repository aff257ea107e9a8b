//! Matchmaker orderbook synchronization and keep-alive.

use crate::helpers::{TestNet, dummy_pair, fast_settings, introduce};
use anydex::prelude::*;
use std::time::Duration;
use tokio::time::sleep;

fn tick(byte: u8, number: u32, first: u64, second: u64) -> Tick {
    Tick::ask(
        OrderId::new(TraderId::new([byte; 20]), OrderNumber::new(number)),
        dummy_pair(first, second),
        Timeout::new(3600),
        Timestamp::now(),
        0,
    )
}

#[tokio::test]
async fn sync_fills_in_missing_ticks() {
    let mut net = TestNet::new();
    let m1 = net.spawn_node(true, fast_settings());
    let m2 = net.spawn_node(true, fast_settings());
    introduce(&[&m1, &m2]);

    let book1 = m1.community.order_book();
    book1.insert_ask(tick(1, 1, 10, 10)).unwrap();
    book1.insert_ask(tick(2, 1, 5, 15)).unwrap();
    assert!(m2.community.order_book().get_order_ids().is_empty());

    // m2 offers its (empty) book; m1 answers with everything m2 lacks.
    m2.community.send_orderbook_sync(m1.address);
    sleep(Duration::from_millis(300)).await;

    let synced = m2.community.order_book().get_order_ids();
    assert_eq!(synced.len(), 2);
}

#[tokio::test]
async fn identical_books_have_nothing_to_sync() {
    let mut net = TestNet::new();
    let m1 = net.spawn_node(true, fast_settings());
    let m2 = net.spawn_node(true, fast_settings());
    introduce(&[&m1, &m2]);

    for number in 1..=5 {
        m1.community
            .order_book()
            .insert_ask(tick(1, number, 10, 10))
            .unwrap();
        m2.community
            .order_book()
            .insert_ask(tick(1, number, 10, 10))
            .unwrap();
    }

    // Every id on the receiving side is covered by the sender's bloom:
    // a sync round between identical books transmits zero ticks.
    let bloom = m1.community.orders_bloom_filter();
    let missing = m2
        .community
        .order_book()
        .get_order_ids()
        .into_iter()
        .filter(|order_id| !bloom.contains(&order_id.to_key()))
        .count();
    assert_eq!(missing, 0);

    m2.community.send_orderbook_sync(m1.address);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(m2.community.order_book().get_order_ids().len(), 5);
}

#[tokio::test]
async fn sync_caps_ticks_per_round() {
    let mut net = TestNet::new();
    let settings = MarketSettings {
        num_order_sync: 3,
        ..fast_settings()
    };
    let m1 = net.spawn_node(true, settings.clone());
    let m2 = net.spawn_node(true, settings);
    introduce(&[&m1, &m2]);

    for number in 1..=10 {
        m1.community
            .order_book()
            .insert_ask(tick(1, number, 10, 10))
            .unwrap();
    }

    m2.community.send_orderbook_sync(m1.address);
    sleep(Duration::from_millis(300)).await;

    assert_eq!(m2.community.order_book().get_order_ids().len(), 3);

    // The next round fills in more of the divergence.
    m2.community.send_orderbook_sync(m1.address);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(m2.community.order_book().get_order_ids().len(), 6);
}

#[tokio::test]
async fn cancelled_orders_are_not_resynced() {
    let mut net = TestNet::new();
    let m1 = net.spawn_node(true, fast_settings());
    let m2 = net.spawn_node(true, fast_settings());
    introduce(&[&m1, &m2]);

    let stale = tick(1, 1, 10, 10);
    m1.community.order_book().insert_ask(stale.clone()).unwrap();
    // m2 saw the cancellation; m1 has not yet.
    m2.community.order_book().mark_cancelled(stale.order_id());

    m2.community.send_orderbook_sync(m1.address);
    sleep(Duration::from_millis(300)).await;

    assert!(!m2.community.order_book().tick_exists(&stale.order_id()));
}

#[tokio::test]
async fn ping_resolves_within_the_timeout() {
    let mut net = TestNet::new();
    let a = net.spawn_node(false, fast_settings());
    let b = net.spawn_node(false, fast_settings());
    introduce(&[&a, &b]);

    let alive = a.community.ping_peer(b.address).await.unwrap();
    assert!(alive);

    // Nothing listens there: the ping times out as dead.
    let dead_address = "127.0.0.1:19999".parse().unwrap();
    let alive = a.community.ping_peer(dead_address).await.unwrap();
    assert!(!alive);
}
