//! Property tests for the wire codec, the Bloom filter and quantity
//! accounting.

use anydex::prelude::*;
use anydex::protocol::{CompletedTradePayload, OrderPayload};
use proptest::prelude::*;

fn asset_id() -> impl Strategy<Value = String> {
    "[A-Z]{3,5}"
}

fn asset_pair() -> impl Strategy<Value = AssetPair> {
    (asset_id(), asset_id(), 0u64..1_000_000, 0u64..1_000_000).prop_filter_map(
        "legs must name distinct assets",
        |(x, y, a, b)| {
            if x == y {
                return None;
            }
            let (first, second) = if x < y { (x, y) } else { (y, x) };
            AssetPair::new(AssetAmount::new(a, &first), AssetAmount::new(b, &second)).ok()
        },
    )
}

fn trader_id() -> impl Strategy<Value = TraderId> {
    proptest::array::uniform20(any::<u8>()).prop_map(TraderId::new)
}

fn proposed_trade() -> impl Strategy<Value = ProposedTrade> {
    (
        trader_id(),
        any::<u32>(),
        trader_id(),
        any::<u32>(),
        any::<u32>(),
        asset_pair(),
        any::<u64>(),
    )
        .prop_map(
            |(trader, number, other_trader, other_number, proposal_id, assets, millis)| {
                ProposedTrade {
                    trader_id: trader,
                    order_id: OrderId::new(trader, OrderNumber::new(number)),
                    recipient_order_id: OrderId::new(
                        other_trader,
                        OrderNumber::new(other_number),
                    ),
                    proposal_id,
                    assets,
                    timestamp: Timestamp::from(millis),
                }
            },
        )
}

proptest! {
    #[test]
    fn order_payloads_round_trip(
        trader in trader_id(),
        number in any::<u32>(),
        assets in asset_pair(),
        timeout in 0u64..=86_400,
        traded in any::<u64>(),
        is_ask in any::<bool>(),
        millis in any::<u64>(),
    ) {
        let payload = OrderPayload {
            trader_id: trader,
            timestamp: Timestamp::from(millis),
            order_number: OrderNumber::new(number),
            assets,
            timeout: Timeout::new(timeout),
            traded,
            is_ask,
        };
        let packet = Packet::new(vec![7; 74], Message::Order(payload));
        let decoded = decode(&encode(&packet)).unwrap();
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn trade_messages_round_trip(trade in proposed_trade()) {
        for message in [
            Message::ProposedTrade(trade.clone()),
            Message::CounterTrade(trade.clone()),
            Message::StartTrade(trade.clone()),
            Message::CompleteTrade(CompletedTradePayload {
                trade: trade.clone(),
                trade_id: TransactionId::new([9; 32]),
            }),
        ] {
            let packet = Packet::new(vec![1, 2, 3], message);
            let decoded = decode(&encode(&packet)).unwrap();
            prop_assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn bloom_has_no_false_negatives(keys in proptest::collection::vec(any::<[u8; 16]>(), 1..200)) {
        let mut bloom = BloomFilter::new(0.005, keys.len(), b' ');
        for key in &keys {
            bloom.add(key);
        }
        for key in &keys {
            prop_assert!(bloom.contains(key));
        }
    }

    #[test]
    fn reserve_release_preserves_accounting(
        total in 1u64..10_000,
        reservations in proptest::collection::vec((any::<u8>(), 1u64..100), 0..20),
    ) {
        let pair = AssetPair::new(
            AssetAmount::new(total, "DUM1"),
            AssetAmount::new(total, "DUM2"),
        )
        .unwrap();
        let mut order = Order::new(
            OrderId::new(TraderId::new([1; 20]), OrderNumber::new(1)),
            pair,
            Timeout::new(3600),
            Timestamp::now(),
            true,
        );
        order.set_verified();

        let mut held: Vec<(OrderId, u64)> = Vec::new();
        for (byte, quantity) in reservations {
            let other = OrderId::new(TraderId::new([byte; 20]), OrderNumber::new(byte as u32));
            if order.reserve_quantity_for_tick(other, quantity).is_ok() {
                held.push((other, quantity));
            }
            prop_assert_eq!(
                order.available_quantity()
                    + order.reserved_quantity()
                    + order.traded_quantity(),
                total
            );
            let tick_sum: u64 = order.reserved_ticks().values().sum();
            prop_assert_eq!(tick_sum, order.reserved_quantity());
        }
        for (other, quantity) in held {
            order.release_quantity_for_tick(other, quantity);
        }
        prop_assert_eq!(order.available_quantity(), total);
        prop_assert_eq!(order.reserved_quantity(), 0);
    }
}
