//! Property-based invariants over random order streams.

use crate::helpers::book;
use matchbook_rs::{BookSnapshot, OrderBook, OrderBookError, OrderSpec, Side, TimeInForce};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Limit { side: Side, price_steps: u8, quantity: u8 },
    Ioc { side: Side, price_steps: u8, quantity: u8 },
    Cancel { slot: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let side = prop_oneof![Just(Side::Buy), Just(Side::Sell)];
    prop_oneof![
        (side.clone(), 0u8..20, 1u8..10)
            .prop_map(|(side, price_steps, quantity)| Op::Limit { side, price_steps, quantity }),
        (side, 0u8..20, 1u8..10)
            .prop_map(|(side, price_steps, quantity)| Op::Ioc { side, price_steps, quantity }),
        (0u8..64).prop_map(|slot| Op::Cancel { slot }),
    ]
}

fn price_for(steps: u8) -> f64 {
    // A narrow band around 100 so streams actually cross.
    95.0 + steps as f64 * 0.5
}

/// Structural checks every reachable snapshot must pass.
fn assert_snapshot_coherent(snapshot: &BookSnapshot) {
    for row in &snapshot.bids {
        assert!(row.quantity > 0.0, "empty bid level in snapshot");
        assert!(row.order_count > 0, "zero-order bid level in snapshot");
    }
    for row in &snapshot.asks {
        assert!(row.quantity > 0.0, "empty ask level in snapshot");
        assert!(row.order_count > 0, "zero-order ask level in snapshot");
    }
    assert!(
        snapshot.bids.windows(2).all(|w| w[0].price > w[1].price),
        "bids not strictly descending"
    );
    assert!(
        snapshot.asks.windows(2).all(|w| w[0].price < w[1].price),
        "asks not strictly ascending"
    );
    if let (Some((bid, _)), Some((ask, _))) = (snapshot.best_bid(), snapshot.best_ask()) {
        assert!(bid < ask, "crossed book survived matching: {bid} >= {ask}");
    }
}

fn run_stream(book: &OrderBook, ops: &[Op]) {
    let mut live: Vec<String> = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        match op {
            Op::Limit { side, price_steps, quantity } => {
                let id = format!("o{index}");
                let spec = OrderSpec::limit(*side, price_for(*price_steps), *quantity as f64)
                    .with_id(id.clone());
                let result = book.submit(spec).expect("limit submit");
                // Conservation: fills plus residual account for the whole
                // order.
                let filled: u64 = result.trades.iter().map(|t| t.quantity).sum();
                let original = book.scale().quantity_to_lots(*quantity as f64).unwrap();
                assert_eq!(filled + result.remaining_quantity, original);
                if result.resting {
                    live.push(id);
                }
            }
            Op::Ioc { side, price_steps, quantity } => {
                let id = format!("o{index}");
                let spec = OrderSpec::limit(*side, price_for(*price_steps), *quantity as f64)
                    .with_id(id)
                    .with_time_in_force(TimeInForce::Ioc);
                let result = book.submit(spec).expect("ioc submit");
                assert!(!result.resting, "IOC residual rested");
            }
            Op::Cancel { slot } => {
                if live.is_empty() {
                    continue;
                }
                let id = live.remove(*slot as usize % live.len());
                match book.cancel(&id.as_str().into()) {
                    Ok(()) => {}
                    // Filled in the meantime by a later crossing order.
                    Err(OrderBookError::NotFound(_)) => {}
                    Err(other) => panic!("cancel failed: {other}"),
                }
            }
        }
        assert_snapshot_coherent(&book.snapshot(None).unwrap());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_streams_preserve_book_invariants(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let book = book();
        run_stream(&book, &ops);

        // Index coherence: every row the snapshot reports is reachable and
        // every live order resolves.
        let stats = book.statistics().unwrap();
        let snapshot = book.snapshot(None).unwrap();
        let rows: usize = snapshot.bids.iter().chain(&snapshot.asks).map(|r| r.order_count).sum();
        prop_assert_eq!(rows, stats.resting_orders);
    }

    #[test]
    fn snapshots_are_deterministic_without_mutations(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let book = book();
        run_stream(&book, &ops);

        let first = book.snapshot(None).unwrap();
        let second = book.snapshot(None).unwrap();
        prop_assert_eq!(first.sides(), second.sides());

        // And byte-identical once the timestamp is pinned.
        let mut second = second;
        second.timestamp = first.timestamp;
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn fok_is_atomic(
        ops in prop::collection::vec(op_strategy(), 1..30),
        side in prop_oneof![Just(Side::Buy), Just(Side::Sell)],
        price_steps in 0u8..20,
        quantity in 1u8..30,
    ) {
        let book = book();
        run_stream(&book, &ops);
        let before = book.snapshot(None).unwrap();

        let spec = OrderSpec::limit(side, price_for(price_steps), quantity as f64)
            .with_id("fok")
            .with_time_in_force(TimeInForce::Fok);
        match book.submit(spec) {
            Ok(result) => {
                // All-or-nothing: a successful FOK never leaves a residual.
                prop_assert_eq!(result.remaining_quantity, 0);
                prop_assert!(!result.resting);
            }
            Err(OrderBookError::FokUnfillable { .. }) => {
                let after = book.snapshot(None).unwrap();
                prop_assert_eq!(before.sides(), after.sides());
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn price_time_priority_within_a_level(makers in 2usize..8, taker_quantity in 1u8..20) {
        let book = book();
        for index in 0..makers {
            book.submit(
                OrderSpec::limit(Side::Sell, 100.00, 2.0).with_id(format!("m{index}")),
            ).expect("maker");
        }

        let result = book
            .submit(OrderSpec::limit(Side::Buy, 100.00, taker_quantity as f64).with_id("t"))
            .expect("taker");

        // Earlier makers fill strictly before later ones.
        let hit_order: Vec<String> = result
            .trades
            .iter()
            .map(|t| t.maker_order_id.as_str().to_string())
            .collect();
        let expected: Vec<String> = (0..hit_order.len()).map(|i| format!("m{i}")).collect();
        prop_assert_eq!(hit_order, expected);
    }

    #[test]
    fn taker_walk_never_improves_backwards(levels in 2usize..6, taker_quantity in 5u8..40) {
        let book = book();
        for index in 0..levels {
            let price = 100.0 + index as f64;
            book.submit(
                OrderSpec::limit(Side::Sell, price, 2.0).with_id(format!("m{index}")),
            ).expect("maker");
        }

        let result = book
            .submit(
                OrderSpec::limit(Side::Buy, 100.0 + levels as f64, taker_quantity as f64)
                    .with_id("t"),
            )
            .expect("taker");

        // Fill prices are non-decreasing for a buy taker: each fully
        // crossed level yields to a strictly worse one.
        prop_assert!(
            result
                .trades
                .windows(2)
                .all(|pair| pair[0].price <= pair[1].price)
        );
    }
}
