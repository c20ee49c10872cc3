//! Concurrent submission: the per-book mutex must keep every aggregate
//! invariant intact under contention.

use matchbook_rs::{BookConfig, MarketRegistry, OrderBook, OrderSpec, Side};
use std::sync::Arc;
use std::thread;

#[test]
fn hammered_book_stays_coherent() {
    let book = Arc::new(OrderBook::new("BTC/USD"));
    let threads = 8;
    let orders_per_thread = 100;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let book = Arc::clone(&book);
            thread::spawn(move || {
                for i in 0..orders_per_thread {
                    let side = if (t + i) % 2 == 0 { Side::Buy } else { Side::Sell };
                    // Buys low, sells high, with a crossing band in the
                    // middle so trades actually happen.
                    let price = match side {
                        Side::Buy => 99.0 + (i % 3) as f64,
                        Side::Sell => 101.0 - (i % 3) as f64,
                    };
                    let id = format!("t{t}-o{i}");
                    book.submit(OrderSpec::limit(side, price, 1.0).with_id(id.clone()))
                        .expect("submit");
                    if i % 5 == 0 {
                        // Cancels race with fills; both outcomes are fine.
                        let _ = book.cancel(&id.as_str().into());
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread");
    }

    let stats = book.statistics().unwrap();
    assert_eq!(
        stats.order_counts.submitted,
        (threads * orders_per_thread) as u64
    );

    let snapshot = book.snapshot(None).unwrap();
    assert!(snapshot.bids.windows(2).all(|w| w[0].price > w[1].price));
    assert!(snapshot.asks.windows(2).all(|w| w[0].price < w[1].price));
    if let (Some((bid, _)), Some((ask, _))) = (snapshot.best_bid(), snapshot.best_ask()) {
        assert!(bid < ask, "book crossed after concurrent matching");
    }

    // Snapshot row counts and the statistics agree.
    let rows: usize = snapshot
        .bids
        .iter()
        .chain(&snapshot.asks)
        .map(|r| r.order_count)
        .sum();
    assert_eq!(rows, stats.resting_orders);
}

#[test]
fn books_for_different_symbols_run_independently() {
    let registry = Arc::new(MarketRegistry::new());
    registry.create(BookConfig::new("BTC/USD")).unwrap();
    registry.create(BookConfig::new("ETH/USD")).unwrap();

    let handles: Vec<_> = ["BTC/USD", "ETH/USD"]
        .into_iter()
        .map(|symbol| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..200 {
                    let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                    registry
                        .place(symbol, OrderSpec::limit(side, 100.00, 1.0))
                        .expect("place");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread");
    }

    let stats = registry.stats();
    assert_eq!(stats.books, 2);
    // Every alternating pair crosses completely within its own book.
    assert_eq!(stats.trade_count, 200);
    assert_eq!(stats.resting_orders, 0);
}

#[test]
fn quote_reads_do_not_block_submissions() {
    let book = Arc::new(OrderBook::new("BTC/USD"));
    book.submit(OrderSpec::limit(Side::Buy, 99.00, 1.0)).unwrap();
    book.submit(OrderSpec::limit(Side::Sell, 101.00, 1.0)).unwrap();

    let reader = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            for _ in 0..10_000 {
                // Lock-free mirror reads stay consistent values-wise even
                // while writers churn.
                if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                    assert!(bid <= ask);
                }
            }
        })
    };
    let writer = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            for i in 0..500 {
                let _ = book.submit(OrderSpec::limit(Side::Buy, 99.00, 1.0).with_id(format!("b{i}")));
                let _ = book.cancel(&format!("b{i}").as_str().into());
            }
        })
    };
    reader.join().unwrap();
    writer.join().unwrap();
}
