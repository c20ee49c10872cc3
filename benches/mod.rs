use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use matchbook_rs::{OrderBook, OrderSpec, Side};
use std::hint::black_box;

/// Rest orders across a spread of price levels without crossing.
fn add_only(c: &mut Criterion) {
    c.bench_function("add_only_1k", |b| {
        b.iter_batched(
            || OrderBook::new("BENCH"),
            |book| {
                for i in 0..1_000u32 {
                    let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                    let price = match side {
                        Side::Buy => 90.0 - (i % 50) as f64 * 0.01,
                        Side::Sell => 110.0 + (i % 50) as f64 * 0.01,
                    };
                    black_box(book.submit(OrderSpec::limit(side, price, 1.0)).unwrap());
                }
                book
            },
            BatchSize::SmallInput,
        )
    });
}

/// A taker sweeping a pre-seeded ladder of resting asks.
fn aggressive_walk(c: &mut Criterion) {
    c.bench_function("aggressive_walk_100_levels", |b| {
        b.iter_batched(
            || {
                let book = OrderBook::new("BENCH");
                for i in 0..100u32 {
                    let price = 100.0 + i as f64 * 0.01;
                    book.submit(OrderSpec::limit(Side::Sell, price, 1.0)).unwrap();
                }
                book
            },
            |book| {
                black_box(
                    book.submit(OrderSpec::limit(Side::Buy, 101.00, 100.0))
                        .unwrap(),
                );
                book
            },
            BatchSize::SmallInput,
        )
    });
}

/// Cancel throughput against a populated book.
fn cancel_only(c: &mut Criterion) {
    c.bench_function("cancel_1k", |b| {
        b.iter_batched(
            || {
                let book = OrderBook::new("BENCH");
                for i in 0..1_000u32 {
                    book.submit(
                        OrderSpec::limit(Side::Buy, 90.0 - (i % 50) as f64 * 0.01, 1.0)
                            .with_id(format!("o{i}")),
                    )
                    .unwrap();
                }
                book
            },
            |book| {
                for i in 0..1_000u32 {
                    black_box(book.cancel(&format!("o{i}").as_str().into()).unwrap());
                }
                book
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, add_only, aggressive_walk, cancel_only);
criterion_main!(benches);
