//! End-to-end matching scenarios: zero fees, price precision 2.

use crate::helpers::{EventSink, book, book_with, limit, limit_tif};
use matchbook_rs::{
    BookConfig, CancelReason, FeeSchedule, MarketEvent, OrderBookError, OrderId, OrderKind,
    OrderPatch, OrderSpec, Side, TimeInForce,
};

#[test]
fn simple_cross() {
    let book = book();
    let sell = book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    assert!(sell.resting);

    let buy = book.submit(limit("b", Side::Buy, 100.00, 1.0)).unwrap();
    assert_eq!(buy.trades.len(), 1);
    let trade = &buy.trades[0];
    assert_eq!(trade.maker_order_id, OrderId::from("a"));
    assert_eq!(trade.taker_order_id, OrderId::from("b"));
    assert_eq!(book.scale().ticks_to_price(trade.price), 100.00);
    assert_eq!(book.scale().lots_to_quantity(trade.quantity), 1.0);
    assert!(!buy.resting);
    assert!(book.is_empty().unwrap());
}

#[test]
fn price_improvement_fills_at_maker_price() {
    let book = book();
    book.submit(limit("a", Side::Sell, 99.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Sell, 100.00, 1.0)).unwrap();

    let buy = book.submit(limit("c", Side::Buy, 100.00, 1.0)).unwrap();
    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].maker_order_id, OrderId::from("a"));
    assert_eq!(book.scale().ticks_to_price(buy.trades[0].price), 99.00);

    // b remains resting as the only ask.
    assert_eq!(book.best_ask(), Some(100.00));
    assert_eq!(book.resting_orders().unwrap(), 1);
}

#[test]
fn partial_fill_rests_remainder() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 2.0)).unwrap();

    let buy = book.submit(limit("b", Side::Buy, 100.00, 3.0)).unwrap();
    assert_eq!(buy.trades.len(), 1);
    assert_eq!(book.scale().lots_to_quantity(buy.trades[0].quantity), 2.0);
    assert!(buy.resting);
    assert_eq!(book.scale().lots_to_quantity(buy.remaining_quantity), 1.0);

    assert_eq!(book.best_bid(), Some(100.00));
    assert_eq!(book.best_ask(), None);
}

#[test]
fn ioc_discards_remainder() {
    let book = book();
    let sink = EventSink::attach(book.event_bus());
    book.submit(limit("a", Side::Sell, 100.00, 2.0)).unwrap();

    let buy = book
        .submit(limit_tif("b", Side::Buy, 100.00, 3.0, TimeInForce::Ioc))
        .unwrap();
    assert_eq!(buy.trades.len(), 1);
    assert!(!buy.resting);
    assert_eq!(book.best_bid(), None);

    let cancelled = sink
        .events()
        .into_iter()
        .find_map(|event| match event {
            MarketEvent::OrderCancelled {
                order_id,
                reason,
                remaining_quantity,
                ..
            } if order_id == OrderId::from("b") => Some((reason, remaining_quantity)),
            _ => None,
        })
        .expect("IOC remainder cancel event");
    assert_eq!(cancelled.0, CancelReason::IocRemainder);
    assert_eq!(book.scale().lots_to_quantity(cancelled.1), 1.0);
}

#[test]
fn fok_rejects_without_state_change() {
    let book = book();
    let sink = EventSink::attach(book.event_bus());
    book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Sell, 101.00, 1.0)).unwrap();
    let before = book.snapshot(None).unwrap();

    let result = book.submit(limit_tif("c", Side::Buy, 100.50, 2.0, TimeInForce::Fok));
    assert!(matches!(
        result,
        Err(OrderBookError::FokUnfillable {
            available, ..
        }) if book.scale().lots_to_quantity(available) == 1.0
    ));

    let after = book.snapshot(None).unwrap();
    assert_eq!(before.sides(), after.sides());
    assert!(sink.events().iter().any(|event| matches!(
        event,
        MarketEvent::OrderRejected { reason, .. } if reason == "FOK_UNFILLABLE"
    )));
}

#[test]
fn fok_fully_fillable_executes() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Sell, 100.50, 1.0)).unwrap();

    let buy = book
        .submit(limit_tif("c", Side::Buy, 100.50, 2.0, TimeInForce::Fok))
        .unwrap();
    assert_eq!(buy.trades.len(), 2);
    assert_eq!(buy.remaining_quantity, 0);
    assert!(!buy.resting);
}

#[test]
fn modify_price_loses_time_priority() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Sell, 100.00, 1.0)).unwrap();

    // Same-price modify is a no-op that keeps priority.
    book.modify(&OrderId::from("a"), OrderPatch::price(100.00))
        .unwrap();

    // Price away and back: a re-queues behind b.
    book.modify(&OrderId::from("a"), OrderPatch::price(99.99))
        .unwrap();
    book.modify(&OrderId::from("a"), OrderPatch::price(100.00))
        .unwrap();

    let buy = book.submit(limit("t", Side::Buy, 100.00, 1.0)).unwrap();
    assert_eq!(buy.trades[0].maker_order_id, OrderId::from("b"));
}

#[test]
fn modify_quantity_decrease_keeps_priority() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 3.0)).unwrap();
    book.submit(limit("b", Side::Sell, 100.00, 1.0)).unwrap();

    book.modify(&OrderId::from("a"), OrderPatch::quantity(2.0))
        .unwrap();

    let buy = book.submit(limit("t", Side::Buy, 100.00, 1.0)).unwrap();
    assert_eq!(buy.trades[0].maker_order_id, OrderId::from("a"));
}

#[test]
fn modify_quantity_zero_cancels() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    book.modify(&OrderId::from("a"), OrderPatch::quantity(0.0))
        .unwrap();
    assert!(book.is_empty().unwrap());
    assert!(matches!(
        book.cancel(&OrderId::from("a")),
        Err(OrderBookError::NotFound(_))
    ));
}

#[test]
fn modify_can_cross_and_trade() {
    let book = book();
    book.submit(limit("bid", Side::Buy, 99.00, 1.0)).unwrap();
    book.submit(limit("ask", Side::Sell, 101.00, 1.0)).unwrap();

    // Lowering the ask into the bid executes immediately.
    book.modify(&OrderId::from("ask"), OrderPatch::price(99.00))
        .unwrap();
    assert!(book.is_empty().unwrap());
    let trades = book.trades(10).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].maker_order_id, OrderId::from("bid"));
    assert_eq!(book.scale().ticks_to_price(trades[0].price), 99.00);
}

#[test]
fn market_order_walks_the_book_and_discards_residual() {
    let book = book();
    let sink = EventSink::attach(book.event_bus());
    book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Sell, 101.00, 1.0)).unwrap();

    let buy = book
        .submit(OrderSpec::market(Side::Buy, 5.0).with_id("m"))
        .unwrap();
    assert_eq!(buy.trades.len(), 2);
    assert!(!buy.resting);
    assert_eq!(book.scale().lots_to_quantity(buy.remaining_quantity), 3.0);
    assert!(book.is_empty().unwrap());

    assert!(sink.events().iter().any(|event| matches!(
        event,
        MarketEvent::OrderFilled {
            order_id,
            insufficient_liquidity: true,
            ..
        } if order_id == &OrderId::from("m")
    )));
}

#[test]
fn market_order_on_empty_book_is_rejected() {
    let book = book();
    let sink = EventSink::attach(book.event_bus());

    let result = book.submit(OrderSpec::market(Side::Buy, 1.0).with_id("m"));
    assert!(matches!(
        result,
        Err(OrderBookError::InsufficientLiquidity { .. })
    ));
    assert!(sink.events().iter().any(|event| matches!(
        event,
        MarketEvent::OrderRejected { reason, .. } if reason == "MARKET_INSUFFICIENT_LIQUIDITY"
    )));
}

#[test]
fn market_sentinel_prices_are_accepted() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Buy, 99.00, 1.0)).unwrap();

    // Limit buy at +inf is a market buy.
    let buy = book
        .submit(OrderSpec::limit(Side::Buy, f64::INFINITY, 1.0))
        .unwrap();
    assert_eq!(buy.trades.len(), 1);

    // Limit sell at zero is a market sell.
    let sell = book.submit(OrderSpec::limit(Side::Sell, 0.0, 1.0)).unwrap();
    assert_eq!(sell.trades.len(), 1);
    assert_eq!(book.scale().ticks_to_price(sell.trades[0].price), 99.00);
}

#[test]
fn post_only_rejects_when_crossing() {
    let book = book();
    book.submit(limit("ask", Side::Sell, 100.00, 1.0)).unwrap();
    let before = book.snapshot(None).unwrap();

    let result = book.submit(
        OrderSpec::limit(Side::Buy, 100.00, 1.0)
            .with_id("po")
            .with_post_only(),
    );
    assert!(matches!(
        result,
        Err(OrderBookError::PostOnlyWouldCross { .. })
    ));
    assert_eq!(before.sides(), book.snapshot(None).unwrap().sides());

    // Non-crossing post-only rests normally.
    let resting = book
        .submit(
            OrderSpec::limit(Side::Buy, 99.00, 1.0)
                .with_id("po2")
                .with_post_only(),
        )
        .unwrap();
    assert!(resting.resting);
}

#[test]
fn iceberg_displays_slice_and_keeps_priority_on_refill() {
    let book = book();
    book.submit(OrderSpec::iceberg(Side::Sell, 100.00, 10.0, 2.0).with_id("ice"))
        .unwrap();
    book.submit(limit("tail", Side::Sell, 100.00, 5.0)).unwrap();

    // Snapshot aggregates the displayed view: 2.0 + 5.0.
    let snap = book.snapshot(None).unwrap();
    assert_eq!(snap.asks[0].quantity, 7.0);
    assert_eq!(snap.asks[0].order_count, 2);

    // A 3.0 taker consumes hidden quantity from the iceberg head before
    // touching the order behind it.
    let buy = book.submit(limit("t", Side::Buy, 100.00, 3.0)).unwrap();
    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].maker_order_id, OrderId::from("ice"));

    // The refilled slice is still at the head of the queue.
    let next = book.submit(limit("t2", Side::Buy, 100.00, 1.0)).unwrap();
    assert_eq!(next.trades[0].maker_order_id, OrderId::from("ice"));

    let ice = book.order(&OrderId::from("ice")).unwrap().unwrap();
    assert_eq!(book.scale().lots_to_quantity(ice.quantity), 6.0);
    assert_eq!(book.scale().lots_to_quantity(ice.displayed_quantity), 2.0);
}

#[test]
fn stop_market_parks_then_triggers_off_last_trade() {
    let book = book();
    // Liquidity for the stop to hit once it fires.
    book.submit(limit("deep", Side::Buy, 93.00, 2.0)).unwrap();
    book.submit(limit("maker", Side::Buy, 94.00, 1.0)).unwrap();

    // No trade has printed yet, so the stop parks.
    let stop = book
        .submit(OrderSpec::stop_market(Side::Sell, 95.00, 1.0).with_id("stop"))
        .unwrap();
    assert!(stop.parked);
    assert!(!stop.resting);

    // A print at 94.00 reaches the 95.00 sell trigger.
    book.submit(limit_tif("t", Side::Sell, 94.00, 1.0, TimeInForce::Ioc))
        .unwrap();

    let trades = book.trades(10).unwrap();
    // Newest first: the stop's market fill at 93.00, then the trigger print.
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].taker_order_id, OrderId::from("stop"));
    assert_eq!(book.scale().ticks_to_price(trades[0].price), 93.00);
    assert!(book.order(&OrderId::from("stop")).unwrap().is_none());
}

#[test]
fn stop_limit_rests_at_its_limit_after_trigger() {
    let book = book();
    book.submit(limit("maker", Side::Sell, 100.00, 1.0)).unwrap();

    // Buy stop: trigger 100, limit 102.
    let stop = book
        .submit(OrderSpec::stop_limit(Side::Buy, 100.00, 102.00, 2.0).with_id("stop"))
        .unwrap();
    assert!(stop.parked);

    // Print at 100 triggers it; it takes the ask then rests the remainder.
    book.submit(limit_tif("t", Side::Buy, 100.00, 1.0, TimeInForce::Ioc))
        .unwrap();

    let resting = book.order(&OrderId::from("stop")).unwrap().unwrap();
    assert_eq!(resting.kind, OrderKind::Limit);
    assert_eq!(book.scale().ticks_to_price(resting.price), 102.00);
    assert_eq!(book.scale().lots_to_quantity(resting.quantity), 2.0);
    assert_eq!(book.best_bid(), Some(102.00));
}

#[test]
fn stop_submitted_past_trigger_executes_immediately() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Buy, 100.00, 1.0)).unwrap(); // prints 100.00

    book.submit(limit("ask", Side::Sell, 101.00, 1.0)).unwrap();
    // Buy stop with trigger at 99: last trade 100 >= 99, fires now.
    let stop = book
        .submit(OrderSpec::stop_market(Side::Buy, 99.00, 1.0).with_id("s"))
        .unwrap();
    assert!(!stop.parked);
    assert_eq!(stop.trades.len(), 1);
    assert_eq!(stop.trades[0].maker_order_id, OrderId::from("ask"));
}

#[test]
fn trailing_stop_ratchets_and_fires() {
    let book = book();
    // Trailing sell, 2.00 behind the market; no reference yet means it
    // needs an explicit initial trigger.
    let stop = book
        .submit(
            OrderSpec::trailing_stop(Side::Sell, 2.00, false, 1.0)
                .with_id("trail")
                .with_user("u1"),
        );
    assert!(stop.is_err()); // no reference price to derive the trigger from

    // Print a reference first.
    book.submit(limit("m1", Side::Buy, 100.00, 1.0)).unwrap();
    book.submit(limit_tif("t1", Side::Sell, 100.00, 1.0, TimeInForce::Ioc))
        .unwrap();

    let stop = book
        .submit(OrderSpec::trailing_stop(Side::Sell, 2.00, false, 1.0).with_id("trail"))
        .unwrap();
    assert!(stop.parked);
    // Trigger derived: 100 - 2 = 98.
    let parked = book.order(&OrderId::from("trail")).unwrap().unwrap();
    assert_eq!(book.scale().ticks_to_price(parked.stop_price.unwrap()), 98.00);

    // Market rises to 105: trigger ratchets to 103.
    book.submit(limit("m2", Side::Buy, 105.00, 1.0)).unwrap();
    book.submit(limit_tif("t2", Side::Sell, 105.00, 1.0, TimeInForce::Ioc))
        .unwrap();
    let parked = book.order(&OrderId::from("trail")).unwrap().unwrap();
    assert_eq!(book.scale().ticks_to_price(parked.stop_price.unwrap()), 103.00);

    // A print at 103 fires it into the resting bid.
    book.submit(limit("m3", Side::Buy, 103.00, 2.0)).unwrap();
    book.submit(limit_tif("t3", Side::Sell, 103.00, 1.0, TimeInForce::Ioc))
        .unwrap();
    assert!(book.order(&OrderId::from("trail")).unwrap().is_none());
    let trades = book.trades(1).unwrap();
    assert_eq!(trades[0].taker_order_id, OrderId::from("trail"));
}

#[test]
fn fees_follow_the_schedule() {
    let config = BookConfig::new("BTC/USD").with_fees(FeeSchedule::new(-2, 5));
    let book = book_with(config);
    book.submit(limit("maker", Side::Sell, 100.00, 1.0)).unwrap();
    let buy = book.submit(limit("taker", Side::Buy, 100.00, 1.0)).unwrap();

    let trade = &buy.trades[0];
    // Notional in scaled units: 10_000 ticks * 100_000_000 lots.
    let notional = trade.notional();
    assert_eq!(trade.maker_fee, -(notional as i128) * 2 / 10_000);
    assert_eq!(trade.taker_fee, (notional as i128) * 5 / 10_000);
    assert_eq!(trade.maker_fee_bps, -2);
    assert_eq!(trade.taker_fee_bps, 5);
}

#[test]
fn validation_rejects_before_mutation() {
    let book = book();
    let sink = EventSink::attach(book.event_bus());

    assert!(matches!(
        book.submit(OrderSpec::limit(Side::Buy, 100.005, 1.0)),
        Err(OrderBookError::InvalidPrecision { field: "price", .. })
    ));
    assert!(matches!(
        book.submit(OrderSpec::limit(Side::Buy, 100.00, 0.0)),
        Err(OrderBookError::InvalidQuantity { .. })
    ));
    assert!(matches!(
        book.submit(OrderSpec::limit(Side::Buy, 100.00, -1.0)),
        Err(OrderBookError::InvalidQuantity { .. })
    ));

    // Validation failures publish nothing.
    assert!(sink.events().is_empty());
    assert!(book.is_empty().unwrap());
}

#[test]
fn duplicate_order_id_is_rejected() {
    let book = book();
    book.submit(limit("dup", Side::Buy, 99.00, 1.0)).unwrap();
    assert!(matches!(
        book.submit(limit("dup", Side::Buy, 98.00, 1.0)),
        Err(OrderBookError::DuplicateOrderId(_))
    ));
}

#[test]
fn cancel_removes_order_and_level() {
    let book = book();
    book.submit(limit("a", Side::Buy, 99.00, 1.0)).unwrap();
    book.submit(limit("b", Side::Buy, 99.00, 1.0)).unwrap();

    book.cancel(&OrderId::from("a")).unwrap();
    assert_eq!(book.best_bid(), Some(99.00));
    book.cancel(&OrderId::from("b")).unwrap();
    assert_eq!(book.best_bid(), None);

    assert!(matches!(
        book.cancel(&OrderId::from("a")),
        Err(OrderBookError::NotFound(_))
    ));
}

#[test]
fn cancel_reaches_parked_stops() {
    let book = book();
    let stop = book
        .submit(OrderSpec::stop_market(Side::Sell, 95.00, 1.0).with_id("s"))
        .unwrap();
    assert!(stop.parked);
    book.cancel(&OrderId::from("s")).unwrap();
    assert!(book.is_empty().unwrap());
}

#[test]
fn statistics_reflect_activity() {
    let book = book();
    book.submit(limit("a", Side::Sell, 100.00, 2.0)).unwrap();
    book.submit(limit("b", Side::Buy, 99.00, 1.0)).unwrap();
    book.submit(limit("c", Side::Buy, 100.00, 1.0)).unwrap();

    let stats = book.statistics().unwrap();
    assert_eq!(stats.order_counts.submitted, 3);
    assert_eq!(stats.trade_count, 1);
    assert_eq!(stats.volume, 1.0);
    assert_eq!(stats.best_bid, Some(99.00));
    assert_eq!(stats.best_ask, Some(100.00));
    assert_eq!(stats.spread, Some(1.00));
    assert_eq!(stats.mid_price, Some(99.50));
    assert_eq!(stats.last_trade_price, Some(100.00));
    assert!(stats.latencies.count >= 3);
}

#[test]
fn trades_are_newest_first_and_bounded() {
    let config = BookConfig::new("BTC/USD").with_trade_history(2);
    let book = book_with(config);
    for i in 0..4 {
        let price = 100.0 + i as f64;
        book.submit(OrderSpec::limit(Side::Sell, price, 1.0)).unwrap();
        book.submit(OrderSpec::limit(Side::Buy, price, 1.0)).unwrap();
    }

    let trades = book.trades(10).unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(book.scale().ticks_to_price(trades[0].price), 103.00);
    assert_eq!(book.scale().ticks_to_price(trades[1].price), 102.00);
}

#[test]
fn snapshot_package_validates_and_detects_tampering() {
    let book = book();
    book.submit(limit("a", Side::Buy, 99.00, 1.0)).unwrap();

    let package = book.snapshot_package(None).unwrap();
    package.validate().unwrap();

    let mut tampered = package.clone();
    tampered.snapshot.bids[0].quantity += 1.0;
    assert!(tampered.validate().is_err());
}
