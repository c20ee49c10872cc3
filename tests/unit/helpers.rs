//! Shared fixtures for the integration suite.

use matchbook_rs::{
    BookConfig, EventBus, MarketEvent, OrderBook, OrderSpec, Side, TimeInForce,
};
use std::sync::{Arc, Mutex};

/// Install a test-writer subscriber once so `tracing` output lands in the
/// captured test log.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A book with the scenario defaults: price precision 2, zero fees.
pub fn book() -> OrderBook {
    init_tracing();
    OrderBook::new("BTC/USD")
}

/// A book with a custom configuration, symbol fixed to the scenario default.
pub fn book_with(config: BookConfig) -> OrderBook {
    OrderBook::with_config(config)
}

pub fn limit(id: &str, side: Side, price: f64, quantity: f64) -> OrderSpec {
    OrderSpec::limit(side, price, quantity).with_id(id)
}

pub fn limit_tif(
    id: &str,
    side: Side,
    price: f64,
    quantity: f64,
    tif: TimeInForce,
) -> OrderSpec {
    OrderSpec::limit(side, price, quantity)
        .with_id(id)
        .with_time_in_force(tif)
}

/// Collects every event published on a bus, in order.
pub struct EventSink {
    events: Arc<Mutex<Vec<MarketEvent>>>,
}

impl EventSink {
    pub fn attach(bus: &Arc<EventBus>) -> Self {
        let events: Arc<Mutex<Vec<MarketEvent>>> = Arc::default();
        let sink = Arc::clone(&events);
        bus.subscribe_all(Arc::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));
        Self { events }
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Event kinds observed for one order id, in emission order.
    pub fn kinds_for(&self, order_id: &str) -> Vec<matchbook_rs::EventKind> {
        self.events()
            .iter()
            .filter(|event| {
                event
                    .order_id()
                    .is_some_and(|id| id.as_str() == order_id)
            })
            .map(|event| event.kind())
            .collect()
    }
}
