//! # Price-Time Priority Matching Engine
//!
//! A limit order book matching engine for a single trading instrument, plus
//! a thin multi-instrument registry that composes many books. The engine
//! accepts buy and sell orders, maintains a two-sided price-indexed book
//! under strict price-time priority, continuously matches crossing orders,
//! produces trade records with maker/taker fee attribution, and publishes
//! typed lifecycle events to subscribers.
//!
//! ## Key features
//!
//! - **Price-time priority**: better-priced orders fill first; among equal
//!   prices, the earlier arrival fills first. Fills always execute at the
//!   maker's resting price, so takers get price improvement by default.
//! - **Order kinds**: limit, market, stop-limit, stop-market, iceberg and
//!   trailing stop, with GTC, IOC, FOK, GTD and Day time-in-force policies
//!   and a post-only flag.
//! - **Scaled-integer arithmetic**: prices are ticks and quantities lots at
//!   a configured decimal precision; fees are basis points applied to the
//!   integer notional. No binary floating point participates in matching
//!   or fee math.
//! - **Typed events**: every mutation publishes through a per-book
//!   [`EventBus`] with bounded history, panic-isolated handlers, and an
//!   opt-in asynchronous dispatch mode.
//! - **One lock per book**: submissions, cancels, modifies, sweeps and
//!   snapshots each observe an atomic, consistent book. Different symbols
//!   run independently.
//! - **Built-in observability**: per-book statistics with traded volume,
//!   best quotes and `hdrhistogram` latency percentiles; `tracing`
//!   instrumentation throughout.
//!
//! ## Example
//!
//! ```
//! use matchbook_rs::{OrderBook, OrderId, OrderSpec, Side};
//!
//! let book = OrderBook::new("BTC/USD");
//!
//! book.submit(OrderSpec::limit(Side::Sell, 100.00, 1.0).with_id("maker"))
//!     .unwrap();
//! let result = book
//!     .submit(OrderSpec::limit(Side::Buy, 100.00, 1.0))
//!     .unwrap();
//!
//! assert_eq!(result.trades.len(), 1);
//! assert_eq!(result.trades[0].maker_order_id, OrderId::from("maker"));
//! assert!(book.is_empty().unwrap());
//! ```
//!
//! ## Concurrency contract
//!
//! The engine is intended to be called from many worker threads. Each book
//! serializes its mutations behind one mutex; event handlers run on the
//! mutating thread while the lock is held and must not call back into the
//! book. If a panic ever escapes inside the critical section the book
//! enters a poisoned state and refuses further operations.

pub mod events;
pub mod fees;
pub mod orderbook;
pub mod prelude;
pub mod registry;
pub mod types;
mod utils;

pub use events::{
    CancelReason, EventBus, EventFilter, EventHandler, EventKind, MarketEvent, SubscriptionId,
};
pub use fees::FeeSchedule;
pub use orderbook::{
    BookConfig, BookSnapshot, BookStats, DepthRow, DepthView, ExpirySweeper, LatencySummary,
    LevelDepth, OrderBook, OrderBookError, OrderCounts, PriceLevel, SNAPSHOT_FORMAT_VERSION,
    SideBook, SnapshotPackage, StopReference, SubmitResult, Trade,
};
pub use registry::{MarketRegistry, RegistryStats};
pub use types::{
    Order, OrderId, OrderKind, OrderPatch, OrderSpec, Scale, Side, TimeInForce, UserId,
};
pub use utils::current_time_millis;
