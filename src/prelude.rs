//! Convenience re-exports for the common path.
//!
//! ```
//! use matchbook_rs::prelude::*;
//!
//! let registry = MarketRegistry::new();
//! registry.create(BookConfig::new("ETH/USD")).unwrap();
//! let result = registry
//!     .place("ETH/USD", OrderSpec::limit(Side::Buy, 2_000.00, 0.5))
//!     .unwrap();
//! assert!(result.resting);
//! ```

pub use crate::events::{EventBus, EventFilter, EventKind, MarketEvent};
pub use crate::fees::FeeSchedule;
pub use crate::orderbook::{
    BookConfig, BookSnapshot, BookStats, ExpirySweeper, OrderBook, OrderBookError, StopReference,
    SubmitResult, Trade,
};
pub use crate::registry::{MarketRegistry, RegistryStats};
pub use crate::types::{
    Order, OrderId, OrderKind, OrderPatch, OrderSpec, Side, TimeInForce, UserId,
};
