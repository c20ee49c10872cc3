//! Typed lifecycle events and the publish/subscribe bus.

mod bus;
mod event;

pub use bus::{EventBus, EventHandler, SubscriptionId};
pub use event::{CancelReason, EventFilter, EventKind, MarketEvent};
