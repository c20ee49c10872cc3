//! Core vocabulary shared by the book, the matcher and the registry.

mod ids;
mod order;
mod scale;

pub use ids::{OrderId, UserId};
pub use order::{Order, OrderKind, OrderPatch, OrderSpec, Side, TimeInForce};
pub use scale::Scale;
