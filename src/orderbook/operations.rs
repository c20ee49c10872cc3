//! Mutating book operations: submit, cancel, modify, expiry sweep.
//!
//! All four take the book's lock exactly once and publish their events
//! while holding it, so for two operations A and B on the same book every
//! event of A precedes every event of B whenever A acquired the lock first.
//!
//! The match driver here applies time-in-force policy around the pure
//! matching pass in [`super::matching`]: the matcher reports fills, the
//! driver turns them into trades and events and decides what happens to the
//! residual.

use super::book::{BookCore, OrderBook, StopReference};
use super::error::OrderBookError;
use super::level::DepthView;
use super::matching;
use super::stops;
use super::trade::Trade;
use crate::events::{CancelReason, MarketEvent};
use crate::types::{Order, OrderId, OrderKind, OrderPatch, OrderSpec, Side, TimeInForce, UserId};
use crate::utils::current_time_millis;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, trace};

/// Outcome of a successful [`OrderBook::submit`].
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    /// The assigned (or caller-supplied) order id.
    pub order_id: OrderId,
    /// Trades where this order was the taker, in execution order.
    pub trades: Vec<Trade>,
    /// The residual rested in the book.
    pub resting: bool,
    /// The order parked in the stop table awaiting its trigger.
    pub parked: bool,
    /// Unfilled quantity in lots.
    pub remaining_quantity: u64,
}

impl SubmitResult {
    /// The order is still live in the book (resting or parked).
    pub fn is_live(&self) -> bool {
        self.resting || self.parked
    }
}

/// What a single driver pass did with an order.
struct PassResult {
    trades: Vec<Trade>,
    remaining: u64,
    rested: bool,
}

impl OrderBook {
    /// Submit an order.
    ///
    /// Validation failures reject before any mutation and publish nothing.
    /// Semantic rejections (`FOK_UNFILLABLE`, `POST_ONLY_WOULD_CROSS`,
    /// market orders that find no liquidity) leave the book unchanged and
    /// publish `ORDER_REJECTED`. Otherwise the order matches against the
    /// opposing side, the residual is handled per its time-in-force, and
    /// any stops armed by the resulting trades fire inside the same
    /// critical section.
    pub fn submit(&self, spec: OrderSpec) -> Result<SubmitResult, OrderBookError> {
        let started = Instant::now();
        let now = current_time_millis();
        let mut order = self.validate(spec, now)?;

        let mut core = self.core()?;
        if core.order_index.contains_key(&order.id) || core.stops.find(&order.id).is_some() {
            return Err(OrderBookError::DuplicateOrderId(order.id));
        }
        order.sequence = core.next_sequence();
        trace!(symbol = %self.symbol(), order_id = %order.id, side = %order.side, kind = %order.kind, "submit");

        if order.kind.is_stop() {
            if let Some(result) = self.try_park_stop(&mut core, &mut order, started)? {
                return Ok(result);
            }
            // Trigger already reached: fall through as the underlying kind.
            order.kind = triggered_kind(order.kind);
        }

        let order_id = order.id.clone();
        let pass = match self.drive_order(&mut core, order, now, true) {
            Ok(pass) => pass,
            Err(error) => {
                core.stats.orders.rejected += 1;
                self.events.publish(MarketEvent::OrderRejected {
                    symbol: self.symbol().to_string(),
                    timestamp: now,
                    order_id,
                    reason: error.code().to_string(),
                });
                return Err(error);
            }
        };
        core.stats.orders.submitted += 1;

        if !pass.trades.is_empty() {
            self.fire_stops(&mut core, now);
        }
        self.finish_mutation(&mut core, now);
        core.stats
            .record_latency_micros(started.elapsed().as_micros() as u64);

        Ok(SubmitResult {
            order_id,
            trades: pass.trades,
            resting: pass.rested,
            parked: false,
            remaining_quantity: pass.remaining,
        })
    }

    /// Cancel a live order, resting or parked.
    pub fn cancel(&self, order_id: &OrderId) -> Result<(), OrderBookError> {
        let started = Instant::now();
        let now = current_time_millis();
        let mut core = self.core()?;

        if let Some((side, price)) = core.order_index.remove(order_id) {
            let Some((order, emptied)) = core.side_mut(side).remove(price, order_id) else {
                return Err(self.poison("order index pointed at a missing order"));
            };
            self.publish_level_state(&core, side, price, emptied, now);
            self.events.publish(MarketEvent::OrderCancelled {
                symbol: self.symbol().to_string(),
                timestamp: now,
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                reason: CancelReason::UserRequested,
                remaining_quantity: order.quantity,
            });
            core.stats.orders.cancelled += 1;
            self.finish_mutation(&mut core, now);
            core.stats
                .record_latency_micros(started.elapsed().as_micros() as u64);
            return Ok(());
        }

        if let Some(order) = core.stops.remove(order_id) {
            self.events.publish(MarketEvent::OrderCancelled {
                symbol: self.symbol().to_string(),
                timestamp: now,
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                reason: CancelReason::UserRequested,
                remaining_quantity: order.quantity,
            });
            core.stats.orders.cancelled += 1;
            self.finish_mutation(&mut core, now);
            core.stats
                .record_latency_micros(started.elapsed().as_micros() as u64);
            return Ok(());
        }

        Err(OrderBookError::NotFound(order_id.clone()))
    }

    /// Atomically modify a resting order.
    ///
    /// A price change or a quantity increase re-queues the order at the
    /// tail of its new level and re-runs the cross check, so the modify may
    /// trade. A pure quantity decrease or expiry change applies in place
    /// and keeps time priority. A quantity of zero cancels.
    pub fn modify(&self, order_id: &OrderId, patch: OrderPatch) -> Result<(), OrderBookError> {
        if patch.is_empty() {
            return Err(OrderBookError::InvalidPatch {
                message: "no fields to change".to_string(),
            });
        }
        let started = Instant::now();
        let now = current_time_millis();

        let new_price = match patch.price {
            Some(price) => Some(self.scale().price_to_ticks(price).ok_or(
                OrderBookError::InvalidPrecision {
                    field: "price",
                    value: price,
                    precision: self.config().price_precision,
                },
            )?),
            None => None,
        };
        let new_quantity = match patch.quantity {
            Some(quantity) if quantity == 0.0 => Some(0),
            Some(quantity) if !quantity.is_finite() || quantity < 0.0 => {
                return Err(OrderBookError::InvalidQuantity { value: quantity });
            }
            Some(quantity) => Some(self.scale().quantity_to_lots(quantity).ok_or(
                OrderBookError::InvalidPrecision {
                    field: "quantity",
                    value: quantity,
                    precision: self.config().quantity_precision,
                },
            )?),
            None => None,
        };

        let mut core = self.core()?;
        let Some(&(side, price)) = core.order_index.get(order_id) else {
            return Err(OrderBookError::NotFound(order_id.clone()));
        };
        let Some(current) = core
            .side(side)
            .level(price)
            .and_then(|level| level.get(order_id))
            .cloned()
        else {
            return Err(self.poison("order index pointed at a missing order"));
        };

        if new_quantity == Some(0) {
            // Quantity zero means cancel; reuse the cancel path state.
            core.order_index.remove(order_id);
            let Some((order, emptied)) = core.side_mut(side).remove(price, order_id) else {
                return Err(self.poison("order index pointed at a missing order"));
            };
            self.publish_level_state(&core, side, price, emptied, now);
            self.events.publish(MarketEvent::OrderCancelled {
                symbol: self.symbol().to_string(),
                timestamp: now,
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                reason: CancelReason::UserRequested,
                remaining_quantity: order.quantity,
            });
            core.stats.orders.cancelled += 1;
            self.finish_mutation(&mut core, now);
            core.stats
                .record_latency_micros(started.elapsed().as_micros() as u64);
            return Ok(());
        }

        let price_changed = new_price.is_some_and(|p| p != current.price);
        let quantity_increased = new_quantity.is_some_and(|q| q > current.quantity);

        if price_changed || quantity_increased {
            // Loses time priority: cancel plus re-insert at the tail of the
            // new level, all under this one lock acquisition.
            core.order_index.remove(order_id);
            let Some((mut order, emptied)) = core.side_mut(side).remove(price, order_id) else {
                return Err(self.poison("order index pointed at a missing order"));
            };
            self.publish_level_state(&core, side, price, emptied, now);

            if let Some(p) = new_price {
                order.price = p;
            }
            if let Some(q) = new_quantity {
                order.quantity = q;
                order.original_quantity = q;
            }
            if let Some(expiry) = patch.expiry_time {
                order.expiry_time = Some(expiry);
            }
            order.refresh_display();
            order.sequence = core.next_sequence();
            // Arrival-time semantics applied once; the re-queued order
            // trades like any resting order would.
            order.post_only = false;

            self.events.publish(MarketEvent::OrderModified {
                symbol: self.symbol().to_string(),
                timestamp: now,
                order: order.clone(),
                lost_priority: true,
            });

            // The new price may cross; run the match driver again.
            let pass = self.drive_order(&mut core, order, now, false)?;
            if !pass.trades.is_empty() {
                self.fire_stops(&mut core, now);
            }
        } else {
            let mut changed_level = false;
            if let Some(q) = new_quantity
                && q != current.quantity
            {
                let Some(order) = core
                    .side_mut(side)
                    .level_mut(price)
                    .and_then(|level| level.reduce_quantity(order_id, q))
                else {
                    return Err(self.poison("order index pointed at a missing order"));
                };
                changed_level = true;
                self.events.publish(MarketEvent::OrderModified {
                    symbol: self.symbol().to_string(),
                    timestamp: now,
                    order,
                    lost_priority: false,
                });
            } else if let Some(expiry) = patch.expiry_time {
                let Some(order) = core
                    .side_mut(side)
                    .level_mut(price)
                    .and_then(|level| level.set_expiry(order_id, Some(expiry)))
                else {
                    return Err(self.poison("order index pointed at a missing order"));
                };
                self.events.publish(MarketEvent::OrderModified {
                    symbol: self.symbol().to_string(),
                    timestamp: now,
                    order,
                    lost_priority: false,
                });
            } else {
                // Same values as currently set: a no-op that retains
                // priority.
                self.events.publish(MarketEvent::OrderModified {
                    symbol: self.symbol().to_string(),
                    timestamp: now,
                    order: current,
                    lost_priority: false,
                });
            }
            if let Some(expiry) = patch.expiry_time {
                if changed_level {
                    let _ = core
                        .side_mut(side)
                        .level_mut(price)
                        .and_then(|level| level.set_expiry(order_id, Some(expiry)));
                }
                core.expiry.schedule(expiry, order_id.clone());
            }
            if changed_level {
                self.publish_level_state(&core, side, price, false, now);
            }
        }

        if let Some(expiry) = patch.expiry_time
            && (price_changed || quantity_increased)
        {
            core.expiry.schedule(expiry, order_id.clone());
        }

        self.finish_mutation(&mut core, now);
        core.stats
            .record_latency_micros(started.elapsed().as_micros() as u64);
        Ok(())
    }

    /// Remove every order whose deadline has passed. Idempotent against
    /// stale queue entries: each popped id is validated against the live
    /// order first. Returns the number of orders expired.
    pub fn sweep_expired(&self, now: u64) -> Result<usize, OrderBookError> {
        let mut core = self.core()?;
        let due = core.expiry.drain_due(now);
        let mut count = 0usize;

        for (_, order_id) in due {
            if let Some(&(side, price)) = core.order_index.get(&order_id) {
                let live_expiry = core
                    .side(side)
                    .level(price)
                    .and_then(|level| level.get(&order_id))
                    .and_then(|order| order.expiry_time);
                if !live_expiry.is_some_and(|deadline| deadline <= now) {
                    continue; // rescheduled or cleared; stale entry
                }
                core.order_index.remove(&order_id);
                let Some((order, emptied)) = core.side_mut(side).remove(price, &order_id) else {
                    return Err(self.poison("order index pointed at a missing order"));
                };
                self.publish_level_state(&core, side, price, emptied, now);
                self.publish_expired(&order, now);
                core.stats.orders.expired += 1;
                count += 1;
            } else if core
                .stops
                .find(&order_id)
                .is_some_and(|order| order.expiry_time.is_some_and(|deadline| deadline <= now))
            {
                if let Some(order) = core.stops.remove(&order_id) {
                    self.publish_expired(&order, now);
                    core.stats.orders.expired += 1;
                    count += 1;
                }
            }
            // Already cancelled or filled: nothing to do.
        }

        if count > 0 {
            debug!(symbol = %self.symbol(), count, "expired orders removed");
            self.finish_mutation(&mut core, now);
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Internals. Everything below runs with the lock held.
    // ------------------------------------------------------------------

    /// Park a stop order unless its trigger is already reached. Returns the
    /// submit result when parked, `None` when the caller should execute it
    /// immediately.
    fn try_park_stop(
        &self,
        core: &mut BookCore,
        order: &mut Order,
        started: Instant,
    ) -> Result<Option<SubmitResult>, OrderBookError> {
        let (buy_reference, sell_reference) = self.stop_references(core);

        if order.kind == OrderKind::TrailingStop && order.stop_price.is_none() {
            let reference = match order.side {
                Side::Buy => buy_reference,
                Side::Sell => sell_reference,
            };
            let Some(reference) = reference else {
                return Err(OrderBookError::MissingField {
                    kind: order.kind,
                    field: "stop_price",
                });
            };
            let trail = order.trail_value.unwrap_or(0);
            order.stop_price = Some(stops::derive_trigger(
                order.side,
                trail,
                order.trail_is_percent,
                reference,
            ));
        }

        let Some(trigger) = order.stop_price else {
            return Err(OrderBookError::MissingField {
                kind: order.kind,
                field: "stop_price",
            });
        };
        let reached = match order.side {
            Side::Buy => buy_reference.is_some_and(|reference| reference >= trigger),
            Side::Sell => sell_reference.is_some_and(|reference| reference <= trigger),
        };
        if reached {
            return Ok(None);
        }

        if let Some(deadline) = order.expiry_time {
            core.expiry.schedule(deadline, order.id.clone());
        }
        core.stops.park(order.clone());
        core.stats.orders.submitted += 1;
        core.stats
            .record_latency_micros(started.elapsed().as_micros() as u64);
        Ok(Some(SubmitResult {
            order_id: order.id.clone(),
            trades: Vec::new(),
            resting: false,
            parked: true,
            remaining_quantity: order.quantity,
        }))
    }

    /// Match one order and apply its time-in-force to the residual.
    ///
    /// Emits trade, fill and level events as they happen. `announce_add`
    /// controls whether a resting residual publishes `ORDER_ADDED`; modify
    /// re-queues pass `false` because `ORDER_MODIFIED` already announced
    /// the order.
    fn drive_order(
        &self,
        core: &mut BookCore,
        mut order: Order,
        now: u64,
        announce_add: bool,
    ) -> Result<PassResult, OrderBookError> {
        let limit = match order.kind {
            OrderKind::Market => None,
            _ => Some(order.price),
        };
        let opposite = order.side.opposite();

        if order.post_only
            && let Some(best) = core.side(opposite).best_price()
            && matching::crosses(order.side, limit, best)
        {
            return Err(OrderBookError::PostOnlyWouldCross {
                opposite_price: best,
            });
        }

        if order.time_in_force == TimeInForce::Fok {
            let available = matching::probe(order.side, limit, order.quantity, core.side(opposite));
            if available < order.quantity {
                return Err(OrderBookError::FokUnfillable {
                    requested: order.quantity,
                    available,
                });
            }
        }

        let outcome = matching::execute(order.side, limit, order.quantity, core.side_mut(opposite));

        if order.kind == OrderKind::Market && outcome.fills.is_empty() {
            return Err(OrderBookError::InsufficientLiquidity {
                side: order.side,
                requested: order.quantity,
            });
        }

        let symbol = self.symbol().to_string();
        let mut trades = Vec::with_capacity(outcome.fills.len());
        for fill in &outcome.fills {
            order.fill(fill.quantity);
            let trade = Trade::new(
                fill.maker_order_id.clone(),
                order.id.clone(),
                fill.maker_user_id.clone(),
                order.user_id.clone(),
                order.side,
                fill.price,
                fill.quantity,
                now,
                &self.config().fees,
            );
            core.last_trade = Some(fill.price);
            core.stats.record_trade(fill.quantity);
            if fill.maker_done {
                core.order_index.remove(&fill.maker_order_id);
                core.stats.orders.filled += 1;
            }
            core.trades.push(trade.clone());

            self.events.publish(MarketEvent::TradeExecuted {
                symbol: symbol.clone(),
                timestamp: now,
                trade: trade.clone(),
            });
            self.events.publish(MarketEvent::OrderFilled {
                symbol: symbol.clone(),
                timestamp: now,
                order_id: fill.maker_order_id.clone(),
                user_id: fill.maker_user_id.clone(),
                filled_quantity: fill.quantity,
                remaining_quantity: fill.maker_remaining,
                insufficient_liquidity: false,
            });
            self.events.publish(MarketEvent::OrderFilled {
                symbol: symbol.clone(),
                timestamp: now,
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                filled_quantity: fill.quantity,
                remaining_quantity: order.quantity,
                insufficient_liquidity: false,
            });
            trades.push(trade);
        }

        for touch in &outcome.levels {
            if touch.removed {
                self.events.publish(MarketEvent::PriceLevelRemoved {
                    symbol: symbol.clone(),
                    timestamp: now,
                    side: opposite,
                    price: touch.price,
                });
            } else {
                self.events.publish(MarketEvent::PriceLevelChanged {
                    symbol: symbol.clone(),
                    timestamp: now,
                    side: opposite,
                    price: touch.price,
                    quantity: touch.visible_quantity,
                    order_count: touch.order_count,
                });
            }
        }

        if order.is_filled() {
            core.stats.orders.filled += 1;
            return Ok(PassResult {
                trades,
                remaining: 0,
                rested: false,
            });
        }

        // Residual handling.
        if order.kind == OrderKind::Market {
            // Market orders never rest; flag the shortfall on the final
            // fill event.
            self.events.publish(MarketEvent::OrderFilled {
                symbol,
                timestamp: now,
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                filled_quantity: order.original_quantity - order.quantity,
                remaining_quantity: order.quantity,
                insufficient_liquidity: true,
            });
            return Ok(PassResult {
                trades,
                remaining: order.quantity,
                rested: false,
            });
        }

        if order.time_in_force == TimeInForce::Ioc {
            self.events.publish(MarketEvent::OrderCancelled {
                symbol,
                timestamp: now,
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                reason: CancelReason::IocRemainder,
                remaining_quantity: order.quantity,
            });
            core.stats.orders.cancelled += 1;
            return Ok(PassResult {
                trades,
                remaining: order.quantity,
                rested: false,
            });
        }

        // GTC / GTD / Day / FOK-fully-fillable: rest the residual.
        if order.time_in_force == TimeInForce::Day
            && order.expiry_time.is_none()
            && let Some(close) = self.config().session_close
        {
            order.expiry_time = Some(close);
        }
        if let Some(deadline) = order.expiry_time {
            core.expiry.schedule(deadline, order.id.clone());
        }
        order.refresh_display();
        let (side, price) = (order.side, order.price);
        let remaining = order.quantity;
        core.order_index.insert(order.id.clone(), (side, price));
        let created = core.side_mut(side).insert(order.clone());
        if created {
            self.events.publish(MarketEvent::PriceLevelAdded {
                symbol: symbol.clone(),
                timestamp: now,
                side,
                price,
            });
        } else {
            self.publish_level_state(core, side, price, false, now);
        }
        if announce_add {
            self.events.publish(MarketEvent::OrderAdded {
                symbol,
                timestamp: now,
                order,
            });
        }
        core.stats.orders.rested += 1;

        Ok(PassResult {
            trades,
            remaining,
            rested: true,
        })
    }

    /// Evaluate the stop table against the reference price, converting and
    /// executing every triggered stop. Trades executed here can trigger
    /// further stops; the loop runs until the table quiesces.
    fn fire_stops(&self, core: &mut BookCore, now: u64) {
        loop {
            if core.stops.is_empty() {
                break;
            }
            if let Some(last) = core.last_trade {
                core.stops.ratchet_trailing(last);
            }
            let (buy_reference, sell_reference) = self.stop_references(core);
            let triggered = core.stops.take_triggered(buy_reference, sell_reference);
            if triggered.is_empty() {
                break;
            }
            for mut order in triggered {
                debug!(symbol = %self.symbol(), order_id = %order.id, trigger = ?order.stop_price, "stop triggered");
                order.kind = triggered_kind(order.kind);
                let order_id = order.id.clone();
                match self.drive_order(core, order, now, true) {
                    Ok(_) => {}
                    Err(error) => {
                        // A triggered stop that cannot execute is dropped;
                        // it has already left the stop table.
                        core.stats.orders.rejected += 1;
                        self.events.publish(MarketEvent::OrderRejected {
                            symbol: self.symbol().to_string(),
                            timestamp: now,
                            order_id,
                            reason: error.code().to_string(),
                        });
                    }
                }
            }
        }
    }

    fn stop_references(&self, core: &BookCore) -> (Option<u128>, Option<u128>) {
        match self.config().stop_reference {
            StopReference::LastTrade => (core.last_trade, core.last_trade),
            StopReference::BestOppositeQuote => (core.asks.best_price(), core.bids.best_price()),
        }
    }

    /// Publish the state of one level after a removal-or-change mutation.
    fn publish_level_state(&self, core: &BookCore, side: Side, price: u128, removed: bool, now: u64) {
        if removed {
            self.events.publish(MarketEvent::PriceLevelRemoved {
                symbol: self.symbol().to_string(),
                timestamp: now,
                side,
                price,
            });
        } else if let Some(level) = core.side(side).level(price) {
            self.events.publish(MarketEvent::PriceLevelChanged {
                symbol: self.symbol().to_string(),
                timestamp: now,
                side,
                price,
                quantity: level.visible_quantity(),
                order_count: level.order_count(),
            });
        }
    }

    fn publish_expired(&self, order: &Order, now: u64) {
        self.events.publish(MarketEvent::OrderExpired {
            symbol: self.symbol().to_string(),
            timestamp: now,
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            remaining_quantity: order.quantity,
        });
    }

    /// Refresh the quote mirror, emit `DEPTH_CHANGED` when the watched
    /// window moved, and close with `BOOK_UPDATED`.
    fn finish_mutation(&self, core: &mut BookCore, now: u64) {
        self.refresh_quote_cache(core);

        let watch = self.config().depth_watch;
        let bids = core.bids.depth(Some(watch), DepthView::Displayed);
        let asks = core.asks.depth(Some(watch), DepthView::Displayed);
        if bids != core.watched_bids || asks != core.watched_asks {
            core.watched_bids = bids.clone();
            core.watched_asks = asks.clone();
            self.events.publish(MarketEvent::DepthChanged {
                symbol: self.symbol().to_string(),
                timestamp: now,
                bids,
                asks,
            });
        }

        self.events.publish(MarketEvent::BookUpdated {
            symbol: self.symbol().to_string(),
            timestamp: now,
        });
    }

    /// Scale and validate a submission into a book-ready [`Order`].
    fn validate(&self, spec: OrderSpec, now: u64) -> Result<Order, OrderBookError> {
        let scale = self.scale();
        let side = spec.side;
        let mut kind = spec.kind;
        let mut price_input = spec.price;

        // Market-order sentinels kept for wire compatibility: a limit buy
        // at +inf or a limit sell at zero submits as a market order.
        if kind == OrderKind::Limit {
            match (side, price_input) {
                (Side::Buy, Some(p)) if p.is_infinite() && p.is_sign_positive() => {
                    kind = OrderKind::Market;
                    price_input = None;
                }
                (Side::Sell, Some(p)) if p == 0.0 => {
                    kind = OrderKind::Market;
                    price_input = None;
                }
                _ => {}
            }
        }

        if !spec.quantity.is_finite() || spec.quantity <= 0.0 {
            return Err(OrderBookError::InvalidQuantity {
                value: spec.quantity,
            });
        }
        let quantity = scale.quantity_to_lots(spec.quantity).ok_or(
            OrderBookError::InvalidPrecision {
                field: "quantity",
                value: spec.quantity,
                precision: self.config().quantity_precision,
            },
        )?;

        let scale_price = |field: &'static str, value: f64| {
            scale
                .price_to_ticks(value)
                .ok_or(OrderBookError::InvalidPrecision {
                    field,
                    value,
                    precision: self.config().price_precision,
                })
        };

        let price = match kind {
            OrderKind::Market | OrderKind::StopMarket | OrderKind::TrailingStop => 0,
            OrderKind::Limit | OrderKind::Iceberg | OrderKind::StopLimit => {
                let p = price_input.ok_or(OrderBookError::MissingField {
                    kind,
                    field: "price",
                })?;
                scale_price("price", p)?
            }
        };

        let stop_price = match kind {
            OrderKind::StopLimit | OrderKind::StopMarket => {
                let p = spec.stop_price.ok_or(OrderBookError::MissingField {
                    kind,
                    field: "stop_price",
                })?;
                Some(scale_price("stop_price", p)?)
            }
            // Trailing stops may derive their initial trigger from the
            // reference price at submission.
            OrderKind::TrailingStop => match spec.stop_price {
                Some(p) => Some(scale_price("stop_price", p)?),
                None => None,
            },
            _ => None,
        };

        let trail_value = if kind == OrderKind::TrailingStop {
            let trail = spec.trail_value.ok_or(OrderBookError::MissingField {
                kind,
                field: "trail_value",
            })?;
            if !trail.is_finite() || trail <= 0.0 {
                return Err(OrderBookError::InvalidQuantity { value: trail });
            }
            if spec.trail_is_percent {
                // Percent trails are basis points and need no price scale.
                Some(trail.round() as u64)
            } else {
                let ticks = scale_price("trail_value", trail)?;
                Some(u64::try_from(ticks).map_err(|_| OrderBookError::InvalidQuantity {
                    value: trail,
                })?)
            }
        } else {
            None
        };

        if spec.time_in_force == TimeInForce::Gtd {
            let deadline = spec.expiry_time.ok_or(OrderBookError::MissingField {
                kind,
                field: "expiry_time",
            })?;
            if deadline <= now {
                return Err(OrderBookError::GtdExpiryInPast {
                    expiry_time: deadline,
                    now,
                });
            }
        }

        let display_size = match kind {
            OrderKind::Iceberg => {
                let display = spec.display_quantity.ok_or(OrderBookError::MissingField {
                    kind,
                    field: "display_quantity",
                })?;
                if !display.is_finite() || display <= 0.0 {
                    return Err(OrderBookError::InvalidQuantity { value: display });
                }
                let lots = scale.quantity_to_lots(display).ok_or(
                    OrderBookError::InvalidPrecision {
                        field: "display_quantity",
                        value: display,
                        precision: self.config().quantity_precision,
                    },
                )?;
                Some(lots.min(quantity))
            }
            _ => None,
        };

        let mut order = Order {
            id: spec.id.map(OrderId::from).unwrap_or_else(OrderId::generate),
            side,
            kind,
            price,
            stop_price,
            quantity,
            original_quantity: quantity,
            display_size,
            displayed_quantity: 0,
            time_in_force: spec.time_in_force,
            expiry_time: spec.expiry_time,
            user_id: spec.user_id.map(UserId::from).unwrap_or_default(),
            timestamp: now,
            sequence: 0,
            post_only: spec.post_only,
            trail_value,
            trail_is_percent: spec.trail_is_percent,
        };
        order.refresh_display();
        Ok(order)
    }
}

/// The kind a stop converts to once its trigger is reached.
fn triggered_kind(kind: OrderKind) -> OrderKind {
    match kind {
        OrderKind::StopLimit => OrderKind::Limit,
        OrderKind::StopMarket | OrderKind::TrailingStop => OrderKind::Market,
        other => other,
    }
}
