//! Time-based order expiry.
//!
//! The queue is a min-heap of `(deadline, order_id)`. Entries are never
//! eagerly removed: a cancel or reschedule simply leaves a stale entry
//! behind, and the sweep validates each popped id against the live order
//! before expiring it. That keeps every other operation O(log n) and makes
//! the sweep idempotent.

use super::book::OrderBook;
use crate::types::OrderId;
use crate::utils::current_time_millis;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Min-heap of pending expiry deadlines.
#[derive(Debug, Default)]
pub(crate) struct ExpiryQueue {
    heap: BinaryHeap<Reverse<(u64, OrderId)>>,
}

impl ExpiryQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a deadline for an order. Rescheduling just pushes a second
    /// entry; the earlier one goes stale.
    pub(crate) fn schedule(&mut self, deadline: u64, order_id: OrderId) {
        self.heap.push(Reverse((deadline, order_id)));
    }

    /// Pop every entry whose deadline has passed. Callers must re-validate
    /// each id against the live order before acting.
    pub(crate) fn drain_due(&mut self, now: u64) -> Vec<(u64, OrderId)> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, _))) = self.heap.peek() {
            if *deadline > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry);
            }
        }
        due
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Background thread that sweeps one book on its configured interval.
///
/// Sweeping remains available directly through
/// [`OrderBook::sweep_expired`]; the sweeper just calls it on a timer.
/// Dropping the handle signals shutdown; [`ExpirySweeper::stop`] also joins
/// the thread.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Spawn the sweeper for a book. The interval comes from the book's
    /// configuration.
    pub fn start(book: Arc<OrderBook>) -> Self {
        let interval = book.config().check_expiry_interval;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let symbol = book.symbol().to_string();

        let handle = std::thread::Builder::new()
            .name(format!("expiry-{symbol}"))
            .spawn(move || {
                info!(symbol, "expiry sweeper started");
                while !flag.load(Ordering::Relaxed) {
                    std::thread::park_timeout(interval);
                    if flag.load(Ordering::Relaxed) {
                        break;
                    }
                    match book.sweep_expired(current_time_millis()) {
                        Ok(0) => {}
                        Ok(count) => debug!(symbol, count, "expired orders swept"),
                        Err(error) => {
                            warn!(symbol, %error, "expiry sweep failed; sweeper stopping");
                            break;
                        }
                    }
                }
                info!(symbol, "expiry sweeper stopped");
            })
            .expect("failed to spawn expiry sweeper thread");

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signal shutdown and join the thread.
    pub fn stop(mut self) {
        self.signal();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn signal(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.as_ref() {
            handle.thread().unpark();
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.signal();
    }
}
