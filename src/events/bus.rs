//! Typed publish/subscribe with bounded history.
//!
//! Publication is synchronous by default: handlers run to completion on the
//! publishing thread, which for book events means inside the book's lock.
//! Handlers must therefore be fast and must not call back into the book. A
//! panicking handler is caught and logged; its siblings still run.
//!
//! The opt-in asynchronous mode forwards events through an unbounded tokio
//! channel to a spawned task. The only ordering guarantee in that mode is
//! FIFO delivery.

use super::event::{EventFilter, EventKind, MarketEvent};
use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Callback invoked for every matching event.
pub type EventHandler = Arc<dyn Fn(&MarketEvent) + Send + Sync>;

/// Handle returned by `subscribe*`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    by_kind: HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
    all: Vec<(SubscriptionId, EventHandler)>,
}

/// Publish/subscribe hub for one book (or one registry).
pub struct EventBus {
    subscribers: RwLock<Subscribers>,
    history: Mutex<VecDeque<MarketEvent>>,
    max_history: usize,
    next_id: AtomicU64,
    async_tx: Mutex<Option<mpsc::UnboundedSender<MarketEvent>>>,
}

impl EventBus {
    /// Create a bus retaining up to `max_history` events.
    pub fn new(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Subscribers::default()),
            history: Mutex::new(VecDeque::with_capacity(max_history.min(1024))),
            max_history: max_history.max(1),
            next_id: AtomicU64::new(1),
            async_tx: Mutex::new(None),
        }
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe a handler to one event kind.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = self.allocate_id();
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.by_kind.entry(kind).or_default().push((id, handler));
        id
    }

    /// Subscribe a handler to every event.
    pub fn subscribe_all(&self, handler: EventHandler) -> SubscriptionId {
        let id = self.allocate_id();
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.all.push((id, handler));
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.all.len()
            + subs
                .by_kind
                .values()
                .map(|handlers| handlers.len())
                .sum::<usize>();
        subs.all.retain(|(sub_id, _)| *sub_id != id);
        for handlers in subs.by_kind.values_mut() {
            handlers.retain(|(sub_id, _)| *sub_id != id);
        }
        let after = subs.all.len()
            + subs
                .by_kind
                .values()
                .map(|handlers| handlers.len())
                .sum::<usize>();
        after < before
    }

    /// Publish an event: record it in history, then deliver it inline or
    /// enqueue it on the async dispatch channel when one is running.
    pub fn publish(&self, event: MarketEvent) {
        self.record(event.clone());

        let enqueued = {
            let tx = self.async_tx.lock().unwrap_or_else(|e| e.into_inner());
            match tx.as_ref() {
                Some(sender) => sender.send(event.clone()).is_ok(),
                None => false,
            }
        };
        if !enqueued {
            self.deliver(&event);
        }
    }

    fn record(&self, event: MarketEvent) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() == self.max_history {
            history.pop_front();
        }
        history.push_back(event);
    }

    fn deliver(&self, event: &MarketEvent) {
        // Snapshot the handler list so slow consumers never hold the
        // registration lock.
        let handlers: Vec<EventHandler> = {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            subs.by_kind
                .get(&event.kind())
                .into_iter()
                .flatten()
                .chain(subs.all.iter())
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(
                    event_kind = ?event.kind(),
                    symbol = event.symbol(),
                    "event handler panicked; continuing with remaining handlers"
                );
            }
        }
    }

    /// Most recent retained events, newest first, optionally filtered by
    /// kind mask and symbol.
    pub fn history(
        &self,
        limit: usize,
        filter: Option<EventFilter>,
        symbol: Option<&str>,
    ) -> Vec<MarketEvent> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history
            .iter()
            .rev()
            .filter(|event| filter.is_none_or(|f| f.contains(event.kind().flag())))
            .filter(|event| symbol.is_none_or(|s| event.symbol() == s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of retained events.
    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Switch to asynchronous dispatch. Events published after this call are
    /// delivered FIFO from a spawned task instead of the publisher's thread.
    /// Requires a tokio runtime. Returns the forwarding task's handle.
    pub fn start_async_dispatch(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.async_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);

        let bus = Arc::clone(self);
        tokio::spawn(async move {
            info!("event dispatch task started");
            while let Some(event) = rx.recv().await {
                bus.deliver(&event);
            }
            info!("event dispatch task stopped");
        })
    }

    /// Return to inline dispatch. The forwarding task drains its queue and
    /// exits.
    pub fn stop_async_dispatch(&self) {
        self.async_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("max_history", &self.max_history)
            .field("history_len", &self.history_len())
            .finish_non_exhaustive()
    }
}
