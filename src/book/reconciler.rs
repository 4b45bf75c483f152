//! Reconciler: per-symbol state machine that turns partial deltas plus an
//! optional snapshot into a monotonic full-book stream.
//!
//! The DeltaOnly path's queue-before-snapshot discipline is the invariant
//! that prevents message loss: a delta that arrives while a REST snapshot is
//! in flight is appended to the pending queue and returns immediately
//! without emitting. Only once the snapshot lands does the queue drain,
//! applying each delta in arrival order. Do not special-case "the snapshot
//! looks like it arrived first" — always go through the queue.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::dialect::Dialect;

use super::snapshot::SnapshotSource;
use super::types::OrderBook;

/// Invoked once per emitted full book. Runs after the per-symbol lock has
/// been released, so a slow or panicking callback never holds back other
/// symbols.
pub type Callback = Arc<dyn Fn(OrderBook) + Send + Sync>;

struct SymbolState {
    full_book: Option<OrderBook>,
    pending: VecDeque<OrderBook>,
    snapshot_in_flight: bool,
}

impl SymbolState {
    fn new() -> Self {
        Self { full_book: None, pending: VecDeque::new(), snapshot_in_flight: false }
    }
}

/// Applies `delta` onto `target` in place. Returns `false` (and leaves
/// `target` untouched) if `delta` is stale, i.e. `delta.sequence_id <
/// target.sequence_id` — stale deltas are dropped silently, never surfaced
/// as an error.
fn apply(delta: &OrderBook, target: &mut OrderBook) -> bool {
    if delta.sequence_id < target.sequence_id {
        return false;
    }

    for (price, level) in &delta.asks {
        if level.is_deletion() {
            target.asks.remove(price);
        } else {
            target.asks.insert(*price, *level);
        }
    }
    for (price, level) in &delta.bids {
        if level.is_deletion() {
            target.bids.remove(price);
        } else {
            target.bids.insert(*price, *level);
        }
    }
    target.sequence_id = delta.sequence_id;
    true
}

/// Per-symbol order-book reconciler for a single dialect/subscription.
pub struct Reconciler {
    dialect: Dialect,
    max_count: usize,
    snapshot_source: Arc<dyn SnapshotSource>,
    states: DashMap<String, Arc<Mutex<SymbolState>>>,
    on_book: Callback,
}

impl Reconciler {
    pub fn new(dialect: Dialect, max_count: usize, snapshot_source: Arc<dyn SnapshotSource>, on_book: Callback) -> Self {
        Self { dialect, max_count, snapshot_source, states: DashMap::new(), on_book }
    }

    fn state_for(&self, symbol: &str) -> Arc<Mutex<SymbolState>> {
        self.states.entry(symbol.to_string()).or_insert_with(|| Arc::new(Mutex::new(SymbolState::new()))).clone()
    }

    fn emit(&self, book: OrderBook) {
        let callback = self.on_book.clone();
        // The user callback runs outside any lock; a panic inside it must
        // not poison per-symbol state or stop later callbacks from firing.
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(book))).is_err() {
            tracing::error!("order book callback panicked; continuing");
        }
    }

    /// Consumes one message from the feed. Behavior depends on the dialect
    /// this reconciler was constructed with.
    pub async fn on_increment(&self, incoming: OrderBook) {
        match self.dialect {
            Dialect::FullEachTime => self.on_full_each_time(incoming).await,
            Dialect::SnapshotThenDelta => self.on_snapshot_then_delta(incoming).await,
            Dialect::DeltaOnly => self.on_delta_only(incoming).await,
        }
    }

    /// Clears all per-symbol state. Called on transport reconnect: sequence
    /// continuity cannot be verified across a gap of unknown length, so
    /// every symbol starts over as if seen for the first time.
    pub fn on_transport_reconnect(&self) {
        self.states.clear();
    }

    pub fn remove_symbol(&self, symbol: &str) {
        self.states.remove(symbol);
    }

    async fn on_full_each_time(&self, mut incoming: OrderBook) {
        let state = self.state_for(&incoming.symbol);
        incoming.last_updated_utc = Utc::now();
        {
            let mut guard = state.lock().await;
            guard.full_book = Some(incoming.clone());
        }
        self.emit(incoming);
    }

    async fn on_snapshot_then_delta(&self, incoming: OrderBook) {
        let state = self.state_for(&incoming.symbol);
        let emitted = {
            let mut guard = state.lock().await;
            match guard.full_book.as_mut() {
                None => {
                    let mut book = incoming;
                    book.last_updated_utc = Utc::now();
                    guard.full_book = Some(book.clone());
                    Some(book)
                }
                Some(full) => {
                    if apply(&incoming, full) {
                        full.last_updated_utc = Utc::now();
                        Some(full.clone())
                    } else {
                        None
                    }
                }
            }
        };

        if let Some(book) = emitted {
            self.emit(book);
        }
    }

    async fn on_delta_only(&self, incoming: OrderBook) {
        let symbol = incoming.symbol.clone();
        let state = self.state_for(&symbol);

        let should_fetch = {
            let mut guard = state.lock().await;
            guard.pending.push_back(incoming);
            let needs_fetch = guard.full_book.is_none() && !guard.snapshot_in_flight;
            if needs_fetch {
                guard.snapshot_in_flight = true;
            }
            needs_fetch
        };

        if should_fetch {
            // Awaited without holding the per-symbol lock: concurrent calls
            // for this symbol still enqueue and return immediately below
            // while this fetch is outstanding.
            match self.snapshot_source.get_order_book(&symbol, self.max_count).await {
                Ok(snapshot) => {
                    {
                        let mut guard = state.lock().await;
                        guard.full_book = Some(snapshot);
                        guard.snapshot_in_flight = false;
                    }
                    self.drain_and_emit(&state).await;
                }
                Err(error) => {
                    tracing::warn!(%symbol, %error, "order book snapshot fetch failed, will retry on next delta");
                    let mut guard = state.lock().await;
                    guard.snapshot_in_flight = false;
                }
            }
            return;
        }

        let has_full_book = state.lock().await.full_book.is_some();
        if has_full_book {
            self.drain_and_emit(&state).await;
        }
        // Otherwise a snapshot fetch for this symbol is already in flight;
        // `incoming` stays queued and is drained once that fetch completes.
    }

    async fn drain_and_emit(&self, state: &Arc<Mutex<SymbolState>>) {
        let to_emit: Vec<OrderBook> = {
            let mut guard = state.lock().await;
            let mut emissions = Vec::new();
            while let Some(delta) = guard.pending.pop_front() {
                if let Some(full) = guard.full_book.as_mut() {
                    if apply(&delta, full) {
                        full.last_updated_utc = Utc::now();
                        emissions.push(full.clone());
                    }
                }
            }
            emissions
        };

        for book in to_emit {
            self.emit(book);
        }
    }
}
