//! Test-only doubles shared across the `book` module's test suites.

#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::snapshot::{Result, SnapshotError, SnapshotSource};
use super::types::OrderBook;

/// An in-memory [`SnapshotSource`] that hands back a fixed book, optionally
/// after an artificial delay (to simulate the snapshot-in-flight race) and
/// optionally failing its first N calls (to exercise snapshot-retry latching).
pub struct FakeSnapshotSource {
    book: OrderBook,
    delay: Option<Duration>,
    fail_first_n: AtomicUsize,
    calls: AtomicUsize,
    released: Notify,
}

impl FakeSnapshotSource {
    pub fn new(book: OrderBook) -> Self {
        Self {
            book,
            delay: None,
            fail_first_n: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            released: Notify::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_first_n_calls(self, n: usize) -> Self {
        self.fail_first_n.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lets a test unblock a delayed fetch deterministically instead of
    /// racing a fixed sleep duration against assertions.
    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl SnapshotSource for FakeSnapshotSource {
    async fn get_order_book(&self, _symbol: &str, _max_count: usize) -> Result<OrderBook> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.released.notified() => {}
            }
        }

        if call_index < self.fail_first_n.load(Ordering::SeqCst) {
            return Err(SnapshotError::Parse(super::parse::ParseError::MissingSequence(
                "injected failure".to_string(),
            )));
        }

        Ok(self.book.clone())
    }
}
