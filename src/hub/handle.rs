//! Subscription Handle: the per-caller cancellable resource returned by
//! [`crate::hub::Manager::subscribe`]. Closing it deregisters its callback
//! from the Registry; it carries no other state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use super::manager::{ConnectionEvent, Manager};
use super::registry::CallbackId;
use super::Error;

/// The user's handle to one `subscribe()` call. `send()` is unsupported —
/// this channel is receive-only.
pub struct SubscriptionHandle {
    manager: Arc<Manager>,
    function_full_name: String,
    callback_id: CallbackId,
    closed: AtomicBool,
}

impl SubscriptionHandle {
    pub(crate) fn new(manager: Arc<Manager>, function_full_name: String, callback_id: CallbackId) -> Arc<Self> {
        Arc::new(Self { manager, function_full_name, callback_id, closed: AtomicBool::new(false) })
    }

    /// Deregisters this subscription's callback. Idempotent; swallows
    /// "already removed" — deregistration is tolerant of missing entries.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.manager.deregister(&self.function_full_name, self.callback_id).await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Connected/Disconnected lifecycle notifications for the underlying
    /// connection. Ordering between a Connected event and the first payload
    /// delivered to this handle's callback is not guaranteed.
    pub fn connection_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.manager.subscribe_events()
    }

    /// This channel is receive-only; outbound sends are unsupported.
    pub async fn send(&self, _message: String) -> Result<(), Error> {
        Err(Error::NotSupported)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let manager = self.manager.clone();
        let function_full_name = self.function_full_name.clone();
        let callback_id = self.callback_id;
        tokio::spawn(async move {
            manager.deregister(&function_full_name, callback_id).await;
        });
    }
}
