//! Hub Subscription Registry: the in-memory mapping from a hub method's full
//! name to its replay parameter sets and the fan-out callback list invoked
//! whenever a frame for that method arrives.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Invoked with a decoded frame payload. Returns a boxed future so callbacks
/// can do async work (typically: parse the book, feed the reconciler)
/// without the registry itself needing to be generic over a callback trait.
pub type FrameCallback = Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Opaque identifier returned by [`Registry::add_listener`], used to remove
/// exactly the callback that was added.
pub type CallbackId = u64;

struct Listener {
    function_name: String,
    param_sets: Vec<Vec<Value>>,
    callbacks: Vec<(CallbackId, FrameCallback)>,
}

/// Maps short hub method names to fully-qualified ones, case-insensitively.
/// Unknown short names resolve to themselves — exchanges that expose a hub
/// method under one literal name need no entry at all.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    short_to_full: HashMap<String, String>,
}

impl NameResolver {
    pub fn new(mapping: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { short_to_full: mapping.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect() }
    }

    pub fn resolve(&self, function_name: &str) -> String {
        self.short_to_full.get(&function_name.to_lowercase()).cloned().unwrap_or_else(|| function_name.to_string())
    }
}

/// Snapshot of one listener's replay parameter sets, used by the connection
/// manager to re-invoke every subscription after a (re)connect.
#[derive(Debug, Clone)]
pub struct ReplayEntry {
    pub function_name: String,
    pub function_full_name: String,
    pub param_sets: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct Registry {
    resolver: NameResolver,
    listeners: Mutex<HashMap<String, Listener>>,
    next_callback_id: AtomicU64,
}

impl Registry {
    pub fn new(resolver: NameResolver) -> Self {
        Self { resolver, listeners: Mutex::new(HashMap::new()), next_callback_id: AtomicU64::new(1) }
    }

    pub fn resolve(&self, function_name: &str) -> String {
        self.resolver.resolve(function_name)
    }

    /// Registers `callback` for `function_name`'s fully-qualified listener,
    /// creating the listener (with `param_sets`) if this is the first
    /// registration. Returns the full name and the id to later remove this
    /// callback with.
    pub fn add_listener(
        &self,
        function_name: &str,
        param_sets: Vec<Vec<Value>>,
        callback: FrameCallback,
    ) -> (String, CallbackId) {
        let function_full_name = self.resolver.resolve(function_name);
        let callback_id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);

        let mut listeners = self.listeners.lock();
        let listener = listeners.entry(function_full_name.clone()).or_insert_with(|| Listener {
            function_name: function_name.to_string(),
            param_sets,
            callbacks: Vec::new(),
        });
        listener.callbacks.push((callback_id, callback));

        (function_full_name, callback_id)
    }

    /// Removes one callback, keyed by the listener's *full* name — the same
    /// key `add_listener` registers under. Returns `true` if the registry is
    /// now empty.
    pub fn remove_listener(&self, function_full_name: &str, callback_id: CallbackId) -> bool {
        let mut listeners = self.listeners.lock();
        if let Some(listener) = listeners.get_mut(function_full_name) {
            listener.callbacks.retain(|(id, _)| *id != callback_id);
            if listener.callbacks.is_empty() {
                listeners.remove(function_full_name);
            }
        }
        listeners.is_empty()
    }

    /// Copies out the callback list for `function_full_name` under the lock
    /// and returns it for the caller to invoke outside the lock.
    pub fn callbacks_for(&self, function_full_name: &str) -> Vec<FrameCallback> {
        let listeners = self.listeners.lock();
        listeners.get(function_full_name).map(|l| l.callbacks.iter().map(|(_, cb)| cb.clone()).collect()).unwrap_or_default()
    }

    /// All listeners' replay parameter sets, for replay after (re)connect.
    pub fn replay_entries(&self) -> Vec<ReplayEntry> {
        let listeners = self.listeners.lock();
        listeners
            .iter()
            .map(|(full_name, listener)| ReplayEntry {
                function_name: listener.function_name.clone(),
                function_full_name: full_name.clone(),
                param_sets: listener.param_sets.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn noop_callback(counter: Arc<AtomicUsize>) -> FrameCallback {
        Arc::new(move |_payload| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[test]
    fn unknown_short_name_resolves_to_itself() {
        let resolver = NameResolver::new([("deltas".to_string(), "SubscribeToExchangeDeltas".to_string())]);
        assert_eq!(resolver.resolve("Deltas"), "SubscribeToExchangeDeltas");
        assert_eq!(resolver.resolve("somethingElse"), "somethingElse");
    }

    #[test]
    fn add_listener_creates_entry_with_param_sets_and_reuses_it_for_a_second_callback() {
        let registry = Registry::new(NameResolver::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let (full_name, _id1) = registry.add_listener("deltas", vec![vec![Value::String("BTC".into())]], noop_callback(calls.clone()));
        let (full_name_2, _id2) = registry.add_listener("deltas", vec![vec![Value::String("ETH".into())]], noop_callback(calls));

        assert_eq!(full_name, full_name_2);
        let entries = registry.replay_entries();
        assert_eq!(entries.len(), 1);
        // The param_sets recorded are the ones from the *first* add_listener call.
        assert_eq!(entries[0].param_sets, vec![vec![Value::String("BTC".into())]]);
        assert_eq!(registry.callbacks_for(&full_name).len(), 2);
    }

    #[test]
    fn remove_listener_drops_the_entry_once_all_callbacks_are_gone() {
        let registry = Registry::new(NameResolver::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let (full_name, id) = registry.add_listener("deltas", vec![], noop_callback(calls));

        assert!(!registry.remove_listener(&full_name, id));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_listener_on_unknown_key_is_a_harmless_no_op() {
        let registry = Registry::new(NameResolver::default());
        assert!(registry.remove_listener("nonexistent", 999));
    }

    #[tokio::test]
    async fn callbacks_fire_exactly_once_per_dispatch() {
        let registry = Registry::new(NameResolver::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let (full_name, _id) = registry.add_listener("deltas", vec![], noop_callback(calls.clone()));

        for callback in registry.callbacks_for(&full_name) {
            callback("payload".to_string()).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
