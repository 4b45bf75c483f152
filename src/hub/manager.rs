//! Hub Connection Manager: owns the transport lifecycle (connect, reconnect
//! with backoff, replay subscriptions), correlates outbound invocations with
//! their results, and dispatches inbound frames to the Registry's callbacks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, oneshot, Mutex};

use super::auth::{self, AuthContext};
use super::handle::SubscriptionHandle;
use super::protocol::{self, OutboundInvocation};
use super::reconnect::ReconnectPolicy;
use super::registry::Registry;
use super::transport::{RealtimeTransport, TransportEvent};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("hub connection manager has been closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(#[from] super::transport::TransportError),

    #[error("invocation {method} was rejected by the server: {reason}")]
    InvocationRejected { method: String, reason: String },

    #[error("invocation {method} timed out waiting for a result")]
    InvocationTimedOut { method: String },

    #[error("this connection does not support sending raw messages")]
    NotSupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Lifecycle notification broadcast to every [`SubscriptionHandle`] and to
/// the API-level wrapper that owns the [`crate::book::Reconciler`] — the
/// wrapper reacts to `Connected` by calling `Reconciler::on_transport_reconnect`,
/// since the manager itself knows nothing about order books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// Static connection parameters: where to connect, which hub to address,
/// and how to back off between reconnect attempts.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub connection_url: String,
    pub hub_name: String,
    pub reconnect_policy: ReconnectPolicy,
    pub delay_between_invokes: Duration,
    pub invoke_timeout: Duration,
    pub keepalive_interval: Duration,
    pub auth_secret: Option<String>,
}

impl HubConfig {
    pub fn new(connection_url: impl Into<String>, hub_name: impl Into<String>) -> Self {
        Self {
            connection_url: connection_url.into(),
            hub_name: hub_name.into(),
            reconnect_policy: ReconnectPolicy::default(),
            delay_between_invokes: Duration::from_millis(100),
            invoke_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(5),
            auth_secret: None,
        }
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect_policy = policy;
        self
    }

    pub fn with_delay_between_invokes(mut self, delay: Duration) -> Self {
        self.delay_between_invokes = delay;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_auth_secret(mut self, secret: impl Into<String>) -> Self {
        self.auth_secret = Some(secret.into());
        self
    }
}

pub struct Manager {
    config: HubConfig,
    transport: Arc<dyn RealtimeTransport>,
    registry: Arc<Registry>,
    state: Mutex<ConnectionState>,
    reconnect_lock: Mutex<()>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    disposed: AtomicBool,
    next_invoke_id: AtomicU64,
    pending_invokes: Mutex<HashMap<u64, oneshot::Sender<protocol::InvocationResult>>>,
}

impl Manager {
    pub fn new(config: HubConfig, transport: Arc<dyn RealtimeTransport>, registry: Arc<Registry>) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(32);
        let manager = Arc::new(Self {
            config,
            transport,
            registry,
            state: Mutex::new(ConnectionState::Disconnected),
            reconnect_lock: Mutex::new(()),
            events_tx,
            disposed: AtomicBool::new(false),
            next_invoke_id: AtomicU64::new(1),
            pending_invokes: Mutex::new(HashMap::new()),
        });
        Manager::spawn_read_loop(manager.clone());
        Manager::spawn_keepalive_loop(manager.clone());
        manager
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.lock().await == ConnectionState::Connected
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    /// Registers a listener for `function_name`, invokes it once per element
    /// of `param_sets` (e.g. once per symbol), and returns a handle the
    /// caller can `close()` to unsubscribe. If any invocation is rejected,
    /// the listener registration is rolled back and the error propagated —
    /// subscribe is all-or-nothing.
    pub async fn subscribe(
        self: &Arc<Self>,
        function_name: &str,
        param_sets: Vec<Vec<Value>>,
        callback: super::registry::FrameCallback,
    ) -> Result<Arc<SubscriptionHandle>> {
        self.ensure_connected().await?;

        let (function_full_name, callback_id) = self.registry.add_listener(function_name, param_sets.clone(), callback);

        for (index, params) in param_sets.iter().enumerate() {
            if let Err(error) = self.invoke(&function_full_name, params.clone()).await {
                self.registry.remove_listener(&function_full_name, callback_id);
                return Err(error);
            }
            if index + 1 < param_sets.len() {
                tokio::time::sleep(self.config.delay_between_invokes).await;
            }
        }

        Ok(SubscriptionHandle::new(self.clone(), function_full_name, callback_id))
    }

    /// Removes one callback from the Registry. If that was the registry's
    /// last listener, the transport is torn down — nothing is left to
    /// receive frames for, so there's no point holding the connection (or
    /// the reconnect loop) open. A later `subscribe()` call reconnects on
    /// demand via `ensure_connected`.
    pub(crate) async fn deregister(&self, function_full_name: &str, callback_id: super::registry::CallbackId) {
        let registry_now_empty = self.registry.remove_listener(function_full_name, callback_id);
        if registry_now_empty && !self.disposed.load(Ordering::SeqCst) {
            *self.state.lock().await = ConnectionState::Disconnected;
            self.transport.stop().await;
            let _ = self.events_tx.send(ConnectionEvent::Disconnected);
        }
    }

    /// Requests a fresh authentication challenge for `api_key` by invoking
    /// the hub's `GetAuthContext` method.
    pub async fn get_auth_context(&self, api_key: &str) -> Result<String> {
        let value = self.invoke_with_result("GetAuthContext", vec![Value::String(api_key.to_string())]).await?;
        Ok(value.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default())
    }

    /// Signs `challenge` with the configured secret and authenticates
    /// against the hub via `Authenticate`. No-op (returns `Ok(())`) when no
    /// secret is configured — most hubs this core talks to need no auth.
    pub async fn authenticate(&self, api_key: &str, challenge: &str) -> Result<()> {
        let Some(secret) = self.config.auth_secret.clone() else {
            return Ok(());
        };
        let context = AuthContext { api_key: api_key.to_string(), challenge: challenge.to_string() };
        let (key, signature) = auth::authenticate_args(&secret, &context);
        self.invoke("Authenticate", vec![Value::String(key), Value::String(signature)]).await?;
        Ok(())
    }

    /// Sends one invocation and awaits its correlated result, discarding the
    /// returned value and only surfacing success/failure.
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.invoke_with_result(method, args).await?;
        Ok(())
    }

    /// Sends one invocation, awaits its correlated result, and returns the
    /// server's `R` value — used by calls like `GetAuthContext` whose return
    /// value the caller actually needs, not just a success/failure signal.
    async fn invoke_with_result(&self, method: &str, args: Vec<Value>) -> Result<Option<Value>> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }

        let id = self.next_invoke_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending_invokes.lock().await.insert(id, tx);

        let invocation = OutboundInvocation { hub: &self.config.hub_name, method, args: &args, id };
        self.transport.send(invocation.to_wire()).await?;

        let result = tokio::time::timeout(self.config.invoke_timeout, rx).await;
        self.pending_invokes.lock().await.remove(&id);

        let result = match result {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => return Err(Error::Closed),
            Err(_) => return Err(Error::InvocationTimedOut { method: method.to_string() }),
        };

        if protocol::invocation_succeeded(&result) {
            Ok(result.result)
        } else {
            let reason = result.error.unwrap_or_else(|| "server returned a falsy result".to_string());
            Err(Error::InvocationRejected { method: method.to_string(), reason })
        }
    }

    /// Connects if not already connected, retrying with the configured
    /// backoff policy until successful or the manager is closed.
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.is_connected().await {
            return Ok(());
        }
        self.connect_with_retry().await
    }

    /// Only one caller at a time actually performs the reconnect loop; the
    /// rest wait on the lock and then observe the resulting state.
    async fn connect_with_retry(&self) -> Result<()> {
        let _guard = self.reconnect_lock.lock().await;

        if self.is_connected().await {
            return Ok(());
        }

        *self.state.lock().await = ConnectionState::Connecting;

        let mut attempt = 0u32;
        loop {
            if self.disposed.load(Ordering::SeqCst) {
                return Err(Error::Closed);
            }

            let start_result = self.transport.start(&self.config.connection_url).await;

            match start_result {
                Ok(()) => {
                    *self.state.lock().await = ConnectionState::Connected;
                    let _ = self.events_tx.send(ConnectionEvent::Connected);
                    self.replay_subscriptions().await;
                    return Ok(());
                }
                Err(error) => {
                    tracing::warn!(%error, attempt, "hub connection attempt failed");
                    *self.state.lock().await = ConnectionState::Disconnected;
                    let _ = self.events_tx.send(ConnectionEvent::Disconnected);
                    tokio::time::sleep(self.config.reconnect_policy.delay_for(attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Re-invokes every registered listener's parameter sets. Failures are
    /// logged and skipped rather than propagated: a partially-replayed
    /// connection is still more useful than none, and the caller has no
    /// synchronous way to react to a replay failure anyway.
    async fn replay_subscriptions(&self) {
        for entry in self.registry.replay_entries() {
            for params in entry.param_sets {
                if let Err(error) = self.invoke(&entry.function_full_name, params).await {
                    tracing::error!(method = %entry.function_full_name, %error, "failed to replay subscription after reconnect");
                }
            }
        }
    }

    /// Idempotently tears the connection down. No further reconnects or
    /// invocations are attempted after this.
    pub async fn close(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.state.lock().await = ConnectionState::Disconnected;
        self.transport.stop().await;
        let _ = self.events_tx.send(ConnectionEvent::Disconnected);
    }

    /// Sends a native transport ping on a fixed interval while connected.
    /// Runs for the lifetime of the manager; simply skips ticks that land
    /// while disconnected rather than tearing itself down and restarting.
    fn spawn_keepalive_loop(manager: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.keepalive_interval);
            loop {
                ticker.tick().await;
                if manager.disposed.load(Ordering::SeqCst) {
                    return;
                }
                if manager.is_connected().await {
                    manager.transport.keepalive().await;
                }
            }
        });
    }

    fn spawn_read_loop(manager: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                if manager.disposed.load(Ordering::SeqCst) {
                    return;
                }

                if !manager.is_connected().await {
                    // Nothing to read until the first successful connect;
                    // avoid hammering `recv()` on a transport that hasn't
                    // been started yet.
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }

                let event = manager.transport.recv().await;

                match event {
                    TransportEvent::Message(bytes) => {
                        if bytes.is_empty() {
                            continue;
                        }
                        let Ok(text) = String::from_utf8(bytes) else { continue };
                        manager.dispatch_frame(&text).await;
                    }
                    TransportEvent::Closed | TransportEvent::Error(_) => {
                        if let TransportEvent::Error(error) = &event {
                            tracing::warn!(%error, "hub transport error");
                        }
                        if manager.disposed.load(Ordering::SeqCst) {
                            return;
                        }
                        *manager.state.lock().await = ConnectionState::Disconnected;
                        let _ = manager.events_tx.send(ConnectionEvent::Disconnected);
                        if !manager.registry.is_empty() {
                            let manager = manager.clone();
                            tokio::spawn(async move {
                                if let Err(error) = manager.connect_with_retry().await {
                                    tracing::error!(%error, "reconnect loop exited without recovering");
                                }
                            });
                        }
                    }
                }
            }
        });
    }

    async fn dispatch_frame(&self, text: &str) {
        if let Some(result) = protocol::parse_invocation_result(text) {
            let mut pending = self.pending_invokes.lock().await;
            let matching_id = pending.keys().find(|&&id| result.matches_id(id)).copied();
            if let Some(id) = matching_id {
                if let Some(tx) = pending.remove(&id) {
                    let _ = tx.send(result);
                }
            }
            return;
        }

        for invocation in protocol::parse_inbound(text) {
            let callbacks = self.registry.callbacks_for(&self.registry.resolve(&invocation.method));
            for callback in callbacks {
                let payload = invocation.payload.clone();
                tokio::spawn(async move { callback(payload).await });
            }
        }
    }
}
