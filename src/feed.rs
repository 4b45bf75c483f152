//! API-level wrapper tying the Wire Decoder, Book Parser, Reconciler and Hub
//! Connection Manager together into one subscription call. The Manager owns
//! the transport and Registry; this wrapper owns the Reconciler, since the
//! Manager itself has no concept of order books.

use std::sync::Arc;

use serde_json::Value;

use crate::book::{self, BookFieldNames, Reconciler, SnapshotSource};
use crate::codec;
use crate::dialect::Dialect;
use crate::hub::{ConnectionEvent, FrameCallback, HubConfig, Manager, Registry, SubscriptionHandle};

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("hub error: {0}")]
    Hub(#[from] crate::hub::Error),

    #[error("failed to decode wire payload: {0}")]
    Decode(#[from] codec::DecodeError),
}

/// One live order-book feed: a Manager subscription whose decoded payloads
/// are parsed and fed into a per-symbol Reconciler.
pub struct OrderBookFeed {
    manager: Arc<Manager>,
    handle: Arc<SubscriptionHandle>,
}

impl OrderBookFeed {
    /// Subscribes to `function_name` on `manager`'s hub with one invocation
    /// per symbol in `symbols`, wiring a Reconciler of the given `dialect`
    /// between the decoded frames and `on_book`. Also spawns a task that
    /// clears the Reconciler's state whenever the Manager reports a fresh
    /// `Connected` event, since sequence continuity cannot be assumed across
    /// a reconnect of unknown duration.
    pub async fn subscribe(
        manager: Arc<Manager>,
        function_name: &str,
        symbols: Vec<String>,
        dialect: Dialect,
        max_count: usize,
        fields: BookFieldNames,
        snapshot_source: Arc<dyn SnapshotSource>,
        on_book: book::Callback,
    ) -> Result<Arc<Self>> {
        let reconciler = Arc::new(Reconciler::new(dialect, max_count, snapshot_source, on_book));

        let mut events = manager.subscribe_events();
        let reconciler_for_events = reconciler.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if event == ConnectionEvent::Connected {
                    reconciler_for_events.on_transport_reconnect();
                }
            }
        });

        let reconciler_for_frames = reconciler.clone();
        let fields = Arc::new(fields);
        let callback: FrameCallback = Arc::new(move |frame: String| {
            let reconciler = reconciler_for_frames.clone();
            let fields = fields.clone();
            let max_count = max_count;
            Box::pin(async move {
                let Ok(decoded) = codec::decode(&frame) else {
                    tracing::warn!("dropping hub frame that failed wire decoding");
                    return;
                };
                let Ok(root) = serde_json::from_str::<Value>(&decoded) else {
                    tracing::warn!("dropping hub frame that was not valid JSON after decoding");
                    return;
                };
                let symbol = root
                    .get("symbol")
                    .or_else(|| root.get("MarketSymbol"))
                    .or_else(|| root.get("S"))
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN")
                    .to_string();

                let parsed = book::parse_keyed(&symbol, &root, &fields, max_count).or_else(|_| book::parse_positional(&symbol, &root, &fields, max_count));
                match parsed {
                    Ok(incoming) => reconciler.on_increment(incoming).await,
                    Err(error) => tracing::warn!(%error, "dropping order book frame that failed to parse"),
                }
            })
        });

        let param_sets: Vec<Vec<Value>> = symbols.into_iter().map(|symbol| vec![Value::String(symbol)]).collect();
        let handle = manager.subscribe(function_name, param_sets, callback).await?;

        Ok(Arc::new(Self { manager, handle }))
    }

    pub async fn close(&self) {
        self.handle.close().await;
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }
}

/// Convenience constructor bundling [`HubConfig`], a fresh [`Registry`] and
/// the default [`crate::hub::WebSocketTransport`] into a running [`Manager`].
pub fn new_manager(config: HubConfig) -> Arc<Manager> {
    let registry = Arc::new(Registry::new(crate::hub::NameResolver::default()));
    Manager::new(config, Arc::new(crate::hub::WebSocketTransport::new()), registry)
}
