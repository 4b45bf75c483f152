//! Pluggable realtime transport. The default implementation is a WebSocket
//! mapped from the hub's negotiated HTTP URL, connecting and streaming frames
//! in a single read loop.
//!
//! Methods take `&self` rather than `&mut self`: the send half and receive
//! half of the underlying socket are independently guarded, so a long-lived
//! `recv()` call (waiting on the next frame) never blocks an `invoke()`'s
//! `send()` from going out. Sharing one `&mut` transport across both would
//! serialize outbound invocations behind whatever inbound frame happens to
//! be next, which defeats the point of a duplex connection.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not started")]
    NotStarted,

    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// One event surfaced by a [`RealtimeTransport`] while it is running.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message(Vec<u8>),
    Closed,
    Error(String),
}

/// Abstraction over the underlying realtime connection so the Hub Connection
/// Manager's reconnect/fan-out logic can be tested without a real socket.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn start(&self, url: &str) -> Result<()>;
    async fn send(&self, text: String) -> Result<()>;
    async fn stop(&self);
    /// Awaits the next inbound event. Implementations should return
    /// [`TransportEvent::Closed`] once the connection ends rather than
    /// yielding `None`, so the manager's read loop has a single exit signal.
    async fn recv(&self) -> TransportEvent;
    /// Sends a transport-level keep-alive probe. The manager calls this on a
    /// timer while connected; implementations with no notion of a probe (e.g.
    /// the test double) can rely on the default no-op.
    async fn keepalive(&self) {}
}

/// Rewrites a negotiated hub HTTP(S) URL into its WebSocket equivalent.
pub fn to_websocket_url(hub_url: &str) -> String {
    if let Some(rest) = hub_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = hub_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        hub_url.to_string()
    }
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, tungstenite::Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Default [`RealtimeTransport`]: a single `tokio-tungstenite` WebSocket,
/// split into independent read/write halves so invocations and inbound
/// frames never contend for the same lock. Forwards cookies captured from
/// the hub's HTTP negotiation and replies to server pings automatically.
pub struct WebSocketTransport {
    cookie: Option<String>,
    write: Mutex<Option<WsSink>>,
    read: Mutex<Option<WsStream>>,
    stopped: AtomicBool,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self { cookie: None, write: Mutex::new(None), read: Mutex::new(None), stopped: AtomicBool::new(true) }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    async fn start(&self, url: &str) -> Result<()> {
        let ws_url = to_websocket_url(url);
        let mut request = tungstenite::http::Request::builder().uri(&ws_url);
        if let Some(cookie) = &self.cookie {
            request = request.header("Cookie", cookie.as_str());
        }
        let request = request.body(()).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let (stream, _response) = connect_async(request).await?;
        let (sink, source) = stream.split();
        *self.write.lock().await = Some(sink);
        *self.read.lock().await = Some(source);
        self.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, text: String) -> Result<()> {
        let mut write = self.write.lock().await;
        let sink = write.as_mut().ok_or(TransportError::NotStarted)?;
        sink.send(tungstenite::Message::Text(text)).await?;
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        *self.write.lock().await = None;
        *self.read.lock().await = None;
    }

    /// Sends a native WebSocket ping frame. Errors are swallowed here; a dead
    /// socket surfaces through `recv()` returning `Closed`/`Error` instead.
    async fn keepalive(&self) {
        let mut write = self.write.lock().await;
        if let Some(sink) = write.as_mut() {
            if let Err(error) = sink.send(tungstenite::Message::Ping(Vec::new())).await {
                tracing::debug!(%error, "keep-alive ping failed");
            }
        }
    }

    /// Takes the read half out of its mutex before awaiting the next frame,
    /// so a concurrent `stop()` can clear both halves without waiting on a
    /// frame that may never arrive. The half is put back afterwards unless
    /// the connection closed or `stop()` ran while we were awaiting.
    async fn recv(&self) -> TransportEvent {
        let Some(mut stream) = self.read.lock().await.take() else {
            return TransportEvent::Closed;
        };

        let event = match stream.next().await {
            Some(Ok(tungstenite::Message::Text(text))) => TransportEvent::Message(text.into_bytes()),
            Some(Ok(tungstenite::Message::Binary(bytes))) => TransportEvent::Message(bytes),
            Some(Ok(tungstenite::Message::Ping(payload))) => {
                tracing::debug!("received PING frame");
                let mut write = self.write.lock().await;
                if let Some(sink) = write.as_mut() {
                    let _ = sink.send(tungstenite::Message::Pong(payload)).await;
                }
                TransportEvent::Message(Vec::new())
            }
            Some(Ok(tungstenite::Message::Pong(_) | tungstenite::Message::Frame(_))) => TransportEvent::Message(Vec::new()),
            Some(Ok(tungstenite::Message::Close(frame))) => {
                let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                tracing::debug!(reason, "connection closed by peer");
                TransportEvent::Closed
            }
            Some(Err(error)) => TransportEvent::Error(error.to_string()),
            None => TransportEvent::Closed,
        };

        let keep_open = !matches!(event, TransportEvent::Closed | TransportEvent::Error(_)) && !self.stopped.load(Ordering::SeqCst);
        if keep_open {
            *self.read.lock().await = Some(stream);
        }

        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_maps_to_wss() {
        assert_eq!(to_websocket_url("https://example.com/hub"), "wss://example.com/hub");
    }

    #[test]
    fn http_maps_to_ws() {
        assert_eq!(to_websocket_url("http://example.com/hub"), "ws://example.com/hub");
    }

    #[test]
    fn already_a_websocket_url_is_left_untouched() {
        assert_eq!(to_websocket_url("wss://example.com/hub"), "wss://example.com/hub");
    }
}
