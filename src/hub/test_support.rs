//! Test doubles for the hub connection manager: a [`RealtimeTransport`] that
//! never touches a socket, with hooks to script replies and inject inbound
//! frames.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use super::protocol::InboundInvocation;
use super::transport::{RealtimeTransport, Result, TransportError, TransportEvent};

#[derive(Debug, Clone)]
enum AutoReply {
    None,
    Ok,
    Error,
    Value(Value),
}

struct Inner {
    sent: Vec<String>,
    inbound: VecDeque<TransportEvent>,
    started: bool,
    auto_reply: AutoReply,
    keepalives: usize,
    starts: usize,
}

/// A [`RealtimeTransport`] double. `send()` parses the outgoing invocation's
/// id and, if an auto-reply mode is configured, immediately queues the
/// matching `{"I","R"|"E"}` result frame as the next `recv()`.
#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sent: Vec::new(),
                inbound: VecDeque::new(),
                started: false,
                auto_reply: AutoReply::None,
                keepalives: 0,
                starts: 0,
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn auto_reply_ok(self) -> Self {
        self.inner.lock().unwrap().auto_reply = AutoReply::Ok;
        self
    }

    pub fn auto_reply_error(self, _reason: &str) -> Self {
        self.inner.lock().unwrap().auto_reply = AutoReply::Error;
        self
    }

    /// Replies to every outgoing invocation with the given `R` value instead
    /// of a plain boolean — used to exercise calls like `GetAuthContext`
    /// whose return value the caller actually reads.
    pub fn auto_reply_value(self, value: Value) -> Self {
        self.inner.lock().unwrap().auto_reply = AutoReply::Value(value);
        self
    }

    /// Injects a raw inbound frame (e.g. a server invocation envelope) to be
    /// returned by the next `recv()`.
    pub fn push_inbound(&self, frame: String) {
        self.inner.lock().unwrap().inbound.push_back(TransportEvent::Message(frame.into_bytes()));
        self.notify.notify_one();
    }

    /// Queues a `Closed` event, as if the peer had ended the connection, for
    /// the next `recv()`.
    pub fn push_closed(&self) {
        self.inner.lock().unwrap().inbound.push_back(TransportEvent::Closed);
        self.notify.notify_one();
    }

    /// Queues an `Error` event for the next `recv()`.
    pub fn push_error(&self, reason: impl Into<String>) {
        self.inner.lock().unwrap().inbound.push_back(TransportEvent::Error(reason.into()));
        self.notify.notify_one();
    }

    pub fn sent_frames(&self) -> Vec<String> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn keepalive_count(&self) -> usize {
        self.inner.lock().unwrap().keepalives
    }

    /// Number of times `start()` actually ran, i.e. the number of real
    /// connection attempts (as opposed to reconnect callers that found the
    /// manager already reconnected and returned without starting anything).
    pub fn start_count(&self) -> usize {
        self.inner.lock().unwrap().starts
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_id(text: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(text).ok()?;
    value.get("I")?.as_u64()
}

#[async_trait]
impl RealtimeTransport for FakeTransport {
    async fn start(&self, _url: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.started = true;
        inner.starts += 1;
        Ok(())
    }

    async fn send(&self, text: String) -> Result<()> {
        if !self.inner.lock().unwrap().started {
            return Err(TransportError::NotStarted);
        }

        let (reply, id) = {
            let mut inner = self.inner.lock().unwrap();
            inner.sent.push(text.clone());
            (inner.auto_reply.clone(), extract_id(&text))
        };

        if let Some(id) = id {
            let frame = match reply {
                AutoReply::Ok => Some(serde_json::json!({"I": id, "R": true}).to_string()),
                AutoReply::Error => Some(serde_json::json!({"I": id, "E": "rejected"}).to_string()),
                AutoReply::Value(value) => Some(serde_json::json!({"I": id, "R": value}).to_string()),
                AutoReply::None => None,
            };
            if let Some(frame) = frame {
                self.push_inbound(frame);
            }
        }

        Ok(())
    }

    async fn stop(&self) {
        self.inner.lock().unwrap().started = false;
    }

    async fn recv(&self) -> TransportEvent {
        loop {
            if let Some(event) = self.inner.lock().unwrap().inbound.pop_front() {
                return event;
            }
            self.notify.notified().await;
        }
    }

    async fn keepalive(&self) {
        self.inner.lock().unwrap().keepalives += 1;
    }
}

/// Parses the first server invocation out of a raw frame, for assertions in
/// manager-level tests that don't want to depend on `protocol` internals.
#[allow(dead_code)]
pub fn first_invocation(frame: &str) -> Option<InboundInvocation> {
    super::protocol::parse_inbound(frame).into_iter().next()
}
