//! SignalR-style realtime hub client: wire decoding, subscription registry,
//! reconnect policy, and the connection manager that ties them together.

pub mod auth;
pub mod handle;
pub mod manager;
pub mod protocol;
pub mod reconnect;
pub mod registry;
pub mod transport;

#[cfg(test)]
pub mod test_support;

pub use handle::SubscriptionHandle;
pub use manager::{ConnectionEvent, Error, HubConfig, Manager, Result};
pub use reconnect::ReconnectPolicy;
pub use registry::{CallbackId, FrameCallback, NameResolver, Registry};
pub use transport::{RealtimeTransport, TransportEvent, WebSocketTransport};
