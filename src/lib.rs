//! A live order-book reconciler and SignalR-style realtime hub client for
//! cryptocurrency exchange feeds.
//!
//! Two coupled subsystems live here: [`book`] turns an exchange's raw
//! delta/snapshot dialect into a monotonic full-book stream per symbol, and
//! [`hub`] is the persistent realtime connection (reconnect, subscription
//! replay, frame dispatch) some exchanges use to deliver those messages.
//! [`feed`] wires the two together behind one `subscribe` call.

pub mod book;
pub mod codec;
pub mod config;
pub mod dialect;
pub mod feed;
pub mod hub;

pub use codec::{decode, DecodeError};
pub use config::Config;
pub use dialect::{Dialect, DispatchDirectory, ExchangeId, ExchangeProfile};
pub use feed::{new_manager, FeedError, OrderBookFeed};
