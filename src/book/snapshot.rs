//! REST snapshot collaborator: the `DeltaOnly` dialect seeds its state from a
//! REST order-book snapshot rather than from the feed itself. The Reconciler
//! only depends on the [`SnapshotSource`] trait so it can be driven by a fake
//! in tests; [`HttpSnapshotSource`] is the default `reqwest`-backed
//! implementation, wrapping a base URL and bearer token around a single
//! `reqwest::Client`.

use async_trait::async_trait;

use super::parse::{parse_keyed, BookFieldNames};
use super::types::OrderBook;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to send snapshot request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse snapshot response: {0}")]
    Parse(#[from] crate::book::parse::ParseError),
}

/// Fetches a REST order-book snapshot for a symbol, bounded by `max_count`
/// levels per side. Implementations must return a `sequence_id` comparable
/// to the delta `sequence_id`s the feed emits for the same symbol.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn get_order_book(&self, symbol: &str, max_count: usize) -> Result<OrderBook>;
}

/// Default REST-backed [`SnapshotSource`], hitting a single exchange-specific
/// base URL with bearer auth.
pub struct HttpSnapshotSource {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    fields: BookFieldNames,
}

impl HttpSnapshotSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

        Self {
            base_url: base_url.into(),
            api_key: None,
            client: reqwest::Client::builder().user_agent(USER_AGENT).build().unwrap(),
            fields: BookFieldNames::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_field_names(mut self, fields: BookFieldNames) -> Self {
        self.fields = fields;
        self
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn get_order_book(&self, symbol: &str, max_count: usize) -> Result<OrderBook> {
        let mut request = self
            .client
            .get(format!("{}/orderbook/{}", &self.base_url, symbol))
            .query(&[("depth", max_count)]);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let body: serde_json::Value = request.send().await?.json().await?;
        Ok(parse_keyed(symbol, &body, &self.fields, max_count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::test_support::FakeSnapshotSource;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn fake_source_returns_the_configured_book() {
        let mut book = OrderBook::new("BTCUSDT", 100);
        book.asks.insert(dec!(10), crate::book::types::OrderPrice::new(dec!(10), dec!(1)));
        let source = FakeSnapshotSource::new(book.clone());
        let fetched = source.get_order_book("BTCUSDT", 50).await.unwrap();
        assert_eq!(fetched.sequence_id, 100);
        assert_eq!(fetched.asks.len(), 1);
    }
}
