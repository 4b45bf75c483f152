//! Exchange dispatch directory: maps a stable exchange identifier to the delta
//! [`Dialect`] it speaks and the book depth it is subscribed at.
//!
//! A flat lookup table plus a tagged enum, rather than a hierarchy of
//! per-exchange adapter classes.

use std::collections::HashMap;

/// One of the three observed exchange delivery dialects for order-book feeds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Dialect {
    /// First message is a partial delta; a REST snapshot is fetched to seed state.
    DeltaOnly,
    /// First message is a full snapshot; all following messages are partial deltas.
    SnapshotThenDelta,
    /// Every message is a full snapshot that replaces prior state outright.
    FullEachTime,
}

#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Stable identifier for an upstream exchange.
///
/// Mirrors the surface of exchanges a book reconciler needs to dispatch on;
/// not an exhaustive enumeration of every market an upstream feed might know
/// about.
pub enum ExchangeId {
    Binance,
    BinanceFutures,
    BinanceUs,
    Bitmex,
    Bitfinex,
    Bitstamp,
    Bybit,
    Coinbase,
    Deribit,
    Gemini,
    Huobi,
    Kraken,
    Kucoin,
    Okex,
    Poloniex,
    WooX,
}

impl ToString for ExchangeId {
    fn to_string(&self) -> String {
        serde_json::to_value(self)
            .unwrap()
            .as_str()
            .unwrap()
            .to_string()
    }
}

/// Per-exchange dispatch entry: which dialect it speaks, and the maximum
/// number of levels per side the reconciler should request/retain.
#[derive(Debug, Copy, Clone)]
pub struct ExchangeProfile {
    pub dialect: Dialect,
    pub max_count: usize,
}

/// Registry from [`ExchangeId`] to its [`ExchangeProfile`].
///
/// Construction is explicit (no implicit global singleton) so callers can
/// compose a directory scoped to the exchanges they actually subscribe to.
#[derive(Debug, Default, Clone)]
pub struct DispatchDirectory {
    profiles: HashMap<ExchangeId, ExchangeProfile>,
}

impl DispatchDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, exchange: ExchangeId, profile: ExchangeProfile) -> &mut Self {
        self.profiles.insert(exchange, profile);
        self
    }

    pub fn profile(&self, exchange: ExchangeId) -> Option<ExchangeProfile> {
        self.profiles.get(&exchange).copied()
    }

    /// Builds the directory with the dialects observed in practice for a
    /// handful of well-known exchanges. Callers are free to override any
    /// entry via [`DispatchDirectory::register`].
    pub fn with_known_defaults() -> Self {
        let mut directory = Self::new();
        directory
            .register(
                ExchangeId::Binance,
                ExchangeProfile { dialect: Dialect::DeltaOnly, max_count: 1000 },
            )
            .register(
                ExchangeId::BinanceFutures,
                ExchangeProfile { dialect: Dialect::DeltaOnly, max_count: 1000 },
            )
            .register(
                ExchangeId::Bitmex,
                ExchangeProfile { dialect: Dialect::SnapshotThenDelta, max_count: 25 },
            )
            .register(
                ExchangeId::Bybit,
                ExchangeProfile { dialect: Dialect::SnapshotThenDelta, max_count: 200 },
            )
            .register(
                ExchangeId::Coinbase,
                ExchangeProfile { dialect: Dialect::SnapshotThenDelta, max_count: 50 },
            )
            .register(
                ExchangeId::Deribit,
                ExchangeProfile { dialect: Dialect::FullEachTime, max_count: 20 },
            )
            .register(
                ExchangeId::Kraken,
                ExchangeProfile { dialect: Dialect::SnapshotThenDelta, max_count: 100 },
            )
            .register(
                ExchangeId::Okex,
                ExchangeProfile { dialect: Dialect::FullEachTime, max_count: 400 },
            );
        directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_exchange_has_no_profile() {
        let directory = DispatchDirectory::new();
        assert!(directory.profile(ExchangeId::Binance).is_none());
    }

    #[test]
    fn known_defaults_cover_binance_as_delta_only() {
        let directory = DispatchDirectory::with_known_defaults();
        let profile = directory.profile(ExchangeId::Binance).unwrap();
        assert!(matches!(profile.dialect, Dialect::DeltaOnly));
        assert_eq!(profile.max_count, 1000);
    }

    #[test]
    fn register_overrides_existing_entry() {
        let mut directory = DispatchDirectory::with_known_defaults();
        directory.register(
            ExchangeId::Binance,
            ExchangeProfile { dialect: Dialect::FullEachTime, max_count: 5 },
        );
        let profile = directory.profile(ExchangeId::Binance).unwrap();
        assert!(matches!(profile.dialect, Dialect::FullEachTime));
        assert_eq!(profile.max_count, 5);
    }
}
