//! Core order-book data model: [`OrderPrice`] levels held in an ordered
//! [`OrderBook`] per symbol, shared by the parser, reconciler and snapshot
//! collaborator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A single resting price level.
///
/// `price == 0` or `amount == 0` marks a deletion of that price when applied
/// as part of a delta; a level actually resting in a book never carries
/// either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OrderPrice {
    pub price: Decimal,
    pub amount: Decimal,
}

impl OrderPrice {
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }

    /// A level with this price/amount pair represents a removal, not a
    /// resting order.
    pub fn is_deletion(&self) -> bool {
        self.amount <= Decimal::ZERO || self.price <= Decimal::ZERO
    }
}

/// A full order-book snapshot or delta for one symbol.
///
/// Both sides are stored in a `BTreeMap` keyed by price, which keeps
/// iteration order ascending for free and gives O(log n) upsert/removal —
/// the same complexity a hand-rolled sorted-vec would need binary search
/// to achieve, with none of the shifting cost on insert/delete.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    pub sequence_id: i64,
    pub asks: BTreeMap<Decimal, OrderPrice>,
    pub bids: BTreeMap<Decimal, OrderPrice>,
    pub last_updated_utc: DateTime<Utc>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>, sequence_id: i64) -> Self {
        Self {
            symbol: symbol.into(),
            sequence_id,
            asks: BTreeMap::new(),
            bids: BTreeMap::new(),
            last_updated_utc: Utc::now(),
        }
    }

    /// Best bid is the highest bid price, i.e. the last entry of the
    /// ascending-sorted bid map.
    pub fn best_bid(&self) -> Option<&OrderPrice> {
        self.bids.values().next_back()
    }

    /// Best ask is the lowest ask price, i.e. the first entry of the
    /// ascending-sorted ask map.
    pub fn best_ask(&self) -> Option<&OrderPrice> {
        self.asks.values().next()
    }

    /// True if every live level satisfies `price > 0 && amount > 0`. Used by
    /// tests to assert the no-negative/zero-level invariant on emission.
    pub fn has_only_live_levels(&self) -> bool {
        self.asks.values().chain(self.bids.values()).all(|level| {
            level.price > Decimal::ZERO && level.amount > Decimal::ZERO
        })
    }
}
