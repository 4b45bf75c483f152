//! Book Parser: turns a JSON token tree into an [`OrderBook`], in either of
//! the two layouts exchanges are observed to use for levels — positional
//! `[price, amount]` pairs or keyed `{price, amount}` objects.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use super::types::{OrderBook, OrderPrice};

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing or non-array field `{0}`")]
    MissingArray(String),

    #[error("missing sequence field `{0}`")]
    MissingSequence(String),

    #[error("level entry `{0}` was not a valid price/amount pair")]
    MalformedLevel(String),

    #[error("field `{field}` could not be parsed as a decimal: {source}")]
    InvalidDecimal {
        field: String,
        #[source]
        source: rust_decimal::Error,
    },
}

/// Field name overrides for a given exchange's JSON schema; the sequence
/// field and per-side array field names vary across dialects/exchanges.
#[derive(Debug, Clone)]
pub struct BookFieldNames {
    pub sequence: String,
    pub asks: String,
    pub bids: String,
    pub price: String,
    pub amount: String,
}

impl Default for BookFieldNames {
    fn default() -> Self {
        Self {
            sequence: "sequence".to_string(),
            asks: "asks".to_string(),
            bids: "bids".to_string(),
            price: "price".to_string(),
            amount: "amount".to_string(),
        }
    }
}

fn parse_decimal(value: &Value, field: &str) -> Result<Decimal> {
    let as_text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => return Err(ParseError::MalformedLevel(other.to_string())),
    };
    Decimal::from_str(&as_text).map_err(|source| ParseError::InvalidDecimal { field: field.to_string(), source })
}

fn read_sequence_id(root: &Value, fields: &BookFieldNames) -> Result<i64> {
    root.get(&fields.sequence)
        .and_then(Value::as_i64)
        .ok_or_else(|| ParseError::MissingSequence(fields.sequence.clone()))
}

fn side_array<'a>(root: &'a Value, field: &str) -> Result<&'a [Value]> {
    root.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| ParseError::MissingArray(field.to_string()))
}

/// Parses a book with `[price, amount]` positional level pairs.
///
/// Each side is truncated to `max_count` entries; duplicate prices within the
/// input collapse to the last occurrence, matching `BTreeMap` insert
/// semantics.
pub fn parse_positional(symbol: &str, root: &Value, fields: &BookFieldNames, max_count: usize) -> Result<OrderBook> {
    let sequence_id = read_sequence_id(root, fields)?;
    let mut book = OrderBook::new(symbol, sequence_id);

    for (side_field, side_map) in [(&fields.asks, &mut book.asks), (&fields.bids, &mut book.bids)] {
        for entry in side_array(root, side_field)?.iter().take(max_count) {
            let pair = entry
                .as_array()
                .filter(|a| a.len() >= 2)
                .ok_or_else(|| ParseError::MalformedLevel(entry.to_string()))?;
            let price = parse_decimal(&pair[0], &fields.price)?;
            let amount = parse_decimal(&pair[1], &fields.amount)?;
            side_map.insert(price, OrderPrice::new(price, amount));
        }
    }

    Ok(book)
}

/// Parses a book with `{price, amount}` keyed level objects.
pub fn parse_keyed(symbol: &str, root: &Value, fields: &BookFieldNames, max_count: usize) -> Result<OrderBook> {
    let sequence_id = read_sequence_id(root, fields)?;
    let mut book = OrderBook::new(symbol, sequence_id);

    for (side_field, side_map) in [(&fields.asks, &mut book.asks), (&fields.bids, &mut book.bids)] {
        for entry in side_array(root, side_field)?.iter().take(max_count) {
            let price_value = entry
                .get(&fields.price)
                .ok_or_else(|| ParseError::MalformedLevel(entry.to_string()))?;
            let amount_value = entry
                .get(&fields.amount)
                .ok_or_else(|| ParseError::MalformedLevel(entry.to_string()))?;
            let price = parse_decimal(price_value, &fields.price)?;
            let amount = parse_decimal(amount_value, &fields.amount)?;
            side_map.insert(price, OrderPrice::new(price, amount));
        }
    }

    Ok(book)
}
