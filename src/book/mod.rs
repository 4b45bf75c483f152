//! Order-book data model, parsing and reconciliation.

pub mod parse;
pub mod reconciler;
pub mod snapshot;
pub mod types;

#[cfg(test)]
pub mod test_support;

pub use parse::{parse_keyed, parse_positional, BookFieldNames, ParseError};
pub use reconciler::{Callback, Reconciler};
pub use snapshot::{HttpSnapshotSource, SnapshotError, SnapshotSource};
pub use types::{OrderBook, OrderPrice};
