//! Address indexing core for a bitcoin full node's auxiliary database.
//!
//! Given resolved block and mempool transaction data, this crate maintains
//! two coupled key/value index families over an ordered store: the address
//! index (one row per address/transaction touch) and the utxo index (one row
//! per currently unspent output). The [`index::IndexingEngine`] computes the
//! mutation batches which keep both families consistent across block
//! connects and reorg disconnects; the [`query::QueryEngine`] serves
//! history, summary and utxo reads by merging the persisted index with live
//! mempool state.

pub mod error;
pub mod index;
pub mod query;
pub mod services;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::Error;
pub use storage::encdec::{DecodingError, DecodingResult};
