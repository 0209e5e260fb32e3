use thiserror::Error;

use crate::DecodingError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),

    /// A collaborator failed to produce data it was expected to hold, e.g. a
    /// mempool transaction referenced by its own txid list. Fatal for the
    /// enclosing query or batch.
    #[error("missing data: {0}")]
    MissingData(String),

    /// Programming-error class: applying the enclosing batch would let the
    /// two index families diverge.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn missing_data(msg: impl Into<String>) -> Error {
        Error::MissingData(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Error {
        Error::Invariant(msg.into())
    }
}
