use std::ops::Range;

use crate::error::Error;

pub mod encdec;
pub mod kv_store;
pub mod table;

pub type RawKey = Vec<u8>;
pub type RawValue = Vec<u8>;

/// Two-byte namespace handed to a service by the store, so multiple index
/// families share one keyspace without collision.
pub type ServicePrefix = [u8; 2];

pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(RawKey, RawValue), Error>> + Send + 'a>;

/// One entry of an ordered mutation batch. The indexing engine computes
/// these; only the caller persists them, atomically via [`Store::batch_apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put { key: RawKey, value: RawValue },
    Delete { key: RawKey },
}

impl Mutation {
    pub fn key(&self) -> &[u8] {
        match self {
            Mutation::Put { key, .. } => key,
            Mutation::Delete { key } => key,
        }
    }

    pub fn is_put(&self) -> bool {
        matches!(self, Mutation::Put { .. })
    }
}

/// Ordered key-value store boundary.
///
/// `batch_apply` must be atomic: a concurrent `range_read` observes either
/// none or all of a batch. Errors are propagated verbatim; retry policy, if
/// any, lives below this interface.
pub trait Store: Send + Sync {
    /// Lazy scan over `[range.start, range.end)` in key order, or reversed.
    fn range_read(&self, range: Range<RawKey>, reverse: bool) -> KvIter<'_>;

    fn batch_apply(&self, mutations: Vec<Mutation>) -> Result<(), Error>;

    /// Stable namespace prefix for the named service, assigned on first use.
    fn namespace_prefix(&self, service: &str) -> Result<ServicePrefix, Error>;
}
