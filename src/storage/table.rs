use std::marker::PhantomData;
use std::ops::Range;

use crate::error::Error;
use crate::storage::{KvIter, ServicePrefix};

use super::encdec::{Decode, Encode, prefix_key_range};

/// Fixed-position byte (directly after the service prefix) distinguishing
/// the key families sharing the service's namespace. Do not renumber, only
/// add new variants.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum KeyFamily {
    AddressIndex = 0,
    UtxoIndex = 1,
}

/// Defines an IndexTable.
///
/// # Example
/// ```ignore
/// define_index_table! {
///     name: UtxoIndexKV,
///     key_type: UtxoIndexKey,
///     value_type: UtxoIndexValue,
///     family: KeyFamily::UtxoIndex
/// }
/// ```
#[macro_export]
macro_rules! define_index_table {
    {
        name: $name:ident,
        key_type: $key_type:ty,
        value_type: $value_type:ty,
        family: $family:expr
    } => {
        pub struct $name;

        impl $crate::storage::table::TableBase for $name {
            type Key = $key_type;
            type Value = $value_type;
        }

        impl $crate::storage::table::IndexTable for $name {
            const FAMILY: $crate::storage::table::KeyFamily = $family;
        }
    };
}

/// Common trait with basic table requirements
pub trait TableBase {
    /// Key type for the table.
    type Key: Encode + Decode;

    /// Value type for the table.
    type Value: Encode + Decode;
}

/// A typed table within one service namespace, keyed under a unique family
/// byte.
pub trait IndexTable: TableBase {
    const FAMILY: KeyFamily;

    /// Raw prefix shared by every key of this table: service prefix plus
    /// family byte.
    fn table_prefix(prefix: &ServicePrefix) -> Vec<u8> {
        let mut out = Vec::with_capacity(prefix.len() + 1);
        out.extend_from_slice(prefix);
        out.push(Self::FAMILY as u8);
        out
    }

    /// Encodes the full key by combining the table prefix and the encoded key.
    fn encode_key(prefix: &ServicePrefix, key: &Self::Key) -> Vec<u8> {
        let mut out = Self::table_prefix(prefix);
        out.extend(key.encode());
        out
    }

    /// Scan bounds from optional partial keys: `lower` inclusive, `upper`
    /// exclusive. `None` falls back to the edge of the table's keyspace.
    fn encode_range<L: Encode, U: Encode>(
        prefix: &ServicePrefix,
        lower: Option<&L>,
        upper: Option<&U>,
    ) -> Range<Vec<u8>> {
        let table_prefix = Self::table_prefix(prefix);

        let start = match lower {
            Some(partial) => [table_prefix.as_slice(), &partial.encode()].concat(),
            None => table_prefix.clone(),
        };

        let end = match upper {
            Some(partial) => [table_prefix.as_slice(), &partial.encode()].concat(),
            None => prefix_key_range(&table_prefix).end,
        };

        start..end
    }
}

/// Typed pull-based view over a raw range scan: strips the table prefix and
/// decodes each row, surfacing scan and decode failures in-band.
pub struct TableIterator<'a, T: IndexTable> {
    inner: KvIter<'a>,
    table_prefix: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<'a, T: IndexTable> TableIterator<'a, T> {
    pub fn new(inner: KvIter<'a>, prefix: &ServicePrefix) -> Self {
        Self {
            inner,
            table_prefix: T::table_prefix(prefix),
            _marker: PhantomData,
        }
    }
}

impl<T: IndexTable> Iterator for TableIterator<'_, T> {
    type Item = Result<(T::Key, T::Value), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.inner.next()?;

        Some(result.and_then(|(raw_key, raw_value)| {
            let key_bytes = raw_key
                .strip_prefix(self.table_prefix.as_slice())
                .ok_or_else(|| {
                    Error::invariant(format!(
                        "scanned key {} outside table range",
                        hex::encode(&raw_key)
                    ))
                })?;

            let key = T::Key::decode_all(key_bytes)?;
            let value = T::Value::decode_all(&raw_value)?;

            Ok((key, value))
        }))
    }
}
