use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options,
    ReadOptions, SliceTransform, WriteBatch,
};
use tracing::{info, trace};

use crate::error::Error;
use crate::storage::encdec::{Decode, Encode};
use crate::storage::{KvIter, Mutation, RawKey, ServicePrefix, Store};

static INDEX_CF_NAME: &str = "address_index";

/// Namespace assignment rows live above every assignable service prefix;
/// allocation is capped below `u16::MAX` so data keys never reach here.
const META_PREFIX: ServicePrefix = [0xff, 0xff];

const BLOCK_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// RocksDB-backed [`Store`]: one named column family holding every index
/// family, WriteBatch application for atomicity, and persistent namespace
/// prefix assignment.
pub struct RocksStore {
    db: Arc<DB>,
    // serialises prefix allocation; reads of assigned prefixes skip it
    alloc_lock: Mutex<()>,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut db_opts = Options::default();
        db_opts.create_missing_column_families(true);
        db_opts.create_if_missing(true);

        let cache = Cache::new_lru_cache(BLOCK_CACHE_BYTES);

        let mut cf_opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        cf_opts.set_block_based_table_factory(&block_opts);

        // service prefix + family byte
        cf_opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(3));

        let cfs = vec![ColumnFamilyDescriptor::new(INDEX_CF_NAME, cf_opts)];

        let db = DB::open_cf_descriptors(&db_opts, path, cfs)?;

        info!("opened address index db");

        Ok(Self {
            db: Arc::new(db),
            alloc_lock: Mutex::new(()),
        })
    }

    fn cf_handle(&self) -> &ColumnFamily {
        self.db.cf_handle(INDEX_CF_NAME).expect("cf missing")
    }

    fn read_prefix(&self, key: &[u8]) -> Result<Option<ServicePrefix>, Error> {
        let Some(raw) = self.db.get_cf(self.cf_handle(), key)? else {
            return Ok(None);
        };

        let assigned = ServicePrefix::decode_all(&raw)?;
        Ok(Some(assigned))
    }
}

impl Store for RocksStore {
    fn range_read(&self, range: Range<RawKey>, reverse: bool) -> KvIter<'_> {
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(range);

        let mode = if reverse {
            IteratorMode::End
        } else {
            IteratorMode::Start
        };

        let iter = self.db.iterator_cf_opt(self.cf_handle(), read_opts, mode);

        Box::new(iter.map(|result| {
            result
                .map(|(key, value)| (key.into_vec(), value.into_vec()))
                .map_err(Error::from)
        }))
    }

    fn batch_apply(&self, mutations: Vec<Mutation>) -> Result<(), Error> {
        let cf = self.cf_handle();
        let mut wb = WriteBatch::default();

        for mutation in mutations {
            match mutation {
                Mutation::Put { key, value } => wb.put_cf(cf, key, value),
                Mutation::Delete { key } => wb.delete_cf(cf, key),
            }
        }

        trace!(ops = wb.len(), "applying mutation batch");

        self.db.write(wb)?;

        Ok(())
    }

    fn namespace_prefix(&self, service: &str) -> Result<ServicePrefix, Error> {
        let assignment_key = [&META_PREFIX[..], b"prefix/", service.as_bytes()].concat();

        if let Some(assigned) = self.read_prefix(&assignment_key)? {
            return Ok(assigned);
        }

        let _guard = self.alloc_lock.lock().expect("prefix allocation poisoned");

        // lost the race? another caller may have assigned it already
        if let Some(assigned) = self.read_prefix(&assignment_key)? {
            return Ok(assigned);
        }

        let cf = self.cf_handle();
        let counter_key = [&META_PREFIX[..], b"next_prefix"].concat();

        let next = match self.db.get_cf(cf, &counter_key)? {
            Some(raw) => u16::decode_all(&raw)?,
            None => 0,
        };

        if next == u16::MAX {
            return Err(Error::invariant("namespace prefixes exhausted"));
        }

        let assigned = next.to_be_bytes();

        let mut wb = WriteBatch::default();
        wb.put_cf(cf, &assignment_key, assigned.encode());
        wb.put_cf(cf, &counter_key, (next + 1).encode());
        self.db.write(wb)?;

        trace!(service, prefix = %hex::encode(assigned), "assigned namespace prefix");

        Ok(assigned)
    }
}
