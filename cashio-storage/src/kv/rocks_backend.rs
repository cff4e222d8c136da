//! RocksDB key-value backend for production use.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, Options, DB};
use tracing::info;

use super::{BatchOp, KvBackend, PrefixIterator, WriteBatch};
use crate::error::StorageError;

/// RocksDB-based key-value backend.
///
/// Writes go through the WAL, so a committed batch survives a crash and a
/// batch that did not commit leaves nothing behind.
pub struct RocksBackend {
    db: Arc<DB>,
}

impl RocksBackend {
    /// Open or create a RocksDB database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // Shards are written once and read rarely; keep memtables modest.
        opts.set_write_buffer_size(32 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);
        opts.set_level_compaction_dynamic_level_bytes(true);

        Self::open_with_opts(path, opts)
    }

    /// Open a RocksDB database with custom options.
    pub fn open_with_opts<P: AsRef<Path>>(path: P, opts: Options) -> Result<Self, StorageError> {
        let db = DB::open(&opts, path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened RocksDB");
        Ok(Self { db: Arc::new(db) })
    }

    /// Get estimated number of keys in the database.
    pub fn estimate_num_keys(&self) -> Option<u64> {
        self.db
            .property_int_value("rocksdb.estimate-num-keys")
            .ok()
            .flatten()
    }
}

impl KvBackend for RocksBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.put(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.db.delete(key)?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.operations {
            match op {
                BatchOp::Put { key, value } => rocks_batch.put(&key, &value),
                BatchOp::Delete { key } => rocks_batch.delete(&key),
            }
        }
        self.db.write(rocks_batch)?;
        Ok(())
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Result<PrefixIterator<'_>, StorageError> {
        // Collected eagerly so a read error surfaces here instead of
        // silently ending the scan.
        let mut entries = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(Box::new(entries.into_iter()))
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}
