//! Key-value storage backends.
//!
//! Both the commitment tree and the blob store sit on this abstraction:
//! - `MemoryBackend`: in-memory BTreeMap storage for tests
//! - `RocksBackend`: RocksDB storage for production
//!
//! Multi-record updates go through [`WriteBatch`] so that readers never
//! observe half of an insert, store or delete.

mod memory_backend;
mod rocks_backend;

pub use memory_backend::MemoryBackend;
pub use rocks_backend::RocksBackend;

use crate::error::StorageError;

/// Type alias for the iterator returned by prefix_iterator.
pub type PrefixIterator<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

/// Trait for key-value storage backends.
///
/// Implementations must provide atomic batch writes and iteration in
/// ascending key order.
pub trait KvBackend: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Put a key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), StorageError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply a batch of writes atomically, in order.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Iterate over all keys with a given prefix, in key order.
    fn prefix_iterator(&self, prefix: &[u8]) -> Result<PrefixIterator<'_>, StorageError>;

    /// Flush any buffered data to disk (if applicable).
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// A batch of write operations to be applied atomically.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    /// Operations in the batch.
    pub operations: Vec<BatchOp>,
}

/// A single operation in a write batch.
#[derive(Clone, Debug)]
pub enum BatchOp {
    /// Put a key-value pair.
    Put {
        /// The key to write.
        key: Vec<u8>,
        /// The value to write.
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// The key to delete.
        key: Vec<u8>,
    },
}

impl WriteBatch {
    /// Create a new empty write batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a put operation to the batch.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.operations.push(BatchOp::Put { key, value });
    }

    /// Add a delete operation to the batch.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.operations.push(BatchOp::Delete { key });
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Get the number of operations in the batch.
    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn check_basic<B: KvBackend>(backend: &B) {
        backend.put(b"key1", b"value1").unwrap();
        assert_eq!(backend.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(backend.get(b"nonexistent").unwrap().is_none());

        assert!(backend.exists(b"key1").unwrap());
        assert!(!backend.exists(b"nonexistent").unwrap());

        backend.delete(b"key1").unwrap();
        assert!(!backend.exists(b"key1").unwrap());
    }

    pub(crate) fn check_batch_applies_in_order<B: KvBackend>(backend: &B) {
        backend.put(b"stale", b"old").unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(b"stale".to_vec());
        batch.put(b"stale".to_vec(), b"new".to_vec());
        batch.put(b"fresh".to_vec(), b"1".to_vec());
        batch.delete(b"missing".to_vec());
        assert_eq!(batch.len(), 4);

        backend.write_batch(batch).unwrap();

        assert_eq!(backend.get(b"stale").unwrap(), Some(b"new".to_vec()));
        assert_eq!(backend.get(b"fresh").unwrap(), Some(b"1".to_vec()));
    }

    pub(crate) fn check_prefix_order<B: KvBackend>(backend: &B) {
        backend.put(&[0x03, 0, 2], b"c").unwrap();
        backend.put(&[0x03, 0, 0], b"a").unwrap();
        backend.put(&[0x03, 0, 1], b"b").unwrap();
        backend.put(&[0x04, 0, 0], b"x").unwrap();
        backend.put(&[0x02, 9, 9], b"y").unwrap();

        let items: Vec<_> = backend.prefix_iterator(&[0x03]).unwrap().collect();
        let values: Vec<&[u8]> = items.iter().map(|(_, v)| v.as_slice()).collect();
        assert_eq!(values, vec![&b"a"[..], b"b", b"c"]);
    }

    #[test]
    fn test_memory_backend_contract() {
        check_basic(&MemoryBackend::new());
        check_batch_applies_in_order(&MemoryBackend::new());
        check_prefix_order(&MemoryBackend::new());
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let backend = MemoryBackend::new();
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        backend.write_batch(batch).unwrap();
        assert!(backend.is_empty());
    }
}
