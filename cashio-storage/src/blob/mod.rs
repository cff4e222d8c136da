//! Content-addressed, sharded, optionally encrypted blob store.
//!
//! A blob is addressed by the SHA-256 of its plaintext, so the same content
//! has the same cid whether or not it was encrypted and under whichever key.
//! The stored stream (plaintext, or `nonce || ciphertext || tag`) is split
//! into exactly `shard_count` shards and written under
//! `(rollup_id, epoch, commitment_prefix, cid, shard_index)` together with
//! one metadata record and one secondary-index entry per shard.
//!
//! The same content stored at two `(rollup_id, epoch)` locations occupies
//! two independent copies. `retrieve` reads the first location in key
//! order; `delete` removes every copy.

mod locks;
pub mod shard;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cashio_core::crypto::cipher::SEALED_OVERHEAD;
use cashio_core::serialization::{deserialize, serialize};
use cashio_core::{content_hash, Blob, BlobCipher, BlobMetadata, BlobStats, Cid, Commitment, ShardConfig};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::keys::{
    blob_index_prefix, blob_link_key, blob_meta_cid_prefix, blob_meta_epoch_prefix,
    blob_meta_prefix, ShardLocation,
};
use crate::kv::{KvBackend, WriteBatch};
use locks::CidLocks;

/// Longest accepted rollup id, in bytes.
pub const MAX_ROLLUP_ID_LEN: usize = 255;

/// Where and how to store a blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Rollup the artifact belongs to.
    pub rollup_id: String,
    /// Epoch within the rollup.
    pub epoch: u64,
    /// Seal the content before sharding. Defaults to `true`.
    pub encrypt: bool,
    /// Commitment to link the artifact to.
    pub commitment: Option<Commitment>,
}

impl StoreOptions {
    /// Encrypted, unlinked storage at `(rollup_id, epoch)`.
    pub fn new(rollup_id: impl Into<String>, epoch: u64) -> Self {
        Self {
            rollup_id: rollup_id.into(),
            epoch,
            encrypt: true,
            commitment: None,
        }
    }

    /// Set whether the content is encrypted.
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Link the artifact to `commitment`.
    pub fn link(mut self, commitment: Commitment) -> Self {
        self.commitment = Some(commitment);
        self
    }
}

fn validate_rollup_id(rollup_id: &str) -> StorageResult<()> {
    if rollup_id.is_empty() || rollup_id.len() > MAX_ROLLUP_ID_LEN {
        return Err(StorageError::InvalidRollupId(rollup_id.to_string()));
    }
    Ok(())
}

fn location(meta: &BlobMetadata) -> ShardLocation<'_> {
    ShardLocation {
        rollup_id: &meta.rollup_id,
        epoch: meta.epoch,
        cid: &meta.cid,
        shard_index: meta.shard_index,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Sharded blob store over a key-value backend.
pub struct BlobStore<B: KvBackend> {
    backend: Arc<B>,
    cipher: BlobCipher,
    config: ShardConfig,
    locks: CidLocks,
}

impl<B: KvBackend> BlobStore<B> {
    /// Create a blob store.
    pub fn new(backend: Arc<B>, cipher: BlobCipher, config: ShardConfig) -> Self {
        if cipher.is_ephemeral() {
            warn!("blob store uses an ephemeral key; encrypted blobs will be unreadable after restart");
        }
        let config = ShardConfig {
            shard_count: config.shard_count.max(1),
            ..config
        };
        info!(
            shard_count = config.shard_count,
            max_blob_size = config.max_blob_size,
            "blob store ready"
        );
        Self {
            backend,
            cipher,
            config,
            locks: CidLocks::new(),
        }
    }

    /// Get the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Active shard configuration.
    pub fn config(&self) -> &ShardConfig {
        &self.config
    }

    /// Store `content`, returning one metadata record per shard.
    ///
    /// Storing the same content again at the same location replaces the
    /// earlier copy.
    pub fn store(&self, content: &[u8], options: &StoreOptions) -> StorageResult<Vec<BlobMetadata>> {
        validate_rollup_id(&options.rollup_id)?;
        if content.len() > self.config.max_blob_size {
            return Err(StorageError::BlobTooLarge {
                size: content.len(),
                max: self.config.max_blob_size,
            });
        }

        let cid = content_hash(content);
        // Relinking also holds the stripe of the cid the link pointed to,
        // so a concurrent delete of that cid cannot drop the new link.
        let _guards = loop {
            let prior = match &options.commitment {
                Some(commitment) => self.cid_for_commitment(commitment)?,
                None => None,
            };
            let guards = self.locks.lock_pair(&cid, prior.as_ref());
            let current = match &options.commitment {
                Some(commitment) => self.cid_for_commitment(commitment)?,
                None => None,
            };
            if current == prior {
                break guards;
            }
        };

        let stored: Cow<'_, [u8]> = if options.encrypt {
            Cow::Owned(self.cipher.seal(content)?)
        } else {
            Cow::Borrowed(content)
        };

        let mut batch = WriteBatch::new();
        let mut linked_commitment = options.commitment;

        let previous = blob_meta_cid_prefix(&options.rollup_id, options.epoch, &cid);
        for (meta_key, bytes) in self.backend.prefix_iterator(&previous)? {
            let old: BlobMetadata = deserialize(&bytes)?;
            linked_commitment = linked_commitment.or(old.linked_commitment);
            let loc = location(&old);
            batch.delete(loc.shard_key());
            batch.delete(loc.index_key());
            batch.delete(meta_key);
        }

        let shards = shard::split(&stored, self.config.shard_count);
        let total_shards = shards.len() as u32;
        let created_at = unix_now();
        let commitment_prefix = cid.commitment_prefix();

        let mut metadata = Vec::with_capacity(shards.len());
        for (shard_index, shard) in (0u32..).zip(&shards) {
            let loc = ShardLocation {
                rollup_id: &options.rollup_id,
                epoch: options.epoch,
                cid: &cid,
                shard_index,
            };
            let meta = BlobMetadata {
                cid,
                rollup_id: options.rollup_id.clone(),
                epoch: options.epoch,
                commitment_prefix: commitment_prefix.clone(),
                size: shard.len() as u64,
                created_at,
                encrypted: options.encrypt,
                shard_index,
                total_shards,
                linked_commitment,
            };

            let meta_key = loc.meta_key();
            batch.put(loc.shard_key(), shard.to_vec());
            batch.put(loc.index_key(), meta_key.clone());
            batch.put(meta_key, serialize(&meta)?);
            metadata.push(meta);
        }

        if let Some(commitment) = &options.commitment {
            batch.put(blob_link_key(commitment), cid.as_bytes().to_vec());
        }

        self.backend.write_batch(batch)?;

        debug!(
            cid = %cid,
            rollup_id = %options.rollup_id,
            epoch = options.epoch,
            size = content.len(),
            encrypted = options.encrypt,
            total_shards,
            "blob stored"
        );

        Ok(metadata)
    }

    /// Reassemble and decrypt the blob with `cid`.
    pub fn retrieve(&self, cid: &Cid) -> StorageResult<Option<Blob>> {
        let _guard = self.locks.lock(cid);

        let mut metas: Vec<BlobMetadata> = Vec::new();
        for (_, meta_key) in self.backend.prefix_iterator(&blob_index_prefix(cid))? {
            let bytes = self.backend.get(&meta_key)?.ok_or_else(|| {
                StorageError::Corruption(format!("index entry for {} has no metadata", cid))
            })?;
            let meta: BlobMetadata = deserialize(&bytes)?;

            // Index entries are grouped by location; stop at the second one.
            if let Some(first) = metas.first() {
                if first.rollup_id != meta.rollup_id || first.epoch != meta.epoch {
                    break;
                }
            }
            metas.push(meta);
        }

        if metas.is_empty() {
            return Ok(None);
        }
        self.assemble(cid, metas).map(Some)
    }

    /// Every blob stored at `(rollup_id, epoch)`, each read once.
    pub fn retrieve_by_epoch(&self, rollup_id: &str, epoch: u64) -> StorageResult<Vec<Blob>> {
        let mut cids: Vec<Cid> = Vec::new();
        for meta in self.list_by_epoch(rollup_id, epoch)? {
            if cids.last() != Some(&meta.cid) {
                cids.push(meta.cid);
            }
        }

        let mut blobs = Vec::with_capacity(cids.len());
        for cid in cids {
            let _guard = self.locks.lock(&cid);
            // Re-read under the lock; a concurrent delete may have won.
            let metas = self.metadata_at(&blob_meta_cid_prefix(rollup_id, epoch, &cid))?;
            if metas.is_empty() {
                continue;
            }
            blobs.push(self.assemble(&cid, metas)?);
        }
        Ok(blobs)
    }

    /// Shard metadata stored at `(rollup_id, epoch)`, ordered by cid and
    /// shard index.
    pub fn list_by_epoch(&self, rollup_id: &str, epoch: u64) -> StorageResult<Vec<BlobMetadata>> {
        validate_rollup_id(rollup_id)?;
        self.metadata_at(&blob_meta_epoch_prefix(rollup_id, epoch))
    }

    fn metadata_at(&self, prefix: &[u8]) -> StorageResult<Vec<BlobMetadata>> {
        self.backend
            .prefix_iterator(prefix)?
            .map(|(_, bytes)| deserialize(&bytes).map_err(StorageError::from))
            .collect()
    }

    fn assemble(&self, cid: &Cid, mut metas: Vec<BlobMetadata>) -> StorageResult<Blob> {
        metas.sort_by_key(|m| m.shard_index);
        let head = match metas.first() {
            Some(head) => head.clone(),
            None => return Err(StorageError::NotFound(cid.to_string())),
        };

        let total = head.total_shards;
        for expected in 0..total {
            if metas.get(expected as usize).map(|m| m.shard_index) != Some(expected) {
                return Err(StorageError::Corruption(format!(
                    "blob {} is missing shard {} of {}",
                    cid, expected, total
                )));
            }
        }
        if metas.len() != total as usize
            || metas
                .iter()
                .any(|m| m.total_shards != total || m.encrypted != head.encrypted || m.cid != *cid)
        {
            return Err(StorageError::Corruption(format!(
                "blob {} has inconsistent shard metadata",
                cid
            )));
        }

        let stored_size: u64 = metas.iter().map(|m| m.size).sum();
        let limit = self.config.max_blob_size + SEALED_OVERHEAD;
        if stored_size > limit as u64 {
            return Err(StorageError::BlobTooLarge {
                size: stored_size as usize,
                max: limit,
            });
        }

        let mut stream = Vec::with_capacity(stored_size as usize);
        for meta in &metas {
            let shard = self.backend.get(&location(meta).shard_key())?.ok_or_else(|| {
                StorageError::Corruption(format!(
                    "blob {} shard {} has metadata but no data",
                    cid, meta.shard_index
                ))
            })?;
            if shard.len() as u64 != meta.size {
                return Err(StorageError::Corruption(format!(
                    "blob {} shard {} is {} bytes, expected {}",
                    cid,
                    meta.shard_index,
                    shard.len(),
                    meta.size
                )));
            }
            stream.extend_from_slice(&shard);
        }

        let data = if head.encrypted {
            self.cipher.open(&stream)?
        } else {
            stream
        };
        if content_hash(&data) != *cid {
            return Err(StorageError::Integrity(format!(
                "content of blob {} does not hash to its cid",
                cid
            )));
        }

        Ok(Blob {
            cid: *cid,
            rollup_id: head.rollup_id,
            epoch: head.epoch,
            encrypted: head.encrypted,
            created_at: head.created_at,
            total_shards: total,
            linked_commitment: head.linked_commitment,
            data,
        })
    }

    /// Cid of the artifact linked to `commitment`.
    pub fn cid_for_commitment(&self, commitment: &Commitment) -> StorageResult<Option<Cid>> {
        match self.backend.get(&blob_link_key(commitment))? {
            Some(bytes) => {
                let digest: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::Corruption(format!("link for {} is not a cid", commitment))
                })?;
                Ok(Some(Cid::from_bytes(digest)))
            }
            None => Ok(None),
        }
    }

    /// Point the link for `commitment` at `cid`, or remove it.
    pub fn set_link(&self, commitment: &Commitment, cid: Option<&Cid>) -> StorageResult<()> {
        let key = blob_link_key(commitment);
        match cid {
            Some(cid) => {
                let _guard = self.locks.lock(cid);
                self.backend.put(&key, cid.as_bytes())
            }
            None => self.backend.delete(&key),
        }
    }

    /// Whether a copy of `cid` is stored at `(rollup_id, epoch)`.
    pub fn contains_at(&self, cid: &Cid, rollup_id: &str, epoch: u64) -> StorageResult<bool> {
        validate_rollup_id(rollup_id)?;
        Ok(self
            .backend
            .prefix_iterator(&blob_meta_cid_prefix(rollup_id, epoch, cid))?
            .next()
            .is_some())
    }

    /// Remove the copy of `cid` stored at `(rollup_id, epoch)`.
    ///
    /// Links to `cid` are removed only when no other copy remains.
    pub fn delete_at(&self, cid: &Cid, rollup_id: &str, epoch: u64) -> StorageResult<bool> {
        validate_rollup_id(rollup_id)?;
        let _guard = self.locks.lock(cid);

        let metas = self.metadata_at(&blob_meta_cid_prefix(rollup_id, epoch, cid))?;
        if metas.is_empty() {
            return Ok(false);
        }

        let mut batch = WriteBatch::new();
        let mut links = HashSet::new();
        for meta in &metas {
            let loc = location(meta);
            batch.delete(loc.shard_key());
            batch.delete(loc.index_key());
            batch.delete(loc.meta_key());
            links.extend(meta.linked_commitment);
        }

        let copies = self.backend.prefix_iterator(&blob_index_prefix(cid))?.count();
        if copies <= metas.len() {
            for commitment in links {
                if self.cid_for_commitment(&commitment)? == Some(*cid) {
                    batch.delete(blob_link_key(&commitment));
                }
            }
        }

        self.backend.write_batch(batch)?;
        info!(cid = %cid, rollup_id, epoch, shards = metas.len(), "blob copy deleted");
        Ok(true)
    }

    /// Remove every copy of `cid` and any links to it in one batch.
    ///
    /// Returns whether anything was removed.
    pub fn delete(&self, cid: &Cid) -> StorageResult<bool> {
        let _guard = self.locks.lock(cid);

        let mut batch = WriteBatch::new();
        let mut links = HashSet::new();
        let mut shards = 0usize;
        for (index_key, meta_key) in self.backend.prefix_iterator(&blob_index_prefix(cid))? {
            if let Some(bytes) = self.backend.get(&meta_key)? {
                let meta: BlobMetadata = deserialize(&bytes)?;
                batch.delete(location(&meta).shard_key());
                if let Some(commitment) = meta.linked_commitment {
                    links.insert(commitment);
                }
                shards += 1;
            }
            batch.delete(meta_key);
            batch.delete(index_key);
        }

        for commitment in links {
            if self.cid_for_commitment(&commitment)? == Some(*cid) {
                batch.delete(blob_link_key(&commitment));
            }
        }

        if batch.is_empty() {
            return Ok(false);
        }
        self.backend.write_batch(batch)?;
        info!(cid = %cid, shards, "blob deleted");
        Ok(true)
    }

    /// Counts over every stored shard, in one metadata scan.
    pub fn stats(&self) -> StorageResult<BlobStats> {
        let mut cids = HashSet::new();
        let mut total_size = 0u64;
        let mut by_rollup: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_epoch: BTreeMap<u64, u64> = BTreeMap::new();

        for (_, bytes) in self.backend.prefix_iterator(&blob_meta_prefix())? {
            let meta: BlobMetadata = deserialize(&bytes)?;
            cids.insert(meta.cid);
            total_size += meta.size;
            *by_rollup.entry(meta.rollup_id).or_default() += meta.size;
            *by_epoch.entry(meta.epoch).or_default() += meta.size;
        }

        Ok(BlobStats {
            total_blobs: cids.len() as u64,
            total_size,
            by_rollup,
            by_epoch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPrefix;
    use crate::kv::MemoryBackend;
    use cashio_core::crypto::cipher::{NONCE_SIZE, TAG_SIZE};

    fn store_with(shard_count: u32) -> BlobStore<MemoryBackend> {
        BlobStore::new(
            Arc::new(MemoryBackend::new()),
            BlobCipher::from_key([7u8; 32]),
            ShardConfig::with_shard_count(shard_count),
        )
    }

    fn plain(rollup: &str, epoch: u64) -> StoreOptions {
        StoreOptions::new(rollup, epoch).encrypt(false)
    }

    #[test]
    fn test_forty_bytes_into_sixteen_shards() {
        let store = store_with(16);
        let content: Vec<u8> = (0..40).collect();

        let metas = store.store(&content, &plain("r", 1)).unwrap();
        assert_eq!(metas.len(), 16);
        assert!(metas.iter().all(|m| m.total_shards == 16 && m.size <= 3));
        assert_eq!(metas.iter().filter(|m| m.size == 0).count(), 2);

        let blob = store.retrieve(&metas[0].cid).unwrap().unwrap();
        assert_eq!(blob.data, content);
        assert_eq!(blob.total_shards, 16);
    }

    #[test]
    fn test_encrypted_stream_carries_nonce_and_tag() {
        let store = store_with(16);
        let content = vec![0x42u8; 40];
        let metas = store.store(&content, &StoreOptions::new("r", 1)).unwrap();

        let stored: u64 = metas.iter().map(|m| m.size).sum();
        assert_eq!(stored as usize, 40 + NONCE_SIZE + TAG_SIZE);
        assert!(metas.iter().all(|m| m.encrypted));
        assert_eq!(store.retrieve(&metas[0].cid).unwrap().unwrap().data, content);
    }

    #[test]
    fn test_round_trip_sizes() {
        let store = store_with(16);
        let big: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        for content in [Vec::new(), vec![1u8], big] {
            for encrypt in [true, false] {
                let options = StoreOptions::new("sizes", 0).encrypt(encrypt);
                let metas = store.store(&content, &options).unwrap();
                assert_eq!(metas.len(), 16);
                let blob = store.retrieve(&metas[0].cid).unwrap().unwrap();
                assert_eq!(blob.data, content);
                assert_eq!(blob.encrypted, encrypt);
            }
        }
    }

    #[test]
    fn test_cid_and_prefix() {
        let store = store_with(4);
        let metas = store.store(b"hello", &plain("r", 0)).unwrap();
        let cid = content_hash(b"hello");
        assert!(metas.iter().all(|m| m.cid == cid));
        assert_eq!(metas[0].commitment_prefix, cid.to_hex()[..8]);
    }

    #[test]
    fn test_dedup_same_cid() {
        let store = store_with(4);
        let a = store.store(b"same", &StoreOptions::new("r1", 0)).unwrap();
        let b = store.store(b"same", &StoreOptions::new("r1", 0)).unwrap();
        let c = store.store(b"same", &plain("r2", 9)).unwrap();
        assert_eq!(a[0].cid, b[0].cid);
        assert_eq!(a[0].cid, c[0].cid);

        // Restoring at the same location replaces rather than duplicates.
        assert_eq!(store.list_by_epoch("r1", 0).unwrap().len(), 4);
        assert_eq!(store.stats().unwrap().total_blobs, 1);
    }

    #[test]
    fn test_restore_with_fewer_shards_drops_old_records() {
        let backend = Arc::new(MemoryBackend::new());
        let cipher = BlobCipher::from_key([1u8; 32]);
        let wide = BlobStore::new(backend.clone(), cipher.clone(), ShardConfig::with_shard_count(8));
        wide.store(b"content", &plain("r", 0)).unwrap();

        let narrow = BlobStore::new(backend.clone(), cipher, ShardConfig::with_shard_count(2));
        narrow.store(b"content", &plain("r", 0)).unwrap();

        assert_eq!(backend.count_prefix(&[KeyPrefix::BlobShard as u8]), 2);
        assert_eq!(backend.count_prefix(&[KeyPrefix::BlobPrefixIndex as u8]), 2);
        assert_eq!(narrow.retrieve(&content_hash(b"content")).unwrap().unwrap().data, b"content");
    }

    #[test]
    fn test_tamper_detection() {
        let backend = Arc::new(MemoryBackend::new());
        let store = BlobStore::new(
            backend.clone(),
            BlobCipher::from_key([3u8; 32]),
            ShardConfig::with_shard_count(4),
        );
        let content = vec![0x11u8; 100];
        let metas = store.store(&content, &StoreOptions::new("r", 0)).unwrap();

        for meta in &metas {
            let key = location(meta).shard_key();
            let original = backend.get(&key).unwrap().unwrap();
            for byte in 0..original.len() {
                for bit in 0..8 {
                    let mut tampered = original.clone();
                    tampered[byte] ^= 1 << bit;
                    backend.put(&key, &tampered).unwrap();
                    let err = store.retrieve(&metas[0].cid).unwrap_err();
                    assert!(matches!(err, StorageError::Integrity(_)), "{:?}", err);
                }
            }
            backend.put(&key, &original).unwrap();
        }
        assert_eq!(store.retrieve(&metas[0].cid).unwrap().unwrap().data, content);
    }

    #[test]
    fn test_plaintext_tamper_detected_by_cid() {
        let backend = Arc::new(MemoryBackend::new());
        let store = BlobStore::new(backend.clone(), BlobCipher::ephemeral(), ShardConfig::with_shard_count(2));
        let metas = store.store(b"plain text", &plain("r", 0)).unwrap();

        let key = location(&metas[1]).shard_key();
        let mut shard = backend.get(&key).unwrap().unwrap();
        shard[0] ^= 0x01;
        backend.put(&key, &shard).unwrap();

        assert!(matches!(store.retrieve(&metas[0].cid), Err(StorageError::Integrity(_))));
    }

    #[test]
    fn test_missing_shard_is_corruption() {
        let backend = Arc::new(MemoryBackend::new());
        let store = BlobStore::new(backend.clone(), BlobCipher::ephemeral(), ShardConfig::with_shard_count(4));
        let metas = store.store(b"0123456789", &plain("r", 0)).unwrap();

        backend.delete(&location(&metas[2]).meta_key()).unwrap();
        backend.delete(&location(&metas[2]).index_key()).unwrap();
        assert!(matches!(store.retrieve(&metas[0].cid), Err(StorageError::Corruption(_))));

        let store2 = BlobStore::new(backend.clone(), BlobCipher::ephemeral(), ShardConfig::with_shard_count(4));
        let metas = store2.store(b"other content", &plain("r", 0)).unwrap();
        backend.delete(&location(&metas[0]).shard_key()).unwrap();
        assert!(matches!(store2.retrieve(&metas[0].cid), Err(StorageError::Corruption(_))));
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = BlobStore::new(backend.clone(), BlobCipher::from_key([1; 32]), ShardConfig::default());
        let metas = writer.store(b"secret witness", &StoreOptions::new("r", 0)).unwrap();

        let reader = BlobStore::new(backend, BlobCipher::from_key([2; 32]), ShardConfig::default());
        assert!(matches!(reader.retrieve(&metas[0].cid), Err(StorageError::Integrity(_))));
    }

    #[test]
    fn test_retrieve_missing_is_none() {
        let store = store_with(4);
        assert!(store.retrieve(&Cid::from_bytes([9; 32])).unwrap().is_none());
    }

    #[test]
    fn test_retrieve_by_epoch_groups_by_cid() {
        let store = store_with(4);
        store.store(b"one", &plain("r", 1)).unwrap();
        store.store(b"two", &StoreOptions::new("r", 1)).unwrap();
        store.store(b"three", &plain("r", 2)).unwrap();
        store.store(b"four", &plain("rr", 1)).unwrap();

        let mut blobs: Vec<Vec<u8>> = store
            .retrieve_by_epoch("r", 1)
            .unwrap()
            .into_iter()
            .map(|b| b.data)
            .collect();
        blobs.sort();
        assert_eq!(blobs, vec![b"one".to_vec(), b"two".to_vec()]);
        assert!(store.retrieve_by_epoch("r", 3).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_every_copy_and_link() {
        let backend = Arc::new(MemoryBackend::new());
        let store = BlobStore::new(backend.clone(), BlobCipher::ephemeral(), ShardConfig::with_shard_count(4));
        let commitment = Commitment::hash_to_field(b"note");

        let metas = store
            .store(b"artifact", &StoreOptions::new("r", 0).link(commitment))
            .unwrap();
        store.store(b"artifact", &plain("r", 5)).unwrap();
        store.store(b"keep me", &plain("r", 0)).unwrap();
        let cid = metas[0].cid;
        assert_eq!(store.cid_for_commitment(&commitment).unwrap(), Some(cid));

        assert!(store.delete(&cid).unwrap());
        assert!(store.retrieve(&cid).unwrap().is_none());
        assert!(store.cid_for_commitment(&commitment).unwrap().is_none());
        assert!(!store.delete(&cid).unwrap());

        // Only the other blob's records remain.
        assert_eq!(backend.count_prefix(&[KeyPrefix::BlobShard as u8]), 4);
        assert_eq!(backend.count_prefix(&[KeyPrefix::BlobMeta as u8]), 4);
        assert_eq!(backend.count_prefix(&[KeyPrefix::BlobPrefixIndex as u8]), 4);
        assert_eq!(
            store.retrieve(&content_hash(b"keep me")).unwrap().unwrap().data,
            b"keep me"
        );
    }

    #[test]
    fn test_stats() {
        let store = store_with(4);
        store.store(&[1u8; 10], &plain("a", 1)).unwrap();
        store.store(&[1u8; 10], &plain("b", 2)).unwrap();
        store.store(&[2u8; 6], &StoreOptions::new("a", 2)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_blobs, 2);
        let sealed = (6 + NONCE_SIZE + TAG_SIZE) as u64;
        assert_eq!(stats.total_size, 10 + 10 + sealed);
        assert_eq!(stats.by_rollup["a"], 10 + sealed);
        assert_eq!(stats.by_rollup["b"], 10);
        assert_eq!(stats.by_epoch[&1], 10);
        assert_eq!(stats.by_epoch[&2], 10 + sealed);
    }

    #[test]
    fn test_limits() {
        let store = BlobStore::new(
            Arc::new(MemoryBackend::new()),
            BlobCipher::ephemeral(),
            ShardConfig {
                max_blob_size: 8,
                ..ShardConfig::default()
            },
        );
        assert!(matches!(
            store.store(&[0u8; 9], &plain("r", 0)),
            Err(StorageError::BlobTooLarge { size: 9, max: 8 })
        ));
        assert!(store.store(&[0u8; 8], &StoreOptions::new("r", 0)).is_ok());

        assert!(matches!(
            store.store(b"x", &plain("", 0)),
            Err(StorageError::InvalidRollupId(_))
        ));
        let long = "x".repeat(256);
        assert!(matches!(
            store.store(b"x", &plain(&long, 0)),
            Err(StorageError::InvalidRollupId(_))
        ));
    }

    #[test]
    fn test_delete_at_removes_one_copy() {
        let store = store_with(2);
        let commitment = Commitment::hash_to_field(b"note");
        let cid = store
            .store(b"artifact", &plain("r", 0).link(commitment))
            .unwrap()[0]
            .cid;
        store.store(b"artifact", &plain("r", 1)).unwrap();

        assert!(store.contains_at(&cid, "r", 0).unwrap());
        assert!(store.delete_at(&cid, "r", 0).unwrap());
        assert!(!store.contains_at(&cid, "r", 0).unwrap());
        assert!(!store.delete_at(&cid, "r", 0).unwrap());

        // Another copy remains, so the link stays.
        assert_eq!(store.retrieve(&cid).unwrap().unwrap().epoch, 1);
        assert_eq!(store.cid_for_commitment(&commitment).unwrap(), Some(cid));

        assert!(store.delete_at(&cid, "r", 1).unwrap());
        assert!(store.retrieve(&cid).unwrap().is_none());
        assert!(store.cid_for_commitment(&commitment).unwrap().is_none());
    }

    #[test]
    fn test_set_link() {
        let store = store_with(2);
        let commitment = Commitment::hash_to_field(b"note");
        let cid = content_hash(b"a");
        store.set_link(&commitment, Some(&cid)).unwrap();
        assert_eq!(store.cid_for_commitment(&commitment).unwrap(), Some(cid));
        store.set_link(&commitment, None).unwrap();
        assert!(store.cid_for_commitment(&commitment).unwrap().is_none());
    }

    #[test]
    fn test_relink_races_delete_of_old_cid() {
        let store = Arc::new(store_with(2));
        for round in 0..50u32 {
            let commitment = Commitment::hash_to_field(&round.to_be_bytes());
            let old = store
                .store(b"old", &plain("r", u64::from(round)).link(commitment))
                .unwrap()[0]
                .cid;
            let new_content = round.to_le_bytes();

            let relink = {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .store(&new_content, &plain("r", u64::from(round)).link(commitment))
                        .unwrap()
                })
            };
            let delete = {
                let store = store.clone();
                std::thread::spawn(move || store.delete(&old).unwrap())
            };
            let new = relink.join().unwrap()[0].cid;
            delete.join().unwrap();

            assert_eq!(store.cid_for_commitment(&commitment).unwrap(), Some(new));
        }
    }
}
