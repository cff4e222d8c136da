//! Key schema encoding for storage.
//!
//! Every record lives under a one-byte prefix so the indexer and the blob
//! store occupy disjoint namespaces and each record family can be scanned
//! with a single prefix iteration. Integers are big-endian so that
//! iteration order matches numeric order.

use cashio_core::{Cid, Commitment, Hash};

/// Key prefixes for the different record families.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyPrefix {
    /// Tree metadata (depth, root, next index): `0x01`
    TreeMeta = 0x01,
    /// Filled subtree / completion marker: `0x02 || level`
    FilledSubtree = 0x02,
    /// Leaf record: `0x03 || leaf_index`
    Leaf = 0x03,
    /// Leaf index by commitment: `0x04 || commitment`
    LeafByCommitment = 0x04,
    /// Cached proof: `0x05 || leaf_index`
    Proof = 0x05,
    /// Root by insertion sequence: `0x06 || seq`
    RootHistory = 0x06,
    /// Sequence by root: `0x07 || root`
    KnownRoot = 0x07,
    /// Shard bytes: `0x20 || location`
    BlobShard = 0x20,
    /// Shard metadata: `0x21 || location`
    BlobMeta = 0x21,
    /// Secondary index: `0x22 || prefix || cid || rollup || epoch || shard`
    BlobPrefixIndex = 0x22,
    /// Artifact link: `0x23 || commitment`
    BlobCommitmentLink = 0x23,
}

fn prefixed(prefix: KeyPrefix, capacity: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + capacity);
    key.push(prefix as u8);
    key
}

/// Create the tree metadata key.
pub fn tree_meta_key() -> Vec<u8> {
    vec![KeyPrefix::TreeMeta as u8]
}

/// Create a filled-subtree key for `level`.
pub fn filled_subtree_key(level: u8) -> Vec<u8> {
    vec![KeyPrefix::FilledSubtree as u8, level]
}

/// Create a leaf-record key.
pub fn leaf_key(leaf_index: u64) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::Leaf, 8);
    key.extend_from_slice(&leaf_index.to_be_bytes());
    key
}

/// Create a leaf-by-commitment key.
pub fn leaf_by_commitment_key(commitment: &Commitment) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::LeafByCommitment, 32);
    key.extend_from_slice(commitment.as_bytes());
    key
}

/// Create a cached-proof key.
pub fn proof_key(leaf_index: u64) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::Proof, 8);
    key.extend_from_slice(&leaf_index.to_be_bytes());
    key
}

/// Create a root-history key.
pub fn root_history_key(seq: u64) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::RootHistory, 8);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Create a known-root key.
pub fn known_root_key(root: &Hash) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::KnownRoot, 32);
    key.extend_from_slice(root);
    key
}

/// Physical position of one shard: `(rollup_id, epoch, prefix, cid, shard)`.
///
/// The rollup id is length-prefixed so that a scan on one rollup never
/// matches another rollup whose id it is a prefix of.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShardLocation<'a> {
    /// Rollup id, 1 to 255 bytes.
    pub rollup_id: &'a str,
    /// Epoch within the rollup.
    pub epoch: u64,
    /// Content address.
    pub cid: &'a Cid,
    /// Shard position.
    pub shard_index: u32,
}

impl<'a> ShardLocation<'a> {
    fn write_group(rollup_id: &str, epoch: u64, key: &mut Vec<u8>) {
        key.push(rollup_id.len() as u8);
        key.extend_from_slice(rollup_id.as_bytes());
        key.extend_from_slice(&epoch.to_be_bytes());
    }

    fn write_cid(cid: &Cid, key: &mut Vec<u8>) {
        key.extend_from_slice(&cid.as_bytes()[..4]);
        key.extend_from_slice(cid.as_bytes());
    }

    fn encode(&self, prefix: KeyPrefix) -> Vec<u8> {
        let mut key = prefixed(prefix, 1 + self.rollup_id.len() + 8 + 36 + 4);
        Self::write_group(self.rollup_id, self.epoch, &mut key);
        Self::write_cid(self.cid, &mut key);
        key.extend_from_slice(&self.shard_index.to_be_bytes());
        key
    }

    /// Key holding the shard bytes.
    pub fn shard_key(&self) -> Vec<u8> {
        self.encode(KeyPrefix::BlobShard)
    }

    /// Key holding the shard metadata.
    pub fn meta_key(&self) -> Vec<u8> {
        self.encode(KeyPrefix::BlobMeta)
    }

    /// Secondary index key, ordered by cid first.
    pub fn index_key(&self) -> Vec<u8> {
        let mut key = blob_index_prefix(self.cid);
        Self::write_group(self.rollup_id, self.epoch, &mut key);
        key.extend_from_slice(&self.shard_index.to_be_bytes());
        key
    }
}

/// Prefix of every metadata record.
pub fn blob_meta_prefix() -> Vec<u8> {
    vec![KeyPrefix::BlobMeta as u8]
}

/// Prefix of the metadata records stored at `(rollup_id, epoch)`.
pub fn blob_meta_epoch_prefix(rollup_id: &str, epoch: u64) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::BlobMeta, 1 + rollup_id.len() + 8);
    ShardLocation::write_group(rollup_id, epoch, &mut key);
    key
}

/// Prefix of the metadata records for one cid at `(rollup_id, epoch)`.
pub fn blob_meta_cid_prefix(rollup_id: &str, epoch: u64, cid: &Cid) -> Vec<u8> {
    let mut key = blob_meta_epoch_prefix(rollup_id, epoch);
    ShardLocation::write_cid(cid, &mut key);
    key
}

/// Prefix of the secondary index entries for one cid.
pub fn blob_index_prefix(cid: &Cid) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::BlobPrefixIndex, 36);
    ShardLocation::write_cid(cid, &mut key);
    key
}

/// Create an artifact-link key.
pub fn blob_link_key(commitment: &Commitment) -> Vec<u8> {
    let mut key = prefixed(KeyPrefix::BlobCommitmentLink, 32);
    key.extend_from_slice(commitment.as_bytes());
    key
}
