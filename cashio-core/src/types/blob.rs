//! Content addresses and blob metadata.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CommitmentError;
use crate::types::Commitment;

/// Number of hex characters in a commitment prefix.
pub const COMMITMENT_PREFIX_LEN: usize = 8;

/// Default number of shards per blob.
pub const DEFAULT_SHARD_COUNT: u32 = 16;

/// Default upper bound on a single blob, in bytes.
pub const DEFAULT_MAX_BLOB_SIZE: usize = 64 * 1024 * 1024;

/// Content address: SHA-256 of the original plaintext.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cid([u8; 32]);

impl Cid {
    /// Wrap a digest.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CommitmentError> {
        let bytes = hex::decode(s).map_err(|e| CommitmentError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CommitmentError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(arr))
    }

    /// The digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex of the full digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, used as a secondary index key.
    pub fn commitment_prefix(&self) -> String {
        hex::encode(&self.0[..COMMITMENT_PREFIX_LEN / 2])
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.to_hex())
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Metadata for one stored shard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Content address of the logical blob.
    pub cid: Cid,
    /// Rollup the artifact belongs to.
    pub rollup_id: String,
    /// Logical batching unit within the rollup.
    pub epoch: u64,
    /// First eight hex characters of `cid`.
    pub commitment_prefix: String,
    /// Bytes stored in this shard (ciphertext bytes when encrypted).
    pub size: u64,
    /// Unix seconds when the blob was stored.
    pub created_at: u64,
    /// Whether the shard stream is AEAD-sealed.
    pub encrypted: bool,
    /// Position of this shard.
    pub shard_index: u32,
    /// Number of shards in the blob.
    pub total_shards: u32,
    /// Commitment this artifact was stored for, if any.
    pub linked_commitment: Option<Commitment>,
}

/// Sharding configuration for a blob store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Shards per blob. Always at least one.
    pub shard_count: u32,
    /// Advisory only; shards are not replicated across nodes.
    pub replication_factor: u32,
    /// Largest blob accepted by `store` or assembled by `retrieve`.
    pub max_blob_size: usize,
}

impl ShardConfig {
    /// Configuration with `shard_count` shards and default limits.
    pub fn with_shard_count(shard_count: u32) -> Self {
        Self {
            shard_count: shard_count.max(1),
            ..Self::default()
        }
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            replication_factor: 1,
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

/// A reassembled, decrypted artifact with its metadata header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    /// Content address.
    pub cid: Cid,
    /// Rollup the copy was read from.
    pub rollup_id: String,
    /// Epoch the copy was read from.
    pub epoch: u64,
    /// Whether the stored form was encrypted.
    pub encrypted: bool,
    /// Unix seconds when the copy was stored.
    pub created_at: u64,
    /// Number of shards the copy was split into.
    pub total_shards: u32,
    /// Commitment the artifact is linked to, if any.
    pub linked_commitment: Option<Commitment>,
    /// Plaintext bytes.
    pub data: Vec<u8>,
}

/// Aggregate counts over every stored shard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStats {
    /// Distinct content addresses.
    pub total_blobs: u64,
    /// Sum of stored shard sizes.
    pub total_size: u64,
    /// Stored bytes per rollup.
    pub by_rollup: BTreeMap<String, u64>,
    /// Stored bytes per epoch.
    pub by_epoch: BTreeMap<u64, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_prefix_is_eight_hex_chars() {
        let cid = Cid::from_bytes([0xAB; 32]);
        assert_eq!(cid.commitment_prefix(), "abababab");
        assert!(cid.to_hex().starts_with(&cid.commitment_prefix()));
    }

    #[test]
    fn test_cid_hex_roundtrip() {
        let cid = Cid::from_bytes([0x12; 32]);
        assert_eq!(Cid::from_hex(&cid.to_hex()).unwrap(), cid);
        assert!(Cid::from_hex("1234").is_err());
    }

    #[test]
    fn test_shard_config_defaults() {
        let config = ShardConfig::default();
        assert_eq!(config.shard_count, 16);
        assert_eq!(config.replication_factor, 1);
        assert_eq!(ShardConfig::with_shard_count(0).shard_count, 1);
    }
}
