//! SHA-256 hashing, tree node compression and content addressing.

use sha2::{Digest, Sha256};

use crate::types::{Cid, Hash};

/// Name of the content-addressing hash. Changing it changes every CID.
pub const CID_HASH: &str = "sha2-256";

/// Compute SHA-256 hash of the input data.
#[inline]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash of concatenated data slices.
///
/// More efficient than allocating a buffer for concatenation.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Content address of `content`: SHA-256 over the plaintext bytes.
pub fn content_hash(content: &[u8]) -> Cid {
    Cid::from_bytes(sha256(content))
}

/// Two-to-one compression function used for commitment tree nodes.
///
/// The tree algorithm only needs a deterministic, collision-resistant
/// 256-bit compression, so a SNARK-friendly permutation can be dropped in
/// here without touching the indexer.
pub trait NodeHasher: Send + Sync + 'static {
    /// Hash a left and right child into their parent.
    fn hash_pair(left: &Hash, right: &Hash) -> Hash;
}

/// `H(left, right) = SHA-256(left || right)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sha256Hasher;

impl NodeHasher for Sha256Hasher {
    #[inline]
    fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        sha256_concat(&[left, right])
    }
}
