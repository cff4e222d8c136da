//! Merkle inclusion proofs for the commitment tree.
//!
//! A proof carries one sibling per tree level, bottom-up, together with the
//! side the running hash sits on at that level. Verification folds the leaf
//! up the path and compares the result to the claimed root. It never
//! touches storage, so it works for any historical root; whether that root
//! was ever produced by the tree is a separate question answered by the
//! indexer's known-root index.

use serde::{Deserialize, Serialize};

use crate::crypto::{NodeHasher, Sha256Hasher};
use crate::serialization::{deserialize, serialize};
use crate::types::{Commitment, Hash};
use crate::SerializationError;

/// Path index value for a node that is the left child.
pub const LEFT: u8 = 0;

/// Path index value for a node that is the right child.
pub const RIGHT: u8 = 1;

/// Deepest tree a proof may describe.
pub const MAX_PROOF_DEPTH: usize = 64;

/// A Merkle inclusion proof for one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Root the proof was produced against.
    pub root: Hash,
    /// The leaf being proven.
    pub leaf: Commitment,
    /// Position of the leaf.
    pub leaf_index: u64,
    /// Sibling hashes, leaf level first.
    pub path_elements: Vec<Hash>,
    /// `LEFT` or `RIGHT` for the running node at each level.
    pub path_indices: Vec<u8>,
}

impl MerkleProof {
    /// Tree depth this proof spans.
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    /// Whether the path is shaped consistently with `leaf_index`.
    ///
    /// Both vectors must have the same length, every index must be 0 or 1,
    /// and the indices must spell out the bits of `leaf_index`.
    pub fn is_well_formed(&self) -> bool {
        let depth = self.path_elements.len();
        if depth == 0 || depth > MAX_PROOF_DEPTH || self.path_indices.len() != depth {
            return false;
        }
        if depth < 64 && self.leaf_index >> depth != 0 {
            return false;
        }
        self.path_indices
            .iter()
            .enumerate()
            .all(|(level, &side)| side <= RIGHT && u64::from(side) == (self.leaf_index >> level) & 1)
    }

    /// Fold the leaf up the path with hasher `H`.
    ///
    /// Returns `None` for a malformed proof.
    pub fn compute_root_with<H: NodeHasher>(&self) -> Option<Hash> {
        if !self.is_well_formed() {
            return None;
        }

        let mut current = self.leaf.to_bytes();
        for (sibling, &side) in self.path_elements.iter().zip(&self.path_indices) {
            current = if side == LEFT {
                H::hash_pair(&current, sibling)
            } else {
                H::hash_pair(sibling, &current)
            };
        }
        Some(current)
    }

    /// Verify the proof with hasher `H`.
    pub fn verify_with<H: NodeHasher>(&self) -> bool {
        self.compute_root_with::<H>() == Some(self.root)
    }

    /// Verify the proof with the default SHA-256 node hasher.
    pub fn verify(&self) -> bool {
        self.verify_with::<Sha256Hasher>()
    }

    /// Serialize the proof to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        serialize(self)
    }

    /// Deserialize a proof from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        deserialize(bytes)
    }
}
