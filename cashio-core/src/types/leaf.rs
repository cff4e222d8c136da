//! Leaf records and the proof-input package handed to provers.

use serde::{Deserialize, Serialize};

use crate::types::{Commitment, Hash, MerkleProof};

/// One inserted commitment and where it came from.
///
/// Created when the commitment is appended and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentLeaf {
    /// The leaf value.
    pub commitment: Commitment,
    /// Dense position in the tree, assigned from 0.
    pub leaf_index: u64,
    /// Block in which the deposit was observed.
    pub block_number: u64,
    /// Hash of the transaction that emitted the deposit.
    pub source_tx_hash: Hash,
    /// Logical timestamp supplied by the event source.
    pub inserted_at: u64,
}

/// Everything an external prover needs to show membership of a note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInputPackage {
    /// The note commitment.
    pub commitment: Commitment,
    /// Position of the commitment.
    pub leaf_index: u64,
    /// Proof cached at insertion time.
    pub merkle_proof: MerkleProof,
    /// When the commitment was inserted.
    pub timestamp: u64,
}

impl ProofInputPackage {
    /// Join a leaf record with its cached proof.
    pub fn new(leaf: &CommitmentLeaf, merkle_proof: MerkleProof) -> Self {
        Self {
            commitment: leaf.commitment,
            leaf_index: leaf.leaf_index,
            merkle_proof,
            timestamp: leaf.inserted_at,
        }
    }

    /// Root the package's proof was produced against.
    pub fn root(&self) -> Hash {
        self.merkle_proof.root
    }
}
