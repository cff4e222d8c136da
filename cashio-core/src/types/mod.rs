//! Core data types.
//!
//! - `Commitment`: validated field element used as a tree leaf
//! - `MerkleProof`: inclusion proof with pure verification
//! - `CommitmentLeaf` and `ProofInputPackage`: indexer records
//! - `ProofInputs`: typed deposit/withdraw/transfer circuit inputs
//! - `Cid`, `BlobMetadata`, `ShardConfig`, `Blob`, `BlobStats`: blob store records

mod blob;
mod commitment;
mod inputs;
mod leaf;
mod proof;

pub use blob::{
    Blob, BlobMetadata, BlobStats, Cid, ShardConfig, COMMITMENT_PREFIX_LEN,
    DEFAULT_MAX_BLOB_SIZE, DEFAULT_SHARD_COUNT,
};
pub use commitment::Commitment;
pub use inputs::{DepositInputs, ProofInputs, TransferInputs, WithdrawInputs};
pub use leaf::{CommitmentLeaf, ProofInputPackage};
pub use proof::{MerkleProof, LEFT, MAX_PROOF_DEPTH, RIGHT};

/// A 32-byte hash.
pub type Hash = [u8; 32];
