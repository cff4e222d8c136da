//! # Cash.io Core
//!
//! Shared primitives for the Cash.io commitment indexer and artifact store.
//!
//! This crate provides the foundation for `cashio-storage` and `cashio-node`:
//! - Scalar field checks for commitments (BN254 modulus, 256-bit arithmetic)
//! - SHA-256 hashing, content addressing and the `NodeHasher` seam
//! - AES-256-GCM sealing of artifacts with Argon2id key derivation
//! - Merkle proofs with storage-free verification
//! - Typed deposit/withdraw/transfer proof inputs
//! - Deterministic binary serialization

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crypto;
pub mod error;
pub mod field;
pub mod serialization;
pub mod types;

// Re-export commonly used types at crate root
pub use crypto::{content_hash, BlobCipher, NodeHasher, Sha256Hasher};
pub use error::{CommitmentError, CoreError, CryptoError, InputError, SerializationError};
pub use types::{
    Blob, BlobMetadata, BlobStats, Cid, Commitment, CommitmentLeaf, Hash, MerkleProof,
    ProofInputPackage, ProofInputs, ShardConfig,
};
