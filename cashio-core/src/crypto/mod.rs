//! Cryptographic primitives for the Cash.io indexer.
//!
//! This module provides:
//! - SHA-256 hashing and content addressing
//! - The `NodeHasher` seam for commitment tree compression
//! - AES-256-GCM sealing of stored artifacts (Argon2id key derivation)

pub mod cipher;
mod hashing;

pub use cipher::BlobCipher;
pub use hashing::{content_hash, sha256, sha256_concat, NodeHasher, Sha256Hasher, CID_HASH};
