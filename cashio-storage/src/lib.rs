//! # Cash.io Storage
//!
//! Persistent storage for the Cash.io commitment indexer and artifact store.
//!
//! This crate provides:
//! - Key-value backends (RocksDB and in-memory) with atomic batch writes
//! - An incremental Merkle commitment tree with cached inclusion proofs,
//!   root history and a known-root index
//! - A content-addressed, sharded, optionally encrypted blob store
//! - A proof assembler that joins tree proofs with stored artifacts
//!
//! ## Architecture
//!
//! The tree and the blob store share one backend but use disjoint key
//! prefixes (see [`keys`]). Every mutation is a single [`kv::WriteBatch`],
//! so a reader never observes half of an insert, store or delete.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod assembler;
pub mod blob;
pub mod error;
pub mod keys;
pub mod kv;
pub mod tree;

pub use assembler::{ProofAssembler, ProofBundle};
pub use blob::{BlobStore, StoreOptions};
pub use error::{StorageError, StorageResult};
pub use keys::KeyPrefix;
pub use kv::{KvBackend, MemoryBackend, RocksBackend, WriteBatch};
pub use tree::{CommitmentTree, InsertResult, TreeConfig, TreeSnapshot};
