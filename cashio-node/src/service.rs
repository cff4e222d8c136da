//! Service facade consumed by the orchestration layer.
//!
//! Callers pass identifiers as hex strings, the way they arrive over the
//! wire, and get typed results back. Every storage error is folded into a
//! [`ServiceError`] so a caller can tell "never inserted" apart from
//! "storage unavailable".

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cashio_core::{
    Blob, BlobCipher, BlobMetadata, BlobStats, Cid, Commitment, Hash, MerkleProof,
    ProofInputPackage, ShardConfig,
};
use cashio_storage::{
    BlobStore, CommitmentTree, KvBackend, ProofAssembler, ProofBundle, StorageError,
    StorageResult, StoreOptions, TreeConfig, TreeSnapshot,
};

/// Errors surfaced to service callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request is malformed or exceeds a limit.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Storage failed; the request may succeed later.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// JSON-RPC style error code.
    pub fn code(&self) -> i32 {
        match self {
            ServiceError::NotFound(_) => -32001,
            ServiceError::Conflict(_) => -32002,
            ServiceError::Rejected(_) => -32602,
            ServiceError::Internal(_) => -32603,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => ServiceError::NotFound(what),
            StorageError::DuplicateCommitment(_) | StorageError::TreeFull { .. } => {
                ServiceError::Conflict(e.to_string())
            }
            StorageError::InvalidCommitment(_)
            | StorageError::BlobTooLarge { .. }
            | StorageError::InvalidRollupId(_)
            | StorageError::Input(_) => ServiceError::Rejected(e.to_string()),
            other => {
                tracing::error!(error = %other, "storage failure");
                ServiceError::Internal(other.to_string())
            }
        }
    }
}

/// Result alias for service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A deposit observed by the external event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    /// Note commitment.
    pub commitment: Commitment,
    /// Block in which the deposit was observed.
    pub block_number: u64,
    /// Emitting transaction.
    pub tx_hash: Hash,
    /// Logical timestamp.
    pub timestamp: u64,
    /// Rollup the artifact belongs to.
    pub rollup_id: String,
    /// Epoch the artifact belongs to.
    pub epoch: u64,
}

/// Result of inserting a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertReceipt {
    /// Root after the insert.
    pub root: Hash,
    /// Assigned leaf index.
    pub leaf_index: u64,
}

/// Result of ingesting a deposit and its artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// Root after the insert.
    pub root: Hash,
    /// Assigned leaf index.
    pub leaf_index: u64,
    /// Cid of the stored artifact, if one was supplied.
    pub cid: Option<Cid>,
}

/// Parse a hex string into a 32-byte hash.
fn parse_hash(hex_str: &str) -> ServiceResult<Hash> {
    let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(trimmed)
        .map_err(|_| ServiceError::Rejected(format!("invalid hex string: {}", hex_str)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ServiceError::Rejected("hash must be 32 bytes".into()))
}

fn parse_commitment(hex_str: &str) -> ServiceResult<Commitment> {
    Commitment::from_hex(hex_str).map_err(|e| ServiceError::Rejected(format!("commitment: {}", e)))
}

fn parse_cid(hex_str: &str) -> ServiceResult<Cid> {
    Ok(Cid::from_bytes(parse_hash(hex_str)?))
}

/// Artifact written by an ingest whose insert has not committed yet.
struct StagedArtifact {
    cid: Cid,
    prior_link: Option<Cid>,
    existed_here: bool,
}

/// Shared handle to the tree and the blob store.
///
/// Cloning is cheap. Inserts and ingests are serialized by one writer
/// lock; blob operations on the same cid are serialized inside the store.
pub struct Service<B: KvBackend> {
    tree: Arc<CommitmentTree<B>>,
    blobs: Arc<BlobStore<B>>,
    writer: Arc<Mutex<()>>,
}

impl<B: KvBackend> Clone for Service<B> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            blobs: self.blobs.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<B: KvBackend> Service<B> {
    /// Open the tree and blob store on one backend.
    pub fn open(
        backend: Arc<B>,
        tree: TreeConfig,
        shards: ShardConfig,
        cipher: BlobCipher,
    ) -> StorageResult<Self> {
        let tree = CommitmentTree::open(backend.clone(), tree)?;
        let blobs = BlobStore::new(backend, cipher, shards);
        Ok(Self {
            tree: Arc::new(tree),
            blobs: Arc::new(blobs),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The commitment tree.
    pub fn tree(&self) -> &CommitmentTree<B> {
        &self.tree
    }

    /// The blob store.
    pub fn blobs(&self) -> &BlobStore<B> {
        &self.blobs
    }

    fn assembler(&self) -> ProofAssembler<'_, B> {
        ProofAssembler::new(&self.tree, &self.blobs)
    }

    /// Insert a commitment.
    pub fn insert_commitment(
        &self,
        commitment: &str,
        block_number: u64,
        tx_hash: &str,
        timestamp: u64,
    ) -> ServiceResult<InsertReceipt> {
        let commitment = parse_commitment(commitment)?;
        let tx_hash = parse_hash(tx_hash)?;
        let _writer = self.lock_writer();
        let result = self.tree.insert(commitment, block_number, tx_hash, timestamp)?;
        Ok(InsertReceipt {
            root: result.root,
            leaf_index: result.leaf_index,
        })
    }

    /// Cached proof for a commitment.
    pub fn get_proof(&self, commitment: &str) -> ServiceResult<MerkleProof> {
        let commitment = parse_commitment(commitment)?;
        self.tree
            .get_proof(&commitment)?
            .ok_or_else(|| ServiceError::NotFound(format!("commitment {}", commitment)))
    }

    /// Proof-input package for a commitment.
    pub fn get_proof_input_package(&self, commitment: &str) -> ServiceResult<ProofInputPackage> {
        let commitment = parse_commitment(commitment)?;
        Ok(self.assembler().package(&commitment)?.package)
    }

    /// Proof-input package together with the linked artifact.
    pub fn get_proof_bundle(&self, commitment: &str) -> ServiceResult<ProofBundle> {
        let commitment = parse_commitment(commitment)?;
        Ok(self.assembler().bundle(&commitment)?)
    }

    /// Whether `proof` verifies and its root was produced by this tree.
    pub fn verify_proof(&self, proof: &MerkleProof) -> ServiceResult<bool> {
        if !self.tree.verify_proof(proof) {
            return Ok(false);
        }
        Ok(self.tree.is_known_root(&proof.root)?)
    }

    /// Whether this tree ever produced `root`.
    pub fn is_known_root(&self, root: &str) -> ServiceResult<bool> {
        Ok(self.tree.is_known_root(&parse_hash(root)?)?)
    }

    /// Current tree header.
    pub fn tree_state(&self) -> TreeSnapshot {
        self.tree.tree_state()
    }

    /// Store an artifact.
    pub fn store_blob(&self, content: &[u8], options: &StoreOptions) -> ServiceResult<Vec<BlobMetadata>> {
        Ok(self.blobs.store(content, options)?)
    }

    /// Artifact by cid.
    pub fn get_blob(&self, cid: &str) -> ServiceResult<Blob> {
        let cid = parse_cid(cid)?;
        self.blobs
            .retrieve(&cid)?
            .ok_or_else(|| ServiceError::NotFound(format!("blob {}", cid)))
    }

    /// Shard metadata stored at `(rollup_id, epoch)`.
    pub fn list_blobs(&self, rollup_id: &str, epoch: u64) -> ServiceResult<Vec<BlobMetadata>> {
        Ok(self.blobs.list_by_epoch(rollup_id, epoch)?)
    }

    /// Every artifact stored at `(rollup_id, epoch)`.
    pub fn get_blobs_by_epoch(&self, rollup_id: &str, epoch: u64) -> ServiceResult<Vec<Blob>> {
        Ok(self.blobs.retrieve_by_epoch(rollup_id, epoch)?)
    }

    /// Delete every copy of an artifact.
    pub fn delete_blob(&self, cid: &str) -> ServiceResult<()> {
        let cid = parse_cid(cid)?;
        if self.blobs.delete(&cid)? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("blob {}", cid)))
        }
    }

    /// Blob store counts.
    pub fn blob_stats(&self) -> ServiceResult<BlobStats> {
        Ok(self.blobs.stats()?)
    }

    /// Store the artifact (linked to the commitment), then insert the
    /// commitment.
    ///
    /// A rejected or failed insert leaves the blob store as it was.
    pub fn ingest(&self, event: &DepositEvent, artifact: Option<&[u8]>) -> ServiceResult<IngestReceipt> {
        let _writer = self.lock_writer();

        if self.tree.leaf_index_of(&event.commitment)?.is_some() {
            return Err(StorageError::DuplicateCommitment(event.commitment.to_string()).into());
        }
        let state = self.tree.tree_state();
        if state.next_leaf_index >= state.capacity {
            return Err(StorageError::TreeFull {
                capacity: state.capacity,
            }
            .into());
        }

        let staged = match artifact {
            Some(content) => Some(self.stage_artifact(event, content)?),
            None => None,
        };

        let result = match self
            .tree
            .insert(event.commitment, event.block_number, event.tx_hash, event.timestamp)
        {
            Ok(result) => result,
            Err(e) => {
                if let Some(staged) = &staged {
                    self.unstage_artifact(event, staged);
                }
                return Err(e.into());
            }
        };
        let cid = staged.map(|s| s.cid);

        tracing::info!(
            leaf_index = result.leaf_index,
            commitment = %event.commitment,
            cid = ?cid.map(|c| c.to_hex()),
            "deposit ingested"
        );

        Ok(IngestReceipt {
            root: result.root,
            leaf_index: result.leaf_index,
            cid,
        })
    }
}

impl<B: KvBackend> Service<B> {
    fn stage_artifact(&self, event: &DepositEvent, content: &[u8]) -> ServiceResult<StagedArtifact> {
        let cid = cashio_core::content_hash(content);
        let prior_link = self.blobs.cid_for_commitment(&event.commitment)?;
        let existed_here = self.blobs.contains_at(&cid, &event.rollup_id, event.epoch)?;

        let options = StoreOptions::new(event.rollup_id.clone(), event.epoch).link(event.commitment);
        self.blobs.store(content, &options)?;

        Ok(StagedArtifact {
            cid,
            prior_link,
            existed_here,
        })
    }

    fn unstage_artifact(&self, event: &DepositEvent, staged: &StagedArtifact) {
        let undo = || -> StorageResult<()> {
            if !staged.existed_here {
                self.blobs.delete_at(&staged.cid, &event.rollup_id, event.epoch)?;
            }
            self.blobs.set_link(&event.commitment, staged.prior_link.as_ref())
        };
        if let Err(e) = undo() {
            tracing::error!(
                error = %e,
                cid = %staged.cid,
                commitment = %event.commitment,
                "failed to roll back artifact after rejected insert"
            );
        }
    }
}
