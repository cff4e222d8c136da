//! Read-side join of tree proofs and stored artifacts.

use cashio_core::{Blob, Commitment, Hash, NodeHasher, ProofInputPackage, ProofInputs, Sha256Hasher};

use crate::blob::BlobStore;
use crate::error::{StorageError, StorageResult};
use crate::kv::KvBackend;
use crate::tree::CommitmentTree;

/// A proof-input package, optionally with the artifact it refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofBundle {
    /// Membership package from the tree.
    pub package: ProofInputPackage,
    /// Linked artifact, when requested.
    pub artifact: Option<Blob>,
}

/// Builds prover inputs from a tree and a blob store. Holds no state.
pub struct ProofAssembler<'a, B: KvBackend, H: NodeHasher = Sha256Hasher> {
    tree: &'a CommitmentTree<B, H>,
    blobs: &'a BlobStore<B>,
}

impl<'a, B: KvBackend, H: NodeHasher> ProofAssembler<'a, B, H> {
    /// Join over `tree` and `blobs`.
    pub fn new(tree: &'a CommitmentTree<B, H>, blobs: &'a BlobStore<B>) -> Self {
        Self { tree, blobs }
    }

    fn require_package(&self, commitment: &Commitment) -> StorageResult<ProofInputPackage> {
        self.tree
            .get_proof_input_package(commitment)?
            .ok_or_else(|| StorageError::NotFound(format!("commitment {}", commitment)))
    }

    /// Package without the artifact.
    pub fn package(&self, commitment: &Commitment) -> StorageResult<ProofBundle> {
        Ok(ProofBundle {
            package: self.require_package(commitment)?,
            artifact: None,
        })
    }

    /// Package together with the linked artifact.
    pub fn bundle(&self, commitment: &Commitment) -> StorageResult<ProofBundle> {
        let package = self.require_package(commitment)?;
        let cid = self
            .blobs
            .cid_for_commitment(commitment)?
            .ok_or_else(|| StorageError::NotFound(format!("artifact link for {}", commitment)))?;
        let artifact = self
            .blobs
            .retrieve(&cid)?
            .ok_or_else(|| StorageError::NotFound(format!("artifact {}", cid)))?;
        Ok(ProofBundle {
            package,
            artifact: Some(artifact),
        })
    }

    /// Deposit inputs. The commitment need not be in the tree yet.
    pub fn deposit_inputs(&self, commitment: Commitment, amount: u128) -> StorageResult<ProofInputs> {
        Ok(ProofInputs::deposit(commitment, amount)?)
    }

    /// Withdrawal inputs for a note already in the tree.
    pub fn withdraw_inputs(
        &self,
        commitment: &Commitment,
        nullifier_hash: Hash,
        recipient: &str,
        amount: u128,
    ) -> StorageResult<ProofInputs> {
        let package = self.require_package(commitment)?;
        Ok(ProofInputs::withdraw_with::<H>(package, nullifier_hash, recipient, amount)?)
    }

    /// Transfer inputs spending `inputs` into `outputs`.
    pub fn transfer_inputs(
        &self,
        inputs: &[Commitment],
        nullifier_hashes: Vec<Hash>,
        outputs: Vec<Commitment>,
    ) -> StorageResult<ProofInputs> {
        let packages = inputs
            .iter()
            .map(|c| self.require_package(c))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(ProofInputs::transfer_with::<H>(packages, nullifier_hashes, outputs)?)
    }
}
