//! Incremental Merkle commitment tree.
//!
//! The tree keeps only `filled_subtrees` (one hash per level) in memory and
//! appends in O(depth). Each insert computes the full inclusion proof for
//! the new leaf and caches it, so proof lookups never walk the tree.
//!
//! ## Persistence
//!
//! An insert writes, in a single [`WriteBatch`]:
//! - the leaf record and the commitment -> index entry
//! - every filled subtree the insert touched
//! - the cached proof
//! - the root history entry and the known-root entry
//! - the tree header (depth, root, next index)
//!
//! The presence of a level's filled-subtree key marks that level as
//! completed at least once. Leaf 0 is a left child at every level, so after
//! the first insert every level has a marker; a missing marker in a
//! non-empty tree is reported as corruption instead of being patched with
//! the zero hash.

mod state;

pub use state::{zero_hashes, ZERO_LEAF};

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cashio_core::serialization::{deserialize, serialize};
use cashio_core::{
    Commitment, CommitmentLeaf, Hash, MerkleProof, NodeHasher, ProofInputPackage, Sha256Hasher,
};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::keys::{
    filled_subtree_key, known_root_key, leaf_by_commitment_key, leaf_key, proof_key,
    root_history_key, tree_meta_key, KeyPrefix,
};
use crate::kv::{KvBackend, WriteBatch};
use state::{TreeMeta, TreeState};

/// Smallest supported depth.
pub const MIN_TREE_DEPTH: u8 = 1;
/// Largest supported depth.
pub const MAX_TREE_DEPTH: u8 = 32;
/// Depth used when none is configured.
pub const DEFAULT_TREE_DEPTH: u8 = 20;

/// Tree configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Number of levels above the leaves. Fixed for the life of the data.
    pub depth: u8,
}

impl TreeConfig {
    /// Configuration with the given depth.
    pub fn with_depth(depth: u8) -> Self {
        Self { depth }
    }

    fn validate(&self) -> StorageResult<()> {
        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&self.depth) {
            return Err(StorageError::ConfigMismatch(format!(
                "tree depth {} outside {}..={}",
                self.depth, MIN_TREE_DEPTH, MAX_TREE_DEPTH
            )));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
        }
    }
}

/// Outcome of a successful insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertResult {
    /// Root after the insert.
    pub root: Hash,
    /// Position assigned to the commitment.
    pub leaf_index: u64,
    /// Inclusion proof against `root`.
    pub proof: MerkleProof,
}

/// Point-in-time view of the tree header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeSnapshot {
    /// Tree depth.
    pub depth: u8,
    /// Current root.
    pub root: Hash,
    /// Index the next insert will receive.
    pub next_leaf_index: u64,
    /// Maximum number of leaves.
    pub capacity: u64,
}

/// Append-only commitment tree over a key-value backend.
///
/// Inserts are serialized by an internal mutex. Lookups read the backend
/// directly and need no lock, because every insert lands as one batch.
pub struct CommitmentTree<B: KvBackend, H: NodeHasher = Sha256Hasher> {
    backend: Arc<B>,
    state: Mutex<TreeState>,
    _hasher: PhantomData<fn() -> H>,
}

impl<B: KvBackend, H: NodeHasher> CommitmentTree<B, H> {
    /// Open the tree, reloading persisted state if there is any.
    pub fn open(backend: Arc<B>, config: TreeConfig) -> StorageResult<Self> {
        config.validate()?;
        let state = Self::load_state(backend.as_ref(), config.depth)?;

        info!(
            depth = state.depth,
            next_leaf_index = state.next_leaf_index,
            root = %hex::encode(state.current_root),
            "commitment tree opened"
        );

        Ok(Self {
            backend,
            state: Mutex::new(state),
            _hasher: PhantomData,
        })
    }

    fn load_state(backend: &B, depth: u8) -> StorageResult<TreeState> {
        let mut state = TreeState::empty::<H>(depth);

        let meta: TreeMeta = match backend.get(&tree_meta_key())? {
            Some(bytes) => deserialize(&bytes)?,
            None => return Ok(state),
        };

        if meta.depth != depth {
            return Err(StorageError::ConfigMismatch(format!(
                "stored tree has depth {}, configured depth is {}",
                meta.depth, depth
            )));
        }
        if meta.next_leaf_index > state.capacity() {
            return Err(StorageError::Corruption(format!(
                "next leaf index {} exceeds capacity {}",
                meta.next_leaf_index,
                state.capacity()
            )));
        }

        for level in 0..depth {
            match backend.get(&filled_subtree_key(level))? {
                Some(bytes) => state.filled_subtrees[level as usize] = decode_hash(&bytes)?,
                None if meta.next_leaf_index == 0 => {}
                None => {
                    return Err(StorageError::Corruption(format!(
                        "missing filled subtree at level {} with {} leaves",
                        level, meta.next_leaf_index
                    )));
                }
            }
        }

        if meta.next_leaf_index > 0 {
            let last = read_hash(backend, &root_history_key(meta.next_leaf_index - 1))?;
            if last != Some(meta.current_root) {
                return Err(StorageError::Corruption(
                    "latest root history entry does not match tree root".into(),
                ));
            }
        }

        state.current_root = meta.current_root;
        state.next_leaf_index = meta.next_leaf_index;
        Ok(state)
    }

    fn lock_state(&self) -> MutexGuard<'_, TreeState> {
        // State is only replaced after a successful commit, so it is never
        // left half-updated by a panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Append a commitment.
    ///
    /// Fails with `TreeFull` when every position is taken and with
    /// `DuplicateCommitment` when the commitment is already present; neither
    /// changes any state.
    pub fn insert(
        &self,
        commitment: Commitment,
        block_number: u64,
        source_tx_hash: Hash,
        timestamp: u64,
    ) -> StorageResult<InsertResult> {
        let mut state = self.lock_state();

        if state.next_leaf_index >= state.capacity() {
            return Err(StorageError::TreeFull {
                capacity: state.capacity(),
            });
        }
        if self.backend.exists(&leaf_by_commitment_key(&commitment))? {
            return Err(StorageError::DuplicateCommitment(commitment.to_string()));
        }

        let append = state.compute_append::<H>(commitment.as_bytes());
        let leaf_index = append.leaf_index;

        let leaf = CommitmentLeaf {
            commitment,
            leaf_index,
            block_number,
            source_tx_hash,
            inserted_at: timestamp,
        };
        let proof = MerkleProof {
            root: append.root,
            leaf: commitment,
            leaf_index,
            path_elements: append.path_elements.clone(),
            path_indices: append.path_indices.clone(),
        };
        let meta = TreeMeta {
            next_leaf_index: leaf_index + 1,
            current_root: append.root,
            ..state.meta()
        };

        let mut batch = WriteBatch::new();
        batch.put(leaf_key(leaf_index), serialize(&leaf)?);
        batch.put(
            leaf_by_commitment_key(&commitment),
            leaf_index.to_be_bytes().to_vec(),
        );
        for (level, hash) in &append.filled {
            batch.put(filled_subtree_key(*level), hash.to_vec());
        }
        batch.put(proof_key(leaf_index), proof.to_bytes()?);
        batch.put(root_history_key(leaf_index), append.root.to_vec());
        batch.put(known_root_key(&append.root), leaf_index.to_be_bytes().to_vec());
        batch.put(tree_meta_key(), serialize(&meta)?);

        self.backend.write_batch(batch)?;
        state.apply(&append);

        debug!(
            leaf_index,
            commitment = %commitment,
            root = %hex::encode(append.root),
            "commitment inserted"
        );

        Ok(InsertResult {
            root: append.root,
            leaf_index,
            proof,
        })
    }

    /// Append raw commitment bytes, validating them as a field element.
    pub fn insert_bytes(
        &self,
        commitment: &[u8],
        block_number: u64,
        source_tx_hash: Hash,
        timestamp: u64,
    ) -> StorageResult<InsertResult> {
        let commitment = Commitment::from_slice(commitment)?;
        self.insert(commitment, block_number, source_tx_hash, timestamp)
    }

    /// Leaf index of a commitment.
    pub fn leaf_index_of(&self, commitment: &Commitment) -> StorageResult<Option<u64>> {
        match self.backend.get(&leaf_by_commitment_key(commitment))? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Leaf record at `leaf_index`.
    pub fn get_leaf_by_index(&self, leaf_index: u64) -> StorageResult<Option<CommitmentLeaf>> {
        match self.backend.get(&leaf_key(leaf_index))? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Leaf record for a commitment.
    pub fn get_leaf(&self, commitment: &Commitment) -> StorageResult<Option<CommitmentLeaf>> {
        match self.leaf_index_of(commitment)? {
            Some(index) => self.get_leaf_by_index(index)?.map(Some).ok_or_else(|| {
                StorageError::Corruption(format!("leaf {} indexed but missing", index))
            }),
            None => Ok(None),
        }
    }

    /// Cached proof for the leaf at `leaf_index`.
    pub fn get_proof_by_index(&self, leaf_index: u64) -> StorageResult<Option<MerkleProof>> {
        match self.backend.get(&proof_key(leaf_index))? {
            Some(bytes) => Ok(Some(MerkleProof::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Cached proof for a commitment.
    pub fn get_proof(&self, commitment: &Commitment) -> StorageResult<Option<MerkleProof>> {
        match self.leaf_index_of(commitment)? {
            Some(index) => self.get_proof_by_index(index)?.map(Some).ok_or_else(|| {
                StorageError::Corruption(format!("proof for leaf {} missing", index))
            }),
            None => Ok(None),
        }
    }

    /// Check a proof without touching storage.
    ///
    /// Accepts proofs against any root, historical or not. Pair with
    /// [`is_known_root`](Self::is_known_root) to reject forged roots.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        proof.verify_with::<H>()
    }

    /// Whether this tree ever produced `root`.
    pub fn is_known_root(&self, root: &Hash) -> StorageResult<bool> {
        self.backend.exists(&known_root_key(root))
    }

    /// Root produced by the insert with sequence number `seq`.
    pub fn root_at(&self, seq: u64) -> StorageResult<Option<Hash>> {
        read_hash(self.backend.as_ref(), &root_history_key(seq))
    }

    /// Number of roots recorded so far.
    pub fn root_history_len(&self) -> u64 {
        self.lock_state().next_leaf_index
    }

    /// Every recorded root, oldest first.
    pub fn root_history(&self) -> StorageResult<Vec<Hash>> {
        self.backend
            .prefix_iterator(&[KeyPrefix::RootHistory as u8])?
            .map(|(_, value)| decode_hash(&value))
            .collect()
    }

    /// Leaf record joined with its cached proof.
    pub fn get_proof_input_package(
        &self,
        commitment: &Commitment,
    ) -> StorageResult<Option<ProofInputPackage>> {
        let leaf = match self.get_leaf(commitment)? {
            Some(leaf) => leaf,
            None => return Ok(None),
        };
        let proof = self.get_proof_by_index(leaf.leaf_index)?.ok_or_else(|| {
            StorageError::Corruption(format!("proof for leaf {} missing", leaf.leaf_index))
        })?;
        Ok(Some(ProofInputPackage::new(&leaf, proof)))
    }

    /// Current header.
    pub fn tree_state(&self) -> TreeSnapshot {
        let state = self.lock_state();
        TreeSnapshot {
            depth: state.depth,
            root: state.current_root,
            next_leaf_index: state.next_leaf_index,
            capacity: state.capacity(),
        }
    }

    /// Current root.
    pub fn root(&self) -> Hash {
        self.lock_state().current_root
    }
}

fn decode_hash(bytes: &[u8]) -> StorageResult<Hash> {
    bytes
        .try_into()
        .map_err(|_| StorageError::Corruption(format!("expected 32-byte hash, got {}", bytes.len())))
}

fn decode_u64(bytes: &[u8]) -> StorageResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Corruption(format!("expected 8-byte index, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

fn read_hash<B: KvBackend>(backend: &B, key: &[u8]) -> StorageResult<Option<Hash>> {
    match backend.get(key)? {
        Some(bytes) => Ok(Some(decode_hash(&bytes)?)),
        None => Ok(None),
    }
}
