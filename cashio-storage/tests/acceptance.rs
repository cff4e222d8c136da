//! Acceptance tests for cashio-storage on RocksDB.
//!
//! 1. Persistence: 200 commitments + blobs -> restart -> root, index, proofs match
//! 2. Corruption: a missing completion marker is reported on reopen
//! 3. Shared backend: tree and blob store coexist and a bundle survives restart
//! 4. Encrypted blobs survive restart when the key is derived from a secret

use std::collections::HashSet;
use std::sync::Arc;

use tempfile::TempDir;

use cashio_core::{BlobCipher, Commitment, Hash, ShardConfig};
use cashio_storage::keys::filled_subtree_key;
use cashio_storage::{
    BlobStore, CommitmentTree, KvBackend, ProofAssembler, RocksBackend, StorageError,
    StoreOptions, TreeConfig,
};

const DEPTH: u8 = 12;

fn commitment(i: u32) -> Commitment {
    Commitment::hash_to_field(&i.to_le_bytes())
}

fn open_tree(backend: Arc<RocksBackend>) -> Result<CommitmentTree<RocksBackend>, StorageError> {
    CommitmentTree::open(backend, TreeConfig::with_depth(DEPTH))
}

/// Acceptance Test 1: Persistence
#[test]
fn test_tree_persistence() {
    let dir = TempDir::new().unwrap();

    let (snapshot, roots) = {
        let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
        let tree = open_tree(backend.clone()).unwrap();
        for i in 0..200 {
            tree.insert(commitment(i), u64::from(i), [i as u8; 32], 1_700_000_000 + u64::from(i))
                .unwrap();
        }
        backend.flush().unwrap();
        (tree.tree_state(), tree.root_history().unwrap())
    };

    let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
    let tree = open_tree(backend).unwrap();

    assert_eq!(tree.tree_state(), snapshot);
    assert_eq!(tree.root_history().unwrap(), roots);
    for root in &roots {
        assert!(tree.is_known_root(root).unwrap());
    }

    let history: HashSet<Hash> = roots.into_iter().collect();
    for i in 0..200 {
        let proof = tree.get_proof(&commitment(i)).unwrap().unwrap();
        assert_eq!(proof.leaf_index, u64::from(i));
        assert!(tree.verify_proof(&proof));
        assert!(history.contains(&proof.root));
    }

    // Appending after restart continues the same sequence.
    let result = tree.insert(commitment(200), 0, [0; 32], 0).unwrap();
    assert_eq!(result.leaf_index, 200);
    assert!(tree.verify_proof(&result.proof));
}

/// Acceptance Test 2: Corruption
#[test]
fn test_missing_completion_marker_detected() {
    let dir = TempDir::new().unwrap();

    {
        let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
        let tree = open_tree(backend.clone()).unwrap();
        tree.insert(commitment(1), 0, [0; 32], 0).unwrap();
        tree.insert(commitment(2), 0, [0; 32], 0).unwrap();
        backend.delete(&filled_subtree_key(DEPTH - 1)).unwrap();
    }

    let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
    assert!(matches!(open_tree(backend), Err(StorageError::Corruption(_))));
}

/// Acceptance Test 3: Shared backend
#[test]
fn test_bundle_survives_restart() {
    let dir = TempDir::new().unwrap();
    let note = commitment(42);
    let artifact: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();

    {
        let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
        let tree = open_tree(backend.clone()).unwrap();
        let blobs = BlobStore::new(
            backend,
            BlobCipher::from_key([9; 32]),
            ShardConfig::default(),
        );
        blobs
            .store(&artifact, &StoreOptions::new("rollup-a", 7).link(note))
            .unwrap();
        tree.insert(note, 1, [1; 32], 2).unwrap();
    }

    let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
    let tree = open_tree(backend.clone()).unwrap();
    let blobs = BlobStore::new(backend, BlobCipher::from_key([9; 32]), ShardConfig::default());

    let bundle = ProofAssembler::new(&tree, &blobs).bundle(&note).unwrap();
    assert_eq!(bundle.package.leaf_index, 0);
    let blob = bundle.artifact.unwrap();
    assert_eq!(blob.data, artifact);
    assert_eq!(blob.rollup_id, "rollup-a");
    assert_eq!(blob.epoch, 7);

    let stats = blobs.stats().unwrap();
    assert_eq!(stats.total_blobs, 1);
}

/// Acceptance Test 4: Secret-derived keys
#[test]
fn test_secret_key_is_stable_across_restart() {
    let dir = TempDir::new().unwrap();
    let secret = b"operator secret";

    let cid = {
        let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
        let blobs = BlobStore::new(
            backend,
            BlobCipher::from_secret(secret).unwrap(),
            ShardConfig::with_shard_count(3),
        );
        blobs.store(b"sealed witness", &StoreOptions::new("r", 0)).unwrap()[0].cid
    };

    let backend = Arc::new(RocksBackend::open(dir.path()).unwrap());
    let blobs = BlobStore::new(
        backend.clone(),
        BlobCipher::from_secret(secret).unwrap(),
        ShardConfig::with_shard_count(3),
    );
    assert_eq!(blobs.retrieve(&cid).unwrap().unwrap().data, b"sealed witness");

    let other = BlobStore::new(backend, BlobCipher::from_secret(b"wrong").unwrap(), ShardConfig::default());
    assert!(matches!(other.retrieve(&cid), Err(StorageError::Integrity(_))));
}
