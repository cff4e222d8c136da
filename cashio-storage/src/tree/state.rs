//! In-memory accumulator state and the O(depth) append step.

use cashio_core::types::{LEFT, RIGHT};
use cashio_core::{Hash, NodeHasher};
use serde::{Deserialize, Serialize};

/// Value of an empty leaf.
pub const ZERO_LEAF: Hash = [0u8; 32];

/// Precompute `zeros[i]`, the root of an empty subtree of height `i`.
pub fn zero_hashes<H: NodeHasher>(depth: u8) -> Vec<Hash> {
    let mut zeros = Vec::with_capacity(depth as usize);
    let mut current = ZERO_LEAF;
    for _ in 0..depth {
        zeros.push(current);
        current = H::hash_pair(&current, &current);
    }
    zeros
}

/// Persisted tree header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TreeMeta {
    pub depth: u8,
    pub current_root: Hash,
    pub next_leaf_index: u64,
}

/// Result of computing one append, before anything is committed.
#[derive(Clone, Debug)]
pub(crate) struct Append {
    pub leaf_index: u64,
    pub root: Hash,
    pub path_elements: Vec<Hash>,
    pub path_indices: Vec<u8>,
    /// Levels where the new node is a left child and becomes the filled subtree.
    pub filled: Vec<(u8, Hash)>,
}

#[derive(Clone, Debug)]
pub(crate) struct TreeState {
    pub depth: u8,
    pub zeros: Vec<Hash>,
    pub filled_subtrees: Vec<Hash>,
    pub current_root: Hash,
    pub next_leaf_index: u64,
}

impl TreeState {
    pub fn empty<H: NodeHasher>(depth: u8) -> Self {
        let zeros = zero_hashes::<H>(depth);
        let top = zeros[depth as usize - 1];
        Self {
            depth,
            filled_subtrees: zeros.clone(),
            current_root: H::hash_pair(&top, &top),
            zeros,
            next_leaf_index: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn meta(&self) -> TreeMeta {
        TreeMeta {
            depth: self.depth,
            current_root: self.current_root,
            next_leaf_index: self.next_leaf_index,
        }
    }

    /// Compute the path, new root and filled-subtree updates for `leaf`
    /// placed at `next_leaf_index`. Does not mutate.
    pub fn compute_append<H: NodeHasher>(&self, leaf: &Hash) -> Append {
        let depth = self.depth as usize;
        let mut path_elements = Vec::with_capacity(depth);
        let mut path_indices = Vec::with_capacity(depth);
        let mut filled = Vec::new();

        let mut current = *leaf;
        let mut idx = self.next_leaf_index;
        for level in 0..depth {
            let (left, right) = if idx % 2 == 0 {
                filled.push((level as u8, current));
                path_elements.push(self.zeros[level]);
                path_indices.push(LEFT);
                (current, self.zeros[level])
            } else {
                let sibling = self.filled_subtrees[level];
                path_elements.push(sibling);
                path_indices.push(RIGHT);
                (sibling, current)
            };
            current = H::hash_pair(&left, &right);
            idx /= 2;
        }

        Append {
            leaf_index: self.next_leaf_index,
            root: current,
            path_elements,
            path_indices,
            filled,
        }
    }

    /// Adopt a committed append.
    pub fn apply(&mut self, append: &Append) {
        for (level, hash) in &append.filled {
            self.filled_subtrees[*level as usize] = *hash;
        }
        self.current_root = append.root;
        self.next_leaf_index = append.leaf_index + 1;
    }
}
