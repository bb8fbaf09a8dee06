//! Fixed-depth Merkle tree over identity commitments.
//!
//! The tree is append-only: a leaf inserted at index `i` never changes, and
//! the root is a pure function of the leaf sequence and the zero value.
//! Empty subtrees use a precomputed ladder of zero hashes
//! (`zeros[k+1] = Poseidon(zeros[k], zeros[k])`), so a sparse tree hashes as
//! if it were fully padded to `2^depth` leaves.

use crate::error::SignalError;
use crate::utils::poseidon_hash;
use pasta_curves::pallas;

/// Largest supported tree depth. Deeper trees would overflow the index
/// arithmetic long before they become practical to fill.
pub const MAX_TREE_DEPTH: usize = 32;

/// A sibling path proving that a leaf is included under a root.
///
/// `siblings` and `path_indices` both have length `depth`; `path_indices[k]`
/// is 0 when the walked node is the left operand at level `k` and 1 when it
/// is the right operand. Proofs reflect the tree state at generation time
/// and go stale once the tree grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipProof {
    pub leaf: pallas::Base,
    pub root: pallas::Base,
    pub siblings: Vec<pallas::Base>,
    pub path_indices: Vec<u8>,
    pub leaf_index: usize,
}

/// An append-only binary Merkle tree of fixed depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipTree {
    depth: usize,
    zeros: Vec<pallas::Base>,
    leaves: Vec<pallas::Base>,
    root: pallas::Base,
}

impl MembershipTree {
    /// Creates an empty tree of the given depth.
    ///
    /// # Panics
    /// Panics if `depth` is zero or exceeds [`MAX_TREE_DEPTH`]; depth is a
    /// deployment constant, not runtime input.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        assert!(
            depth >= 1 && depth <= MAX_TREE_DEPTH,
            "tree depth must be in 1..={MAX_TREE_DEPTH}"
        );

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(pallas::Base::zero());
        for k in 0..depth {
            let z = zeros[k];
            zeros.push(poseidon_hash(z, z));
        }

        let root = zeros[depth];
        Self {
            depth,
            zeros,
            leaves: Vec::new(),
            root,
        }
    }

    /// Rebuilds a tree from an ordered commitment list, e.g. the member list
    /// served by the group membership source at startup.
    ///
    /// # Errors
    /// Fails with [`SignalError::TreeFull`] if the list exceeds `2^depth`.
    pub fn with_leaves(depth: usize, leaves: Vec<pallas::Base>) -> Result<Self, SignalError> {
        let mut tree = Self::new(depth);
        if leaves.len() > tree.capacity() {
            return Err(SignalError::TreeFull {
                depth,
                capacity: tree.capacity(),
            });
        }
        tree.leaves = leaves;
        tree.root = tree.compute_root();
        Ok(tree)
    }

    /// Appends a commitment at the next free index and returns that index.
    ///
    /// Recomputes and caches the root.
    ///
    /// # Errors
    /// Fails with [`SignalError::TreeFull`] once `2^depth` leaves exist.
    pub fn insert(&mut self, commitment: pallas::Base) -> Result<usize, SignalError> {
        if self.leaves.len() >= self.capacity() {
            return Err(SignalError::TreeFull {
                depth: self.depth,
                capacity: self.capacity(),
            });
        }

        self.leaves.push(commitment);
        self.root = self.compute_root();
        Ok(self.leaves.len() - 1)
    }

    /// Generates a sibling path for the leaf at `leaf_index`, reflecting the
    /// tree's state at call time.
    ///
    /// # Errors
    /// Fails with [`SignalError::UnknownLeaf`] for unused or out-of-range
    /// indices.
    pub fn proof_for(&self, leaf_index: usize) -> Result<MembershipProof, SignalError> {
        if leaf_index >= self.leaves.len() {
            return Err(SignalError::UnknownLeaf {
                index: leaf_index,
                leaf_count: self.leaves.len(),
            });
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);
        let mut level = self.leaves.clone();
        let mut index = leaf_index;

        for k in 0..self.depth {
            let sibling = level
                .get(index ^ 1)
                .copied()
                .unwrap_or(self.zeros[k]);
            siblings.push(sibling);
            path_indices.push((index & 1) as u8);

            level = self.next_level(&level, k);
            index >>= 1;
        }

        Ok(MembershipProof {
            leaf: self.leaves[leaf_index],
            root: self.root,
            siblings,
            path_indices,
            leaf_index,
        })
    }

    /// The cached root over all current leaves.
    #[must_use]
    pub fn current_root(&self) -> pallas::Base {
        self.root
    }

    /// Walks a sibling path and checks it lands on `root`.
    ///
    /// `path_indices[k]` decides the operand order at each level, so the
    /// caller needs no knowledge of the leaf's position beyond the proof
    /// itself.
    #[must_use]
    pub fn verify_path(proof: &MembershipProof, root: pallas::Base) -> bool {
        if proof.siblings.len() != proof.path_indices.len() {
            return false;
        }

        let mut node = proof.leaf;
        for (sibling, bit) in proof.siblings.iter().zip(&proof.path_indices) {
            node = if *bit == 0 {
                poseidon_hash(node, *sibling)
            } else {
                poseidon_hash(*sibling, node)
            };
        }

        node == root
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        1usize << self.depth
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Hashes one level into the next, padding a missing right sibling with
    /// the zero hash for that level.
    fn next_level(&self, level: &[pallas::Base], k: usize) -> Vec<pallas::Base> {
        if level.is_empty() {
            return vec![self.zeros[k + 1]];
        }

        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(self.zeros[k]);
            next.push(poseidon_hash(left, right));
        }
        next
    }

    fn compute_root(&self) -> pallas::Base {
        let mut level = self.leaves.clone();
        for k in 0..self.depth {
            level = self.next_level(&level, k);
        }
        level[0]
    }
}
