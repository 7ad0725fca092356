//! Lean Incremental Merkle Tree
//!
//! An append-only binary tree whose depth grows with the number of leaves.
//! A node without a right sibling takes its left child's value unchanged
//! instead of being hashed with a placeholder, so the tree is always balanced
//! and `depth = ceil(log2(size))`.
//!
//! Proofs are emitted in the shape the inclusion verifier expects: one sibling
//! per level up to `max_depth`, with the zero sentinel wherever a level has no
//! sibling (including every level above the current depth).
//!
//! The zero sentinel shares the field's additive identity, so a leaf that is
//! literally zero is indistinguishable from an absent sibling.

use ff::PrimeField;
use tracing::debug;

use crate::error::TreeError;
use crate::hash::Compressor;
use crate::merkle::MerkleProof;

#[derive(Clone, Debug)]
pub struct LeanImt<F, C> {
    hasher: C,
    max_depth: usize,
    /// `nodes[0]` holds the leaves, `nodes[depth]` the root
    nodes: Vec<Vec<F>>,
}

impl<F: PrimeField, C: Compressor<F>> LeanImt<F, C> {
    pub fn new(hasher: C, max_depth: usize) -> Self {
        Self {
            hasher,
            max_depth,
            nodes: vec![Vec::new()],
        }
    }

    /// Build a tree by inserting `leaves` in order
    pub fn from_leaves(hasher: C, max_depth: usize, leaves: &[F]) -> Result<Self, TreeError> {
        let mut tree = Self::new(hasher, max_depth);
        for leaf in leaves {
            tree.insert(*leaf)?;
        }
        Ok(tree)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn size(&self) -> u64 {
        self.nodes[0].len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_empty()
    }

    pub fn depth(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Current root. The empty tree's root is zero.
    pub fn root(&self) -> F {
        self.nodes
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(F::ZERO)
    }

    pub fn leaf(&self, index: u64) -> Option<F> {
        self.nodes[0].get(index as usize).copied()
    }

    pub fn leaves(&self) -> &[F] {
        &self.nodes[0]
    }

    pub fn index_of(&self, leaf: &F) -> Option<u64> {
        self.nodes[0].iter().position(|l| l == leaf).map(|i| i as u64)
    }

    /// Append a leaf and return its index
    pub fn insert(&mut self, leaf: F) -> Result<u64, TreeError> {
        let index = self.size();
        // Past 63 levels the capacity exceeds any u64 index.
        let full = u32::try_from(self.max_depth)
            .ok()
            .and_then(|bits| 1u64.checked_shl(bits))
            .is_some_and(|capacity| index >= capacity);
        if full {
            return Err(TreeError::Full {
                max_depth: self.max_depth,
            });
        }

        let depth = ceil_log2(index + 1);
        while self.nodes.len() <= depth {
            self.nodes.push(Vec::new());
        }

        let mut node = leaf;
        let mut idx = index as usize;
        for level in 0..depth {
            self.set_node(level, idx, node);
            // A right child always has a left sibling; a left child at the
            // end of its level propagates.
            if idx & 1 == 1 {
                node = self.hasher.hash2(self.nodes[level][idx - 1], node);
            }
            idx >>= 1;
        }
        self.set_node(depth, idx, node);

        debug!(index, depth, "inserted leaf");
        Ok(index)
    }

    /// Inclusion proof for the leaf at `index`, padded to `max_depth`
    pub fn generate_proof(&self, index: u64) -> Result<MerkleProof<F>, TreeError> {
        let leaf = self.leaf(index).ok_or(TreeError::IndexOutOfBounds {
            index,
            size: self.size(),
        })?;

        let depth = self.depth();
        let mut siblings = Vec::with_capacity(self.max_depth);
        let mut idx = index as usize;
        for level in 0..self.max_depth {
            let sibling = if level < depth {
                self.nodes[level].get(idx ^ 1).copied().unwrap_or(F::ZERO)
            } else {
                F::ZERO
            };
            siblings.push(sibling);
            idx >>= 1;
        }

        Ok(MerkleProof {
            leaf,
            index,
            siblings,
            depth: depth as u64,
        })
    }

    fn set_node(&mut self, level: usize, idx: usize, value: F) {
        let row = &mut self.nodes[level];
        if idx == row.len() {
            row.push(value);
        } else {
            row[idx] = value;
        }
    }
}

fn ceil_log2(n: u64) -> usize {
    if n <= 1 {
        0
    } else {
        (64 - (n - 1).leading_zeros()) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hasher;
    use crate::params::RelationParams;
    use halo2_proofs::pasta::Fp;

    fn fp(v: u64) -> Fp {
        Fp::from(v)
    }

    fn leaves(n: u64) -> Vec<Fp> {
        (1..=n).map(fp).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = LeanImt::<Fp, _>::new(Hasher::new(), 4);
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), Fp::zero());
        assert!(tree.generate_proof(0).is_err());
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let mut tree = LeanImt::new(Hasher::new(), 4);
        assert_eq!(tree.insert(fp(100)).unwrap(), 0);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), fp(100));

        let proof = tree.generate_proof(0).unwrap();
        assert_eq!(proof.siblings, vec![Fp::zero(); 4]);
        assert_eq!(proof.depth, 0);
    }

    #[test]
    fn test_depth_grows() {
        let mut tree = LeanImt::new(Hasher::new(), 8);
        let expected = [0, 1, 2, 2, 3, 3, 3, 3, 4];
        for (i, depth) in expected.iter().enumerate() {
            tree.insert(fp(i as u64 + 1)).unwrap();
            assert_eq!(tree.depth(), *depth, "size {}", i + 1);
        }
    }

    #[test]
    fn test_lone_node_propagates() {
        let h = Hasher::new();
        let tree = LeanImt::from_leaves(h, 4, &leaves(3)).unwrap();

        // [1, 2, 3] -> [H(1,2), 3] -> H(H(1,2), 3)
        assert_eq!(tree.root(), h.hash2(h.hash2(fp(1), fp(2)), fp(3)));
    }

    #[test]
    fn test_four_leaf_root() {
        let h = Hasher::new();
        let tree = LeanImt::from_leaves(h, 4, &leaves(4)).unwrap();

        let expected = h.hash2(h.hash2(fp(1), fp(2)), h.hash2(fp(3), fp(4)));
        assert_eq!(tree.root(), expected);

        let proof = tree.generate_proof(1).unwrap();
        assert_eq!(proof.leaf, fp(2));
        assert_eq!(proof.siblings, vec![fp(1), h.hash2(fp(3), fp(4)), Fp::zero(), Fp::zero()]);
        assert_eq!(proof.depth, 2);
    }

    #[test]
    fn test_every_proof_folds_to_root() {
        let h = Hasher::new();
        let params = RelationParams::with_max_depth(5).unwrap();

        for n in 1..=18u64 {
            let tree = LeanImt::from_leaves(h, 5, &leaves(n)).unwrap();
            for index in 0..n {
                let proof = tree.generate_proof(index).unwrap();
                assert_eq!(proof.siblings.len(), 5);
                assert!(
                    proof.verify(&h, &params, &tree.root()),
                    "size {} index {}",
                    n,
                    index
                );
            }
        }
    }

    #[test]
    fn test_tree_full() {
        let mut tree = LeanImt::new(Hasher::new(), 2);
        for i in 0..4 {
            tree.insert(fp(i + 1)).unwrap();
        }
        assert_eq!(tree.insert(fp(5)), Err(TreeError::Full { max_depth: 2 }));
        assert_eq!(tree.size(), 4);
    }

    #[test]
    fn test_deep_trees_accept_leaves() {
        for max_depth in [63, 64, 128, 200] {
            let mut tree = LeanImt::new(Hasher::new(), max_depth);
            for i in 0..3 {
                assert_eq!(tree.insert(fp(i + 1)).unwrap(), i);
            }

            let proof = tree.generate_proof(2).unwrap();
            assert_eq!(proof.siblings.len(), max_depth);
            assert_eq!(proof.depth, 2);
        }
    }

    #[test]
    fn test_index_of() {
        let tree = LeanImt::from_leaves(Hasher::new(), 4, &leaves(5)).unwrap();
        assert_eq!(tree.index_of(&fp(4)), Some(3));
        assert_eq!(tree.index_of(&fp(42)), None);
        assert_eq!(tree.leaf(4), Some(fp(5)));
    }

    /// Level-by-level rebuild: pair up nodes, carry a lone node upward
    fn rebuild_root(h: &Hasher, leaves: &[Fp]) -> Fp {
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [l, r] => h.hash2(*l, *r),
                    [lone] => *lone,
                    _ => unreachable!(),
                })
                .collect();
        }
        level.first().copied().unwrap_or(Fp::zero())
    }

    #[test]
    fn test_incremental_matches_rebuild() {
        let h = Hasher::new();
        let mut tree = LeanImt::new(h, 6);
        for (i, leaf) in leaves(21).into_iter().enumerate() {
            tree.insert(leaf).unwrap();
            assert_eq!(tree.root(), rebuild_root(&h, &leaves(i as u64 + 1)));
        }
    }
}
