//! Merkle inclusion verifier (off-circuit)
//!
//! Folds a leaf through exactly `max_depth` levels. At each level:
//! - the path bit orders `(current, sibling)` into `(left, right)`
//! - the parent is `H2(left, right)` when the sibling is non-zero, otherwise
//!   `current` propagates unchanged (LeanIMT single-child rule)
//!
//! Reduction is gated by sibling zero-ness only. The declared depth is bounded
//! against `max_depth` but never consulted per level, so a path with a wrong
//! declared depth (or stray non-zero padding) folds to a different,
//! deterministic root instead of being rejected. The comparison against the
//! public state root is what catches it.
//!
//! The circuit in [`crate::circuit`] implements the same fold and must agree
//! with this module bit for bit.

use ff::{Field, PrimeField, PrimeFieldBits};
use tracing::trace;

use crate::error::RelationError;
use crate::hash::Compressor;
use crate::params::RelationParams;

/// Little-endian bits of the canonical integer of `value`
pub fn field_bits<F: PrimeFieldBits>(value: &F) -> Vec<bool> {
    value.to_le_bits().iter().by_vals().collect()
}

/// Decompose `index` into `max_depth` path bits, least significant first.
///
/// Fails if `index >= 2^max_depth`, which bounds the index without a
/// separate comparison.
pub fn decode_index<F: PrimeFieldBits>(
    index: &F,
    max_depth: usize,
) -> Result<Vec<bool>, RelationError> {
    let mut bits = field_bits(index);
    if bits.iter().skip(max_depth).any(|b| *b) {
        return Err(RelationError::IndexOutOfRange { max_depth });
    }
    bits.resize(max_depth, false);
    Ok(bits)
}

/// Order `(current, sibling)` by the path bit: a set bit means the current
/// node is the right child.
pub fn select_path<F: Copy>(bit: bool, current: F, sibling: F) -> (F, F) {
    if bit {
        (sibling, current)
    } else {
        (current, sibling)
    }
}

/// Hash or propagate. Both candidates are computed; the zero sentinel picks.
pub fn reduce_level<F: PrimeField, C: Compressor<F>>(
    hasher: &C,
    current: F,
    left: F,
    right: F,
    sibling: F,
) -> F {
    let hashed = hasher.hash2(left, right);
    if bool::from(sibling.is_zero()) {
        current
    } else {
        hashed
    }
}

/// Assert `declared_depth <= max_depth` through a `depth_bits`-wide window.
///
/// Mirrors the in-circuit comparator: both the declared depth and the
/// difference `max_depth - declared_depth` must fit in `depth_bits`. The
/// parameters are validated first, so the window always covers `max_depth`.
pub fn check_depth_bound(
    declared_depth: u64,
    params: &RelationParams,
) -> Result<(), RelationError> {
    params.validate()?;
    let window = 1u64 << params.depth_bits;
    let max = params.max_depth as u64;
    if declared_depth >= window || declared_depth > max {
        return Err(RelationError::DepthOutOfBounds {
            declared: declared_depth,
            max: params.max_depth,
        });
    }
    Ok(())
}

/// Fold `leaf` up through `siblings` and return the resulting root.
pub fn compute_root<F, C>(
    hasher: &C,
    params: &RelationParams,
    leaf: F,
    index: &F,
    siblings: &[F],
    declared_depth: u64,
) -> Result<F, RelationError>
where
    F: PrimeFieldBits,
    C: Compressor<F>,
{
    check_depth_bound(declared_depth, params)?;
    if siblings.len() != params.max_depth {
        return Err(RelationError::SiblingCount {
            expected: params.max_depth,
            actual: siblings.len(),
        });
    }
    let bits = decode_index(index, params.max_depth)?;

    let mut node = leaf;
    for (level, (bit, sibling)) in bits.iter().zip(siblings).enumerate() {
        let (left, right) = select_path(*bit, node, *sibling);
        node = reduce_level(hasher, node, left, right, *sibling);
        trace!(level, bit = *bit, propagated = bool::from(sibling.is_zero()), "folded level");
    }

    Ok(node)
}

/// An inclusion proof: a leaf, its position and a zero-padded sibling path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof<F> {
    pub leaf: F,
    pub index: u64,
    /// Exactly `max_depth` entries, zero beyond the tree's depth
    pub siblings: Vec<F>,
    /// Tree depth at the time the proof was generated
    pub depth: u64,
}

impl<F: PrimeFieldBits> MerkleProof<F> {
    pub fn compute_root<C: Compressor<F>>(
        &self,
        hasher: &C,
        params: &RelationParams,
    ) -> Result<F, RelationError> {
        compute_root(
            hasher,
            params,
            self.leaf,
            &F::from(self.index),
            &self.siblings,
            self.depth,
        )
    }

    /// True iff the proof folds to `root`
    pub fn verify<C: Compressor<F>>(&self, hasher: &C, params: &RelationParams, root: &F) -> bool {
        matches!(self.compute_root(hasher, params), Ok(computed) if computed == *root)
    }
}
