//! Compression functions
//!
//! The relation needs three one-way compressors over the field:
//! - `hash1: F -> F` (nullifier hash)
//! - `hash2: F x F -> F` (precommitment, Merkle parent)
//! - `hash3: F x F x F -> F` (commitment)
//!
//! They are abstracted behind [`Compressor`] so the off-circuit evaluator can
//! run over any field and any permutation. The production instance is Poseidon
//! over the Pallas base field with the `P128Pow5T3` parameters, which is what
//! the in-circuit `Pow5Chip` is configured with. Both sides must name
//! [`PoseidonSpec`]; changing it in one place changes it everywhere.

use std::fmt;
use std::marker::PhantomData;

use ff::FromUniformBytes;
use halo2_gadgets::poseidon::primitives::{self as poseidon, ConstantLength, P128Pow5T3, Spec};
use halo2_proofs::pasta::Fp;

/// Poseidon parameters shared by both evaluators
/// - Width: 3 (2 rate + 1 capacity)
/// - Full rounds: 8, partial rounds: 56
/// - S-box: x^5
pub type PoseidonSpec = P128Pow5T3;
pub const WIDTH: usize = 3;
pub const RATE: usize = 2;

/// The compressor used by the circuit and by every off-circuit helper
pub type Hasher = PoseidonHasher<PoseidonSpec>;

/// Fixed-arity one-way compression over a field.
pub trait Compressor<F> {
    fn hash1(&self, a: F) -> F;
    fn hash2(&self, a: F, b: F) -> F;
    fn hash3(&self, a: F, b: F, c: F) -> F;
}

/// Poseidon sponge with a constant-length domain per arity.
pub struct PoseidonHasher<S> {
    _spec: PhantomData<fn() -> S>,
}

impl<S> PoseidonHasher<S> {
    pub fn new() -> Self {
        Self { _spec: PhantomData }
    }
}

impl<S> Default for PoseidonHasher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for PoseidonHasher<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for PoseidonHasher<S> {}

impl<S> fmt::Debug for PoseidonHasher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PoseidonHasher")
    }
}

impl<S: Spec<Fp, WIDTH, RATE>> Compressor<Fp> for PoseidonHasher<S> {
    fn hash1(&self, a: Fp) -> Fp {
        poseidon::Hash::<_, S, ConstantLength<1>, WIDTH, RATE>::init().hash([a])
    }

    fn hash2(&self, a: Fp, b: Fp) -> Fp {
        poseidon::Hash::<_, S, ConstantLength<2>, WIDTH, RATE>::init().hash([a, b])
    }

    fn hash3(&self, a: Fp, b: Fp, c: Fp) -> Fp {
        poseidon::Hash::<_, S, ConstantLength<3>, WIDTH, RATE>::init().hash([a, b, c])
    }
}

/// Map an arbitrary byte string to a field element (Blake2b-512, wide reduction)
pub fn bytes_to_field(bytes: &[u8]) -> Fp {
    use blake2::{Blake2b512, Digest};

    let mut hasher = Blake2b512::new();
    hasher.update(bytes);
    let hash = hasher.finalize();

    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hash);
    Fp::from_uniform_bytes(&wide)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poseidon_deterministic() {
        let h = Hasher::new();
        let a = Fp::from(123u64);
        let b = Fp::from(456u64);

        assert_eq!(h.hash2(a, b), h.hash2(a, b));
        // Order matters for Merkle parents
        assert_ne!(h.hash2(a, b), h.hash2(b, a));
    }

    #[test]
    fn test_arities_are_domain_separated() {
        let h = Hasher::new();
        let a = Fp::from(7u64);

        // Padding with zeros must not collide across arities
        assert_ne!(h.hash1(a), h.hash2(a, Fp::zero()));
        assert_ne!(h.hash2(a, Fp::zero()), h.hash3(a, Fp::zero(), Fp::zero()));
    }

    #[test]
    fn test_matches_poseidon_primitive() {
        let h = Hasher::new();
        let (a, b) = (Fp::from(1u64), Fp::from(2u64));
        let expected =
            poseidon::Hash::<_, P128Pow5T3, ConstantLength<2>, 3, 2>::init().hash([a, b]);
        assert_eq!(h.hash2(a, b), expected);
    }

    #[test]
    fn test_bytes_to_field() {
        assert_eq!(bytes_to_field(b"pool"), bytes_to_field(b"pool"));
        assert_ne!(bytes_to_field(b"pool"), bytes_to_field(b"pool2"));
    }
}
