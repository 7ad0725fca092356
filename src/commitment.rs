//! Commitment scheme
//!
//! A deposit is a record `(value, label, nullifier, secret)`. Two chained
//! compressions turn it into the leaf stored in the tree:
//!
//! ```text
//! nullifier_hash = H1(nullifier)
//! precommitment  = H2(nullifier, secret)
//! commitment     = H3(value, label, precommitment)
//! ```
//!
//! The nullifier hash depends on the nullifier alone, so it can be published
//! at withdrawal time without revealing the secret.

use ff::{Field, PrimeField};
use halo2_proofs::pasta::Fp;
use rand::{CryptoRng, RngCore};
use std::fmt;

use crate::hash::Compressor;

/// The private contents of a deposit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitmentRecord<F> {
    pub value: F,
    /// Opaque per-pool/per-deposit tag
    pub label: F,
    pub nullifier: F,
    pub secret: F,
}

/// Values derived from a record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DerivedCommitment<F> {
    pub commitment: F,
    pub nullifier_hash: F,
}

impl<F: Field> CommitmentRecord<F> {
    pub fn new(value: F, label: F, nullifier: F, secret: F) -> Self {
        Self {
            value,
            label,
            nullifier,
            secret,
        }
    }

    /// Record with fresh random nullifier and secret
    pub fn random<R: RngCore + CryptoRng>(value: F, label: F, rng: &mut R) -> Self {
        Self {
            value,
            label,
            nullifier: F::random(&mut *rng),
            secret: F::random(&mut *rng),
        }
    }

    pub fn nullifier_hash<C: Compressor<F>>(&self, hasher: &C) -> F {
        hasher.hash1(self.nullifier)
    }

    pub fn precommitment<C: Compressor<F>>(&self, hasher: &C) -> F {
        hasher.hash2(self.nullifier, self.secret)
    }

    pub fn commitment<C: Compressor<F>>(&self, hasher: &C) -> F {
        hasher.hash3(self.value, self.label, self.precommitment(hasher))
    }

    pub fn derive<C: Compressor<F>>(&self, hasher: &C) -> DerivedCommitment<F> {
        DerivedCommitment {
            commitment: self.commitment(hasher),
            nullifier_hash: self.nullifier_hash(hasher),
        }
    }
}

/// A commitment - the public leaf representing a deposit
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    inner: Fp,
}

impl Commitment {
    /// Derive the commitment of a record
    pub fn derive<C: Compressor<Fp>>(record: &CommitmentRecord<Fp>, hasher: &C) -> Self {
        Self {
            inner: record.commitment(hasher),
        }
    }

    pub fn from_field(f: Fp) -> Self {
        Self { inner: f }
    }

    pub fn to_field(&self) -> Fp {
        self.inner
    }

    /// Canonical little-endian encoding
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_repr()
    }

    /// Rejects non-canonical encodings
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        Option::from(Fp::from_repr(*bytes)).map(|inner| Self { inner })
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "Commitment({:02x}{:02x}...)", bytes[0], bytes[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hasher;
    use rand::rngs::OsRng;

    fn record() -> CommitmentRecord<Fp> {
        CommitmentRecord::new(
            Fp::from(1000u64),
            Fp::from(77u64),
            Fp::from(12345u64),
            Fp::from(67890u64),
        )
    }

    #[test]
    fn test_commitment_deterministic() {
        let h = Hasher::new();
        let r = record();

        assert_eq!(r.derive(&h), r.derive(&h));
        assert_eq!(Commitment::derive(&r, &h), Commitment::derive(&r, &h));
    }

    #[test]
    fn test_two_stage_derivation() {
        let h = Hasher::new();
        let r = record();

        let pre = h.hash2(r.nullifier, r.secret);
        assert_eq!(r.precommitment(&h), pre);
        assert_eq!(r.commitment(&h), h.hash3(r.value, r.label, pre));
        assert_eq!(r.nullifier_hash(&h), h.hash1(r.nullifier));
    }

    #[test]
    fn test_secret_changes_commitment_not_nullifier_hash() {
        let h = Hasher::new();
        let r1 = record();
        let r2 = CommitmentRecord {
            secret: Fp::from(1u64),
            ..r1
        };

        let d1 = r1.derive(&h);
        let d2 = r2.derive(&h);

        assert_ne!(d1.commitment, d2.commitment);
        assert_eq!(d1.nullifier_hash, d2.nullifier_hash);
    }

    #[test]
    fn test_value_and_label_bound() {
        let h = Hasher::new();
        let r = record();

        let other_value = CommitmentRecord { value: Fp::from(999u64), ..r };
        let other_label = CommitmentRecord { label: Fp::from(78u64), ..r };

        assert_ne!(r.commitment(&h), other_value.commitment(&h));
        assert_ne!(r.commitment(&h), other_label.commitment(&h));
    }

    #[test]
    fn test_random_records_differ() {
        let h = Hasher::new();
        let r1 = CommitmentRecord::random(Fp::from(5u64), Fp::from(1u64), &mut OsRng);
        let r2 = CommitmentRecord::random(Fp::from(5u64), Fp::from(1u64), &mut OsRng);

        assert_ne!(r1.derive(&h), r2.derive(&h));
    }

    #[test]
    fn test_commitment_serialization() {
        let h = Hasher::new();
        let cm = Commitment::derive(&record(), &h);

        let recovered = Commitment::from_bytes(&cm.to_bytes()).unwrap();
        assert_eq!(cm, recovered);
        assert!(cm.to_hex().starts_with("0x"));

        // Modulus-sized encodings are rejected
        assert!(Commitment::from_bytes(&[0xff; 32]).is_none());
    }
}
