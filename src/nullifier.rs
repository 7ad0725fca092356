//! Nullifier hashes
//!
//! The nullifier hash `H1(nullifier)` is revealed when a commitment is spent.
//! The ledger records it so the same commitment cannot be withdrawn twice.
//! It reveals nothing about which leaf was spent.

use ff::PrimeField;
use halo2_proofs::pasta::Fp;
use std::collections::HashSet;
use std::fmt;

use crate::commitment::CommitmentRecord;
use crate::hash::Compressor;

/// A published nullifier hash
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NullifierHash {
    inner: Fp,
}

// Fp doesn't implement Hash
impl std::hash::Hash for NullifierHash {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl NullifierHash {
    pub fn derive<C: Compressor<Fp>>(record: &CommitmentRecord<Fp>, hasher: &C) -> Self {
        Self {
            inner: record.nullifier_hash(hasher),
        }
    }

    pub fn from_field(f: Fp) -> Self {
        Self { inner: f }
    }

    pub fn to_field(&self) -> Fp {
        self.inner
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_repr()
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        Option::from(Fp::from_repr(*bytes)).map(|inner| Self { inner })
    }
}

impl fmt::Debug for NullifierHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "NullifierHash({:02x}{:02x}...)", bytes[0], bytes[1])
    }
}

/// Spent nullifier hashes
#[derive(Default, Clone, Debug)]
pub struct NullifierSet {
    spent: HashSet<NullifierHash>,
}

impl NullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, nf: &NullifierHash) -> bool {
        self.spent.contains(nf)
    }

    /// Mark as spent. Returns false if already present (double-spend attempt)
    pub fn insert(&mut self, nf: NullifierHash) -> bool {
        self.spent.insert(nf)
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}
