//! In-memory pool ledger
//!
//! Holds what a pool contract keeps on chain: the LeanIMT of deposit
//! commitments, a window of recent roots and the set of spent nullifier
//! hashes. A withdrawal is accepted only if:
//! - its state root is one of the recent roots
//! - its nullifier hash has not been spent
//! - the proof verifies
//!
//! On acceptance the nullifier hash is recorded and, for split withdrawals,
//! the remainder commitment is inserted as a new leaf.

use std::collections::VecDeque;

use halo2_proofs::pasta::Fp;
use tracing::{info, warn};

use crate::circuit::WithdrawInstance;
use crate::commitment::Commitment;
use crate::error::LedgerError;
use crate::hash::Compressor;
use crate::nullifier::{NullifierHash, NullifierSet};
use crate::tree::LeanImt;

/// Number of recent roots a withdrawal may reference
pub const ROOT_HISTORY_SIZE: usize = 30;

#[derive(Clone, Debug)]
pub struct Ledger<C> {
    tree: LeanImt<Fp, C>,
    roots: VecDeque<Fp>,
    history: usize,
    nullifiers: NullifierSet,
}

impl<C: Compressor<Fp>> Ledger<C> {
    pub fn new(hasher: C, max_depth: usize) -> Self {
        Self::with_history(hasher, max_depth, ROOT_HISTORY_SIZE)
    }

    pub fn with_history(hasher: C, max_depth: usize, history: usize) -> Self {
        Self {
            tree: LeanImt::new(hasher, max_depth),
            roots: VecDeque::with_capacity(history),
            history: history.max(1),
            nullifiers: NullifierSet::new(),
        }
    }

    pub fn tree(&self) -> &LeanImt<Fp, C> {
        &self.tree
    }

    pub fn root(&self) -> Fp {
        self.tree.root()
    }

    pub fn is_known_root(&self, root: &Fp) -> bool {
        self.roots.contains(root)
    }

    pub fn is_spent(&self, nullifier_hash: &NullifierHash) -> bool {
        self.nullifiers.contains(nullifier_hash)
    }

    /// Insert a deposit commitment and return its leaf index
    pub fn deposit(&mut self, commitment: Commitment) -> Result<u64, LedgerError> {
        let index = self.insert(commitment)?;
        info!(index, root = ?Commitment::from_field(self.root()), "deposit");
        Ok(index)
    }

    /// Check and apply a withdrawal. `verify` checks the proof for `instance`.
    ///
    /// Returns the leaf index of the remainder commitment in split mode.
    pub fn accept_withdrawal(
        &mut self,
        instance: &WithdrawInstance,
        verify: impl FnOnce(&WithdrawInstance) -> bool,
    ) -> Result<Option<u64>, LedgerError> {
        if !self.is_known_root(&instance.state_root) {
            warn!("withdrawal against unknown root");
            return Err(LedgerError::UnknownRoot);
        }
        if self.is_spent(&instance.nullifier_hash) {
            warn!(nullifier_hash = ?instance.nullifier_hash, "double spend attempt");
            return Err(LedgerError::NullifierSpent);
        }
        if !verify(instance) {
            warn!("withdrawal proof rejected");
            return Err(LedgerError::ProofRejected);
        }

        // Insert the remainder first so a full tree leaves the nullifier unspent
        let remainder = instance.new_commitment.map(|cm| self.insert(cm)).transpose()?;
        self.nullifiers.insert(instance.nullifier_hash);

        info!(
            nullifier_hash = ?instance.nullifier_hash,
            remainder_index = ?remainder,
            spent = self.nullifiers.len(),
            "withdrawal accepted"
        );
        Ok(remainder)
    }

    fn insert(&mut self, commitment: Commitment) -> Result<u64, LedgerError> {
        let index = self.tree.insert(commitment.to_field())?;
        if self.roots.len() == self.history {
            self.roots.pop_front();
        }
        self.roots.push_back(self.tree.root());
        Ok(index)
    }
}
