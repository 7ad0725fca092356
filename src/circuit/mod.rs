//! Halo2 circuit for privacy-pool withdrawals
//!
//! This module contains the zero-knowledge circuit that proves:
//! 1. The spent deposit's commitment is a leaf of the state tree (LeanIMT
//!    inclusion, folded through `max_depth` levels)
//! 2. The nullifier hash is derived from the deposit's nullifier
//! 3. The withdrawn value and the remainder are both non-negative
//! 4. In split mode, the remainder is re-committed under a fresh nullifier
//!
//! Circuit Public Inputs:
//! - withdrawn_value
//! - state_root
//! - declared_depth
//! - nullifier_hash
//! - new_commitment (split mode only)
//!
//! Circuit Private Inputs (Witness):
//! - Existing record (value, label, nullifier, secret)
//! - Leaf index and `max_depth` zero-padded siblings
//! - New nullifier and secret (split mode only)

pub mod gadgets;
pub mod withdraw;

pub use withdraw::{WithdrawCircuit, WithdrawInstance, WithdrawMode};
