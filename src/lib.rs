//! Privacy-pool withdrawal relation
//!
//! Proves, in Halo2, that a withdrawal spends a deposit recorded in the pool:
//! - LeanIMT inclusion of the deposit's commitment, folded through a fixed
//!   `max_depth` with zero siblings marking absent nodes
//! - Poseidon commitment and nullifier-hash derivation
//! - Non-negativity of the withdrawn value and the remainder
//! - Optional split mode that re-commits the remainder under a fresh nullifier
//!
//! The same relation is available as a plain evaluator ([`withdraw`]) and as a
//! circuit ([`circuit`]). Both agree on every witness.

pub mod params;
pub mod error;
pub mod hash;
pub mod commitment;
pub mod nullifier;
pub mod merkle;
pub mod tree;
pub mod withdraw;
pub mod circuit;
pub mod coin;
pub mod ledger;

// Re-exports for convenience
pub use params::{RelationParams, CIRCUIT_K};
pub use error::{InputError, LedgerError, ParamsError, RelationError, TreeError};
pub use hash::{Compressor, Hasher};
pub use commitment::{Commitment, CommitmentRecord};
pub use nullifier::{NullifierHash, NullifierSet};
pub use merkle::MerkleProof;
pub use tree::LeanImt;
pub use withdraw::{SplitOutput, WithdrawOutputs, WithdrawPrivate, WithdrawPublic, WithdrawWitness};
pub use circuit::{WithdrawCircuit, WithdrawInstance, WithdrawMode};
pub use coin::{build_withdrawal, Coin, CoinFile, StateFile, WithdrawalInputs};
pub use ledger::Ledger;
