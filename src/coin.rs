//! Coins and proof-input files
//!
//! A coin is a deposit record plus its commitment. Coins, pool state and
//! withdrawal inputs are exchanged as JSON with field elements written as
//! decimal strings of their canonical integers:
//!
//! ```json
//! { "commitments": ["123...", "456..."], "scope": "my_pool" }
//! ```
//!
//! [`build_withdrawal`] rebuilds the LeanIMT from a state file, locates the
//! coin's commitment and emits the inputs for the withdraw relation.

use ff::PrimeField;
use halo2_proofs::pasta::Fp;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commitment::{Commitment, CommitmentRecord};
use crate::error::{InputError, TreeError};
use crate::hash::{bytes_to_field, Compressor};
use crate::params::RelationParams;
use crate::tree::LeanImt;
use crate::withdraw::{SplitOutput, WithdrawPrivate, WithdrawPublic, WithdrawWitness};

/// Decimal string of the canonical integer of `f`
pub fn to_decimal(f: &Fp) -> String {
    BigUint::from_bytes_le(f.to_repr().as_ref()).to_string()
}

/// Parse a decimal string into a field element. Integers `>= p` are rejected
/// rather than reduced.
pub fn parse_field(field: &str, value: &str) -> Result<Fp, InputError> {
    let invalid = || InputError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    };

    let n: BigUint = value.parse().map_err(|_| invalid())?;
    let bytes = n.to_bytes_le();
    if bytes.len() > 32 {
        return Err(invalid());
    }

    let mut repr = [0u8; 32];
    repr[..bytes.len()].copy_from_slice(&bytes);
    Option::from(Fp::from_repr(repr)).ok_or_else(invalid)
}

fn parse_u64(field: &str, value: &str) -> Result<u64, InputError> {
    value.parse().map_err(|_| InputError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// `label = H2(scope, nonce)`, with both byte strings mapped into the field
pub fn generate_label<C: Compressor<Fp>>(hasher: &C, scope: &[u8], nonce: &[u8; 32]) -> Fp {
    hasher.hash2(bytes_to_field(scope), bytes_to_field(nonce))
}

/// A deposit record and its commitment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coin {
    pub record: CommitmentRecord<Fp>,
    pub commitment: Commitment,
}

impl Coin {
    pub fn from_record<C: Compressor<Fp>>(hasher: &C, record: CommitmentRecord<Fp>) -> Self {
        Self {
            record,
            commitment: Commitment::derive(&record, hasher),
        }
    }

    /// Fresh coin in `scope` with a random label nonce, nullifier and secret
    pub fn generate<C, R>(hasher: &C, scope: &[u8], value: Fp, rng: &mut R) -> Self
    where
        C: Compressor<Fp>,
        R: RngCore + CryptoRng,
    {
        let mut nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);
        let label = generate_label(hasher, scope, &nonce);

        let coin = Self::from_record(hasher, CommitmentRecord::random(value, label, rng));
        debug!(commitment = ?coin.commitment, "generated coin");
        coin
    }

    pub fn to_file(&self) -> CoinFile {
        CoinFile {
            coin: CoinData {
                value: to_decimal(&self.record.value),
                nullifier: to_decimal(&self.record.nullifier),
                secret: to_decimal(&self.record.secret),
                label: to_decimal(&self.record.label),
                commitment: to_decimal(&self.commitment.to_field()),
            },
            commitment_hex: self.commitment.to_hex(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinData {
    pub value: String,
    pub nullifier: String,
    pub secret: String,
    pub label: String,
    pub commitment: String,
}

/// A saved coin
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinFile {
    pub coin: CoinData,
    pub commitment_hex: String,
}

impl CoinFile {
    /// Parse the coin and check that its commitment matches its contents
    pub fn to_coin<C: Compressor<Fp>>(&self, hasher: &C) -> Result<Coin, InputError> {
        let record = CommitmentRecord::new(
            parse_field("value", &self.coin.value)?,
            parse_field("label", &self.coin.label)?,
            parse_field("nullifier", &self.coin.nullifier)?,
            parse_field("secret", &self.coin.secret)?,
        );
        let claimed = parse_field("commitment", &self.coin.commitment)?;

        let coin = Coin::from_record(hasher, record);
        if coin.commitment.to_field() != claimed {
            return Err(InputError::CommitmentMismatch);
        }
        Ok(coin)
    }
}

/// The pool's commitments in insertion order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub commitments: Vec<String>,
    pub scope: String,
}

impl StateFile {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            commitments: Vec::new(),
            scope: scope.into(),
        }
    }

    pub fn push(&mut self, commitment: &Commitment) {
        self.commitments.push(to_decimal(&commitment.to_field()));
    }

    pub fn leaves(&self) -> Result<Vec<Fp>, InputError> {
        self.commitments
            .iter()
            .enumerate()
            .map(|(i, c)| parse_field(&format!("commitments[{}]", i), c))
            .collect()
    }
}

/// Inputs for one withdrawal proof
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalInputs {
    pub withdrawn_value: String,
    pub label: String,
    pub value: String,
    pub nullifier: String,
    pub secret: String,
    pub state_root: String,
    pub state_index: String,
    pub state_siblings: Vec<String>,
    pub state_depth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_nullifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_secret: Option<String>,
}

impl WithdrawalInputs {
    /// Re-commit the remainder under a fresh nullifier and secret
    pub fn with_split(mut self, split: SplitOutput<Fp>) -> Self {
        self.new_nullifier = Some(to_decimal(&split.new_nullifier));
        self.new_secret = Some(to_decimal(&split.new_secret));
        self
    }

    pub fn to_witness(&self) -> Result<WithdrawWitness<Fp>, InputError> {
        let siblings = self
            .state_siblings
            .iter()
            .enumerate()
            .map(|(i, s)| parse_field(&format!("stateSiblings[{}]", i), s))
            .collect::<Result<Vec<_>, _>>()?;

        let split = match (&self.new_nullifier, &self.new_secret) {
            (Some(nullifier), Some(secret)) => Some(SplitOutput {
                new_nullifier: parse_field("newNullifier", nullifier)?,
                new_secret: parse_field("newSecret", secret)?,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(InputError::InvalidField {
                    field: "newSecret".to_string(),
                    value: String::new(),
                })
            }
            (None, Some(_)) => {
                return Err(InputError::InvalidField {
                    field: "newNullifier".to_string(),
                    value: String::new(),
                })
            }
        };

        Ok(WithdrawWitness {
            public: WithdrawPublic {
                withdrawn_value: parse_field("withdrawnValue", &self.withdrawn_value)?,
                state_root: parse_field("stateRoot", &self.state_root)?,
                declared_depth: parse_u64("stateDepth", &self.state_depth)?,
            },
            private: WithdrawPrivate {
                label: parse_field("label", &self.label)?,
                existing_value: parse_field("value", &self.value)?,
                existing_nullifier: parse_field("nullifier", &self.nullifier)?,
                existing_secret: parse_field("secret", &self.secret)?,
                siblings,
                state_index: parse_field("stateIndex", &self.state_index)?,
                split,
            },
        })
    }
}

/// Build withdrawal inputs for `coin` against the pool described by `state`.
///
/// The inputs are evaluated against the relation before they are returned,
/// so an overdraw or a coin missing from the state fails here.
pub fn build_withdrawal<C>(
    hasher: &C,
    params: &RelationParams,
    coin: &Coin,
    state: &StateFile,
    withdrawn_value: Fp,
) -> Result<WithdrawalInputs, InputError>
where
    C: Compressor<Fp> + Clone,
{
    params.validate()?;

    let tree = LeanImt::from_leaves(hasher.clone(), params.max_depth, &state.leaves()?)?;
    let index = tree
        .index_of(&coin.commitment.to_field())
        .ok_or(TreeError::LeafNotFound)?;
    let proof = tree.generate_proof(index)?;

    let record = &coin.record;
    let inputs = WithdrawalInputs {
        withdrawn_value: to_decimal(&withdrawn_value),
        label: to_decimal(&record.label),
        value: to_decimal(&record.value),
        nullifier: to_decimal(&record.nullifier),
        secret: to_decimal(&record.secret),
        state_root: to_decimal(&tree.root()),
        state_index: index.to_string(),
        state_siblings: proof.siblings.iter().map(to_decimal).collect(),
        state_depth: proof.depth.to_string(),
        new_nullifier: None,
        new_secret: None,
    };

    inputs.to_witness()?.evaluate(hasher, params)?;
    info!(
        index,
        depth = proof.depth,
        leaves = tree.size(),
        "built withdrawal inputs"
    );
    Ok(inputs)
}
