//! Withdraw relation (reference evaluator)
//!
//! Plain evaluation of the relation the circuit enforces. Given the public
//! inputs and a private witness it either produces the values the ledger
//! records, or reports why no proof could exist:
//!
//! 1. Derive `(commitment, nullifier_hash)` from the existing record
//! 2. Fold the commitment up the sibling path and compare with `state_root`
//! 3. `remaining = existing_value - withdrawn_value`; both `remaining` and
//!    `withdrawn_value` must lie in `[0, 2^value_bits)`
//! 4. Split mode only: the new nullifier must differ from the spent one, and
//!    the remainder is re-committed under `(label, new_nullifier, new_secret)`
//!
//! Field subtraction wraps modulo p, so step 3 is a range check on the
//! canonical integer, never a sign test.

use ff::{PrimeField, PrimeFieldBits};
use tracing::{debug, warn};

use crate::commitment::CommitmentRecord;
use crate::error::RelationError;
use crate::hash::Compressor;
use crate::merkle::{compute_root, field_bits};
use crate::params::RelationParams;

/// Assert that the canonical integer of `value` lies in `[0, 2^bits)`
pub fn range_check<F: PrimeFieldBits>(
    value: &F,
    bits: usize,
    what: &'static str,
) -> Result<(), RelationError> {
    if field_bits(value).iter().skip(bits).any(|b| *b) {
        return Err(RelationError::ValueOutOfRange { what, bits });
    }
    Ok(())
}

/// Public inputs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawPublic<F> {
    pub withdrawn_value: F,
    pub state_root: F,
    pub declared_depth: u64,
}

/// Fresh nullifier and secret for the remainder commitment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitOutput<F> {
    pub new_nullifier: F,
    pub new_secret: F,
}

/// Private inputs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawPrivate<F> {
    pub label: F,
    pub existing_value: F,
    pub existing_nullifier: F,
    pub existing_secret: F,
    /// Exactly `max_depth` entries, zero-padded
    pub siblings: Vec<F>,
    pub state_index: F,
    /// Present for split withdrawals
    pub split: Option<SplitOutput<F>>,
}

impl<F: Copy> WithdrawPrivate<F> {
    pub fn existing_record(&self) -> CommitmentRecord<F> {
        CommitmentRecord {
            value: self.existing_value,
            label: self.label,
            nullifier: self.existing_nullifier,
            secret: self.existing_secret,
        }
    }
}

/// A complete assignment: public inputs plus private witness
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawWitness<F> {
    pub public: WithdrawPublic<F>,
    pub private: WithdrawPrivate<F>,
}

/// Values exposed by a satisfied relation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawOutputs<F> {
    pub nullifier_hash: F,
    pub remaining_value: F,
    /// Remainder commitment, split mode only
    pub new_commitment: Option<F>,
    /// Root folded from the witness
    pub computed_root: F,
}

impl<F: PrimeField> WithdrawOutputs<F> {
    /// Instance vector in circuit order:
    /// `[withdrawn_value, state_root, declared_depth, nullifier_hash, new_commitment?]`
    pub fn public_inputs(&self, public: &WithdrawPublic<F>) -> Vec<F> {
        let mut inputs = vec![
            public.withdrawn_value,
            public.state_root,
            F::from(public.declared_depth),
            self.nullifier_hash,
        ];
        inputs.extend(self.new_commitment);
        inputs
    }
}

/// Run every check except the root comparison and return the outputs.
///
/// Provers use this to learn the root and public outputs a witness implies.
pub fn derive_outputs<F, C>(
    hasher: &C,
    params: &RelationParams,
    public: &WithdrawPublic<F>,
    private: &WithdrawPrivate<F>,
) -> Result<WithdrawOutputs<F>, RelationError>
where
    F: PrimeFieldBits,
    C: Compressor<F>,
{
    let existing = private.existing_record().derive(hasher);

    let computed_root = compute_root(
        hasher,
        params,
        existing.commitment,
        &private.state_index,
        &private.siblings,
        public.declared_depth,
    )?;

    let remaining_value = private.existing_value - public.withdrawn_value;
    range_check(&public.withdrawn_value, params.value_bits, "withdrawn value")?;
    range_check(&remaining_value, params.value_bits, "remaining value")?;

    let new_commitment = match &private.split {
        None => None,
        Some(split) => {
            if split.new_nullifier == private.existing_nullifier {
                return Err(RelationError::NullifierReuse);
            }
            let remainder = CommitmentRecord {
                value: remaining_value,
                label: private.label,
                nullifier: split.new_nullifier,
                secret: split.new_secret,
            };
            Some(remainder.commitment(hasher))
        }
    };

    Ok(WithdrawOutputs {
        nullifier_hash: existing.nullifier_hash,
        remaining_value,
        new_commitment,
        computed_root,
    })
}

/// Evaluate the full relation, including the comparison against `state_root`.
///
/// `RootMismatch` is only reported once every structural check has passed.
pub fn evaluate<F, C>(
    hasher: &C,
    params: &RelationParams,
    public: &WithdrawPublic<F>,
    private: &WithdrawPrivate<F>,
) -> Result<WithdrawOutputs<F>, RelationError>
where
    F: PrimeFieldBits,
    C: Compressor<F>,
{
    let result = derive_outputs(hasher, params, public, private).and_then(|outputs| {
        if outputs.computed_root == public.state_root {
            Ok(outputs)
        } else {
            Err(RelationError::RootMismatch)
        }
    });

    match &result {
        Ok(outputs) => debug!(
            split = outputs.new_commitment.is_some(),
            declared_depth = public.declared_depth,
            "withdraw relation satisfied"
        ),
        Err(err) => warn!(%err, "withdraw relation unsatisfied"),
    }
    result
}

impl<F: PrimeFieldBits> WithdrawWitness<F> {
    pub fn evaluate<C: Compressor<F>>(
        &self,
        hasher: &C,
        params: &RelationParams,
    ) -> Result<WithdrawOutputs<F>, RelationError> {
        evaluate(hasher, params, &self.public, &self.private)
    }

    /// Instance vector for this witness, if it satisfies the relation
    pub fn public_inputs<C: Compressor<F>>(
        &self,
        hasher: &C,
        params: &RelationParams,
    ) -> Result<Vec<F>, RelationError> {
        Ok(self.evaluate(hasher, params)?.public_inputs(&self.public))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamsError;
    use crate::hash::Hasher;
    use crate::tree::LeanImt;
    use halo2_proofs::pasta::Fp;

    fn fp(v: u64) -> Fp {
        Fp::from(v)
    }

    const MAX_DEPTH: usize = 4;

    struct Fixture {
        params: RelationParams,
        public: WithdrawPublic<Fp>,
        private: WithdrawPrivate<Fp>,
    }

    /// Deposit `value` as leaf 2 of a five-leaf tree and withdraw `withdrawn`
    fn fixture(value: u64, withdrawn: u64) -> Fixture {
        let h = Hasher::new();
        let params = RelationParams::with_max_depth(MAX_DEPTH).unwrap();
        let record = CommitmentRecord::new(fp(value), fp(9), fp(1111), fp(2222));

        let mut tree = LeanImt::new(h, MAX_DEPTH);
        tree.insert(fp(501)).unwrap();
        tree.insert(fp(502)).unwrap();
        let index = tree.insert(record.commitment(&h)).unwrap();
        tree.insert(fp(504)).unwrap();
        tree.insert(fp(505)).unwrap();
        let proof = tree.generate_proof(index).unwrap();

        Fixture {
            params,
            public: WithdrawPublic {
                withdrawn_value: fp(withdrawn),
                state_root: tree.root(),
                declared_depth: proof.depth,
            },
            private: WithdrawPrivate {
                label: record.label,
                existing_value: record.value,
                existing_nullifier: record.nullifier,
                existing_secret: record.secret,
                siblings: proof.siblings,
                state_index: fp(index),
                split: None,
            },
        }
    }

    #[test]
    fn test_range_check() {
        assert!(range_check(&fp(0), 8, "v").is_ok());
        assert!(range_check(&fp(255), 8, "v").is_ok());
        assert_eq!(
            range_check(&fp(256), 8, "v"),
            Err(RelationError::ValueOutOfRange { what: "v", bits: 8 })
        );
        // -1 wraps to p - 1
        assert!(range_check(&-fp(1), 128, "v").is_err());
        assert!(range_check(&Fp::from_u128(u128::MAX), 128, "v").is_ok());
    }

    #[test]
    fn test_partial_withdrawal() {
        let h = Hasher::new();
        let f = fixture(100, 60);

        let outputs = evaluate(&h, &f.params, &f.public, &f.private).unwrap();
        assert_eq!(outputs.remaining_value, fp(40));
        assert_eq!(outputs.nullifier_hash, h.hash1(fp(1111)));
        assert_eq!(outputs.new_commitment, None);
        assert_eq!(outputs.computed_root, f.public.state_root);
    }

    #[test]
    fn test_full_withdrawal() {
        let h = Hasher::new();
        let f = fixture(100, 100);

        let outputs = evaluate(&h, &f.params, &f.public, &f.private).unwrap();
        assert_eq!(outputs.remaining_value, Fp::zero());
    }

    #[test]
    fn test_overdraw_fails_range_check() {
        let h = Hasher::new();
        let f = fixture(100, 150);

        assert_eq!(
            evaluate(&h, &f.params, &f.public, &f.private),
            Err(RelationError::ValueOutOfRange {
                what: "remaining value",
                bits: 128,
            })
        );
    }

    #[test]
    fn test_withdrawn_value_window() {
        let h = Hasher::new();
        let mut f = fixture(100, 0);
        // Wrapped withdrawal: remaining = 100 - (p - 1) = 101, but withdrawn is huge
        f.public.withdrawn_value = -fp(1);

        assert_eq!(
            evaluate(&h, &f.params, &f.public, &f.private),
            Err(RelationError::ValueOutOfRange {
                what: "withdrawn value",
                bits: 128,
            })
        );
    }

    #[test]
    fn test_wrong_root_is_mismatch_not_structural() {
        let h = Hasher::new();
        let mut f = fixture(100, 60);
        f.public.state_root = fp(12345);

        assert_eq!(
            evaluate(&h, &f.params, &f.public, &f.private),
            Err(RelationError::RootMismatch)
        );
        // The prover-side derivation still succeeds
        assert!(derive_outputs(&h, &f.params, &f.public, &f.private).is_ok());
    }

    #[test]
    fn test_wrong_index_folds_elsewhere() {
        let h = Hasher::new();
        let mut f = fixture(100, 60);
        f.private.state_index = fp(3);

        assert_eq!(
            evaluate(&h, &f.params, &f.public, &f.private),
            Err(RelationError::RootMismatch)
        );
    }

    #[test]
    fn test_declared_depth_bound() {
        let h = Hasher::new();
        let mut f = fixture(100, 60);
        f.public.declared_depth = MAX_DEPTH as u64 + 1;

        assert!(matches!(
            evaluate(&h, &f.params, &f.public, &f.private),
            Err(RelationError::DepthOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_params_from_file_are_validated() {
        let h = Hasher::new();
        let f = fixture(100, 60);
        let mut params: RelationParams =
            serde_json::from_str(r#"{"maxDepth":4,"depthBits":2,"valueBits":128}"#).unwrap();

        assert_eq!(
            evaluate(&h, &params, &f.public, &f.private),
            Err(RelationError::Params(ParamsError::ComparatorTooNarrow {
                depth: 4,
                bits: 2,
            }))
        );
        assert!(derive_outputs(&h, &params, &f.public, &f.private).is_err());

        params.depth_bits = 3;
        assert!(evaluate(&h, &params, &f.public, &f.private).is_ok());
    }

    #[test]
    fn test_split_withdrawal() {
        let h = Hasher::new();
        let mut f = fixture(100, 60);
        f.private.split = Some(SplitOutput {
            new_nullifier: fp(3333),
            new_secret: fp(4444),
        });

        let outputs = evaluate(&h, &f.params, &f.public, &f.private).unwrap();
        let remainder = CommitmentRecord::new(fp(40), fp(9), fp(3333), fp(4444));
        assert_eq!(outputs.new_commitment, Some(remainder.commitment(&h)));

        let inputs = outputs.public_inputs(&f.public);
        assert_eq!(inputs.len(), 5);
        assert_eq!(inputs[2], fp(f.public.declared_depth));
        assert_eq!(inputs[4], remainder.commitment(&h));
    }

    #[test]
    fn test_split_rejects_nullifier_reuse() {
        let h = Hasher::new();
        for withdrawn in [0u64, 60, 100] {
            let mut f = fixture(100, withdrawn);
            f.private.split = Some(SplitOutput {
                new_nullifier: f.private.existing_nullifier,
                new_secret: fp(4444),
            });

            assert_eq!(
                evaluate(&h, &f.params, &f.public, &f.private),
                Err(RelationError::NullifierReuse)
            );
        }
    }

    #[test]
    fn test_witness_public_inputs() {
        let h = Hasher::new();
        let f = fixture(100, 60);
        let witness = WithdrawWitness {
            public: f.public,
            private: f.private,
        };

        let inputs = witness.public_inputs(&h, &f.params).unwrap();
        assert_eq!(
            inputs,
            vec![fp(60), f.public.state_root, fp(f.public.declared_depth), h.hash1(fp(1111))]
        );
    }
}
