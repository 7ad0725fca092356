//! Withdraw circuit
//!
//! Proves knowledge of a deposit record whose commitment is a leaf of the
//! state tree, and that `withdrawn_value` can be taken out of it:
//! 1. `nullifier_hash = H1(nullifier)` and
//!    `commitment = H3(value, label, H2(nullifier, secret))`
//! 2. The commitment folds through `max_depth` levels to `state_root`
//! 3. `declared_depth <= max_depth` through a `depth_bits` comparator
//! 4. `withdrawn_value` and `value - withdrawn_value` fit in `value_bits`
//! 5. Split mode: `new_nullifier != nullifier` and the remainder is
//!    re-committed under the same label
//!
//! Public inputs live in one instance column, in the order given by the
//! row constants below.

use halo2_gadgets::poseidon::{Pow5Chip, Pow5Config};
use halo2_proofs::{
    circuit::{Layouter, SimpleFloorPlanner, Value},
    pasta::Fp,
    plonk::{Advice, Circuit, Column, ConstraintSystem, Error, Fixed, Instance},
};
use tracing::{debug, warn};

use super::gadgets::{
    poseidon_hash, ArithmeticChip, ArithmeticConfig, Cell, DecomposeChip, DecomposeConfig,
    MerkleChip, MerkleConfig,
};
use crate::commitment::Commitment;
use crate::error::RelationError;
use crate::hash::{Compressor, PoseidonSpec, RATE, WIDTH};
use crate::nullifier::NullifierHash;
use crate::params::RelationParams;
use crate::withdraw::{WithdrawOutputs, WithdrawPublic, WithdrawWitness};

/// Instance row of the withdrawn value
pub const WITHDRAWN_VALUE: usize = 0;
/// Instance row of the state root
pub const STATE_ROOT: usize = 1;
/// Instance row of the declared tree depth
pub const DECLARED_DEPTH: usize = 2;
/// Instance row of the spent nullifier hash
pub const NULLIFIER_HASH: usize = 3;
/// Instance row of the remainder commitment (split mode only)
pub const NEW_COMMITMENT: usize = 4;

/// Whether the withdrawal re-commits the remainder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawMode {
    Full,
    Split,
}

/// Public inputs to the circuit (instance)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawInstance {
    pub withdrawn_value: Fp,
    pub state_root: Fp,
    pub declared_depth: u64,
    pub nullifier_hash: NullifierHash,
    /// Present in split mode
    pub new_commitment: Option<Commitment>,
}

impl WithdrawInstance {
    pub fn from_outputs(public: &WithdrawPublic<Fp>, outputs: &WithdrawOutputs<Fp>) -> Self {
        Self {
            withdrawn_value: public.withdrawn_value,
            state_root: public.state_root,
            declared_depth: public.declared_depth,
            nullifier_hash: NullifierHash::from_field(outputs.nullifier_hash),
            new_commitment: outputs.new_commitment.map(Commitment::from_field),
        }
    }

    /// Evaluate `witness` off-circuit and collect the public inputs it implies
    pub fn from_witness<C: Compressor<Fp>>(
        hasher: &C,
        params: &RelationParams,
        witness: &WithdrawWitness<Fp>,
    ) -> Result<Self, RelationError> {
        let outputs = witness.evaluate(hasher, params)?;
        Ok(Self::from_outputs(&witness.public, &outputs))
    }

    pub fn mode(&self) -> WithdrawMode {
        if self.new_commitment.is_some() {
            WithdrawMode::Split
        } else {
            WithdrawMode::Full
        }
    }

    /// Convert to field elements for circuit verification
    pub fn to_instance(&self) -> Vec<Vec<Fp>> {
        let mut column = vec![
            self.withdrawn_value,
            self.state_root,
            Fp::from(self.declared_depth),
            self.nullifier_hash.to_field(),
        ];
        column.extend(self.new_commitment.map(|cm| cm.to_field()));
        vec![column]
    }
}

/// Circuit configuration
#[derive(Clone, Debug)]
pub struct WithdrawConfig {
    /// `advice[0..3]` doubles as the Poseidon state, `advice[3]` as its
    /// partial S-box column
    advice: [Column<Advice>; 5],
    instance: Column<Instance>,
    poseidon: Pow5Config<Fp, WIDTH, RATE>,
    decompose: DecomposeConfig,
    merkle: MerkleConfig,
    arithmetic: ArithmeticConfig,
}

/// The withdraw circuit
#[derive(Clone, Debug)]
pub struct WithdrawCircuit {
    pub params: RelationParams,
    pub mode: WithdrawMode,
    /// Private inputs; `None` for key generation
    pub witness: Option<WithdrawWitness<Fp>>,
}

impl WithdrawCircuit {
    /// Circuit for a concrete witness. The mode follows `witness.private.split`.
    pub fn new(
        params: RelationParams,
        witness: WithdrawWitness<Fp>,
    ) -> Result<Self, RelationError> {
        params.validate()?;
        let siblings = witness.private.siblings.len();
        if siblings != params.max_depth {
            return Err(RelationError::SiblingCount {
                expected: params.max_depth,
                actual: siblings,
            });
        }

        let mode = if witness.private.split.is_some() {
            WithdrawMode::Split
        } else {
            WithdrawMode::Full
        };
        debug!(?mode, max_depth = params.max_depth, "built withdraw circuit");

        Ok(Self {
            params,
            mode,
            witness: Some(witness),
        })
    }

    /// Circuit without witness (for key generation)
    pub fn empty(params: RelationParams, mode: WithdrawMode) -> Self {
        Self {
            params,
            mode,
            witness: None,
        }
    }

    fn witness_value(&self, f: impl FnOnce(&WithdrawWitness<Fp>) -> Option<Fp>) -> Value<Fp> {
        self.witness
            .as_ref()
            .and_then(f)
            .map_or_else(Value::unknown, Value::known)
    }
}

impl Circuit<Fp> for WithdrawCircuit {
    type Config = WithdrawConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::empty(self.params, self.mode)
    }

    fn configure(meta: &mut ConstraintSystem<Fp>) -> Self::Config {
        let advice: [Column<Advice>; 5] = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        for col in &advice {
            meta.enable_equality(*col);
        }

        let instance = meta.instance_column();
        meta.enable_equality(instance);

        let rc_a: [Column<Fixed>; WIDTH] =
            [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        let rc_b: [Column<Fixed>; WIDTH] =
            [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];

        // Constants: Poseidon padding, running-sum seed, max_depth
        meta.enable_constant(rc_b[0]);

        let poseidon = Pow5Chip::configure::<PoseidonSpec>(
            meta,
            [advice[0], advice[1], advice[2]],
            advice[3],
            rc_a,
            rc_b,
        );

        let decompose = DecomposeConfig::configure(meta, advice[3], advice[4]);
        let merkle = MerkleConfig::configure(meta, advice, poseidon.clone());
        let arithmetic = ArithmeticConfig::configure(meta, [advice[0], advice[1], advice[2]]);

        WithdrawConfig {
            advice,
            instance,
            poseidon,
            decompose,
            merkle,
            arithmetic,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<Fp>,
    ) -> Result<(), Error> {
        let params = self.params;
        if let Err(e) = params.validate() {
            warn!(error = %e, "refusing to lay out withdraw circuit");
            return Err(Error::Synthesis);
        }
        let poseidon = &config.poseidon;
        let decompose = DecomposeChip::construct(config.decompose.clone());
        let merkle = MerkleChip::construct(config.merkle.clone());
        let arithmetic = ArithmeticChip::construct(config.arithmetic.clone());

        // ===== Public inputs read into advice =====
        let (withdrawn_value, declared_depth) = layouter.assign_region(
            || "load public inputs",
            |mut region| {
                let withdrawn = region.assign_advice_from_instance(
                    || "withdrawn value",
                    config.instance,
                    WITHDRAWN_VALUE,
                    config.advice[0],
                    0,
                )?;
                let depth = region.assign_advice_from_instance(
                    || "declared depth",
                    config.instance,
                    DECLARED_DEPTH,
                    config.advice[1],
                    0,
                )?;
                Ok((withdrawn, depth))
            },
        )?;

        // ===== Existing record and position =====
        let (value, label, nullifier, secret, index) = layouter.assign_region(
            || "load existing record",
            |mut region| {
                let value = region.assign_advice(
                    || "existing value",
                    config.advice[0],
                    0,
                    || self.witness_value(|w| Some(w.private.existing_value)),
                )?;
                let label = region.assign_advice(
                    || "label",
                    config.advice[1],
                    0,
                    || self.witness_value(|w| Some(w.private.label)),
                )?;
                let nullifier = region.assign_advice(
                    || "existing nullifier",
                    config.advice[2],
                    0,
                    || self.witness_value(|w| Some(w.private.existing_nullifier)),
                )?;
                let secret = region.assign_advice(
                    || "existing secret",
                    config.advice[3],
                    0,
                    || self.witness_value(|w| Some(w.private.existing_secret)),
                )?;
                let index = region.assign_advice(
                    || "state index",
                    config.advice[4],
                    0,
                    || self.witness_value(|w| Some(w.private.state_index)),
                )?;
                Ok((value, label, nullifier, secret, index))
            },
        )?;

        let siblings: Vec<Cell> = layouter.assign_region(
            || "load siblings",
            |mut region| {
                (0..params.max_depth)
                    .map(|i| {
                        region.assign_advice(
                            || format!("sibling {}", i),
                            config.advice[i % 5],
                            i / 5,
                            || self.witness_value(|w| w.private.siblings.get(i).copied()),
                        )
                    })
                    .collect()
            },
        )?;

        // ===== Commitment scheme =====
        let nullifier_hash = poseidon_hash(
            poseidon,
            layouter.namespace(|| "nullifier hash"),
            [nullifier.clone()],
        )?;
        let precommitment = poseidon_hash(
            poseidon,
            layouter.namespace(|| "precommitment"),
            [nullifier.clone(), secret],
        )?;
        let commitment = poseidon_hash(
            poseidon,
            layouter.namespace(|| "commitment"),
            [value.clone(), label.clone(), precommitment],
        )?;

        // ===== Merkle inclusion =====
        let path_bits =
            decompose.decompose(layouter.namespace(|| "state index"), &index, params.max_depth)?;
        let root = merkle.compute_root(
            layouter.namespace(|| "merkle fold"),
            commitment,
            &path_bits,
            &siblings,
        )?;
        layouter.constrain_instance(root.cell(), config.instance, STATE_ROOT)?;

        // ===== Depth bound =====
        // declared_depth and max_depth - declared_depth both in [0, 2^depth_bits)
        decompose.range_check(
            layouter.namespace(|| "declared depth"),
            &declared_depth,
            params.depth_bits,
        )?;
        let headroom = arithmetic.subtract_from_constant(
            layouter.namespace(|| "depth headroom"),
            Fp::from(params.max_depth as u64),
            &declared_depth,
        )?;
        decompose.range_check(
            layouter.namespace(|| "depth headroom range"),
            &headroom,
            params.depth_bits,
        )?;

        // ===== Value balance =====
        decompose.range_check(
            layouter.namespace(|| "withdrawn value"),
            &withdrawn_value,
            params.value_bits,
        )?;
        let remaining = arithmetic.subtract(
            layouter.namespace(|| "remaining value"),
            &value,
            &withdrawn_value,
        )?;
        decompose.range_check(
            layouter.namespace(|| "remaining value range"),
            &remaining,
            params.value_bits,
        )?;

        layouter.constrain_instance(nullifier_hash.cell(), config.instance, NULLIFIER_HASH)?;

        if self.mode == WithdrawMode::Split {
            let (new_nullifier, new_secret) = layouter.assign_region(
                || "load split output",
                |mut region| {
                    let new_nullifier = region.assign_advice(
                        || "new nullifier",
                        config.advice[0],
                        0,
                        || self.witness_value(|w| w.private.split.map(|s| s.new_nullifier)),
                    )?;
                    let new_secret = region.assign_advice(
                        || "new secret",
                        config.advice[1],
                        0,
                        || self.witness_value(|w| w.private.split.map(|s| s.new_secret)),
                    )?;
                    Ok((new_nullifier, new_secret))
                },
            )?;

            arithmetic.assert_distinct(
                layouter.namespace(|| "fresh nullifier"),
                &new_nullifier,
                &nullifier,
            )?;

            let new_precommitment = poseidon_hash(
                poseidon,
                layouter.namespace(|| "new precommitment"),
                [new_nullifier, new_secret],
            )?;
            let new_commitment = poseidon_hash(
                poseidon,
                layouter.namespace(|| "new commitment"),
                [remaining, label, new_precommitment],
            )?;
            layouter.constrain_instance(new_commitment.cell(), config.instance, NEW_COMMITMENT)?;
        }

        Ok(())
    }
}
