//! Circuit gadgets for the withdraw relation
//!
//! - [`DecomposeChip`]: running-sum bit decomposition. Serves as the index
//!   decoder (bits are returned) and as the range check (bits are dropped).
//! - [`MerkleChip`]: one level of the inclusion fold, a path-select gate, a
//!   Poseidon compression and a hash-or-propagate gate.
//! - [`ArithmeticChip`]: subtraction and non-equality gates.
//! - [`poseidon_hash`]: constant-length Poseidon over the shared `Pow5Chip`.

use ff::{Field, PrimeFieldBits};
use halo2_gadgets::poseidon::{primitives::ConstantLength, Hash, Pow5Chip, Pow5Config};
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, Value},
    pasta::Fp,
    plonk::{Advice, Column, ConstraintSystem, Error, Expression, Selector},
    poly::Rotation,
};

use crate::hash::{PoseidonSpec, RATE, WIDTH};

pub type Cell = AssignedCell<Fp, Fp>;

/// Hash `L` assigned cells with the Poseidon chip
pub fn poseidon_hash<const L: usize>(
    config: &Pow5Config<Fp, WIDTH, RATE>,
    mut layouter: impl Layouter<Fp>,
    message: [Cell; L],
) -> Result<Cell, Error> {
    let chip = Pow5Chip::construct(config.clone());
    let hasher = Hash::<_, _, PoseidonSpec, ConstantLength<L>, WIDTH, RATE>::init(
        chip,
        layouter.namespace(|| "poseidon init"),
    )?;
    hasher.hash(layouter.namespace(|| "poseidon hash"), message)
}

fn bit_value(bit: bool) -> Fp {
    if bit {
        Fp::one()
    } else {
        Fp::zero()
    }
}

/// Configuration for running-sum decomposition
#[derive(Clone, Debug)]
pub struct DecomposeConfig {
    /// One bit per row, most significant first
    pub bit: Column<Advice>,
    /// Running sum; `acc[r + 1] = 2 * acc[r] + bit[r]`
    pub acc: Column<Advice>,
    pub selector: Selector,
}

impl DecomposeConfig {
    pub fn configure(
        meta: &mut ConstraintSystem<Fp>,
        bit: Column<Advice>,
        acc: Column<Advice>,
    ) -> Self {
        let selector = meta.selector();

        meta.create_gate("running sum", |meta| {
            let s = meta.query_selector(selector);
            let bit = meta.query_advice(bit, Rotation::cur());
            let acc_cur = meta.query_advice(acc, Rotation::cur());
            let acc_next = meta.query_advice(acc, Rotation::next());
            let one = Expression::Constant(Fp::one());
            let two = Expression::Constant(Fp::from(2));

            vec![
                // bit * (1 - bit) = 0
                s.clone() * bit.clone() * (one - bit.clone()),
                s * (acc_next - (acc_cur * two + bit)),
            ]
        });

        Self { bit, acc, selector }
    }
}

pub struct DecomposeChip {
    config: DecomposeConfig,
}

impl DecomposeChip {
    pub fn construct(config: DecomposeConfig) -> Self {
        Self { config }
    }

    /// Decompose `value` into `num_bits` boolean cells, least significant
    /// first. The sum starts from the constant zero and must end equal to
    /// `value`, so the assignment is unsatisfiable when `value >= 2^num_bits`.
    pub fn decompose(
        &self,
        mut layouter: impl Layouter<Fp>,
        value: &Cell,
        num_bits: usize,
    ) -> Result<Vec<Cell>, Error> {
        layouter.assign_region(
            || format!("decompose {} bits", num_bits),
            |mut region| {
                let bits: Value<Vec<bool>> = value.value().map(|v| {
                    let mut bits: Vec<bool> = v.to_le_bits().iter().by_vals().collect();
                    bits.resize(num_bits.max(bits.len()), false);
                    bits
                });

                let mut acc =
                    region.assign_advice_from_constant(|| "acc 0", self.config.acc, 0, Fp::zero())?;
                let mut acc_value = Value::known(Fp::zero());
                let mut assigned = Vec::with_capacity(num_bits);

                for row in 0..num_bits {
                    let i = num_bits - 1 - row;
                    self.config.selector.enable(&mut region, row)?;

                    let b = bits.as_ref().map(|bits| bit_value(bits[i]));
                    let bit =
                        region.assign_advice(|| format!("bit {}", i), self.config.bit, row, || b)?;

                    acc_value = acc_value.zip(b).map(|(acc, b)| acc.double() + b);
                    acc = region.assign_advice(|| "acc", self.config.acc, row + 1, || acc_value)?;
                    assigned.push(bit);
                }

                region.constrain_equal(acc.cell(), value.cell())?;
                assigned.reverse();
                Ok(assigned)
            },
        )
    }

    /// Constrain `value` to `[0, 2^num_bits)`
    pub fn range_check(
        &self,
        layouter: impl Layouter<Fp>,
        value: &Cell,
        num_bits: usize,
    ) -> Result<(), Error> {
        self.decompose(layouter, value, num_bits).map(|_| ())
    }
}

/// Configuration for one Merkle level
///
/// Both gates use five advice columns in a single row:
/// - path select: `bit, current, sibling, left, right`
/// - hash or propagate: `sibling, sibling_inv, current, hashed, out`
#[derive(Clone, Debug)]
pub struct MerkleConfig {
    pub advice: [Column<Advice>; 5],
    pub s_select: Selector,
    pub s_reduce: Selector,
    pub poseidon: Pow5Config<Fp, WIDTH, RATE>,
}

impl MerkleConfig {
    pub fn configure(
        meta: &mut ConstraintSystem<Fp>,
        advice: [Column<Advice>; 5],
        poseidon: Pow5Config<Fp, WIDTH, RATE>,
    ) -> Self {
        let s_select = meta.selector();
        let s_reduce = meta.selector();

        meta.create_gate("path select", |meta| {
            let s = meta.query_selector(s_select);
            let bit = meta.query_advice(advice[0], Rotation::cur());
            let current = meta.query_advice(advice[1], Rotation::cur());
            let sibling = meta.query_advice(advice[2], Rotation::cur());
            let left = meta.query_advice(advice[3], Rotation::cur());
            let right = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(Fp::one());

            vec![
                s.clone() * bit.clone() * (one - bit.clone()),
                // left = bit ? sibling : current
                s.clone()
                    * (left - current.clone() - bit.clone() * (sibling.clone() - current.clone())),
                // right = bit ? current : sibling
                s * (right - sibling.clone() - bit * (current - sibling)),
            ]
        });

        meta.create_gate("hash or propagate", |meta| {
            let s = meta.query_selector(s_reduce);
            let sibling = meta.query_advice(advice[0], Rotation::cur());
            let sibling_inv = meta.query_advice(advice[1], Rotation::cur());
            let current = meta.query_advice(advice[2], Rotation::cur());
            let hashed = meta.query_advice(advice[3], Rotation::cur());
            let out = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(Fp::one());

            // 1 when the sibling is non-zero, 0 when it is the sentinel
            let occupied = sibling.clone() * sibling_inv;

            vec![
                s.clone() * sibling * (one - occupied.clone()),
                s * (out - current.clone() - occupied * (hashed - current)),
            ]
        });

        Self {
            advice,
            s_select,
            s_reduce,
            poseidon,
        }
    }
}

/// Merkle inclusion chip
pub struct MerkleChip {
    config: MerkleConfig,
}

impl MerkleChip {
    pub fn construct(config: MerkleConfig) -> Self {
        Self { config }
    }

    /// Fold `leaf` through every level and return the computed root.
    /// `bits` and `siblings` must both have one entry per level.
    pub fn compute_root(
        &self,
        mut layouter: impl Layouter<Fp>,
        leaf: Cell,
        bits: &[Cell],
        siblings: &[Cell],
    ) -> Result<Cell, Error> {
        if bits.len() != siblings.len() {
            return Err(Error::Synthesis);
        }

        let mut current = leaf;
        for (level, (bit, sibling)) in bits.iter().zip(siblings).enumerate() {
            current = self.fold_level(
                layouter.namespace(|| format!("level {}", level)),
                bit,
                current,
                sibling,
            )?;
        }
        Ok(current)
    }

    fn fold_level(
        &self,
        mut layouter: impl Layouter<Fp>,
        bit: &Cell,
        current: Cell,
        sibling: &Cell,
    ) -> Result<Cell, Error> {
        let advice = self.config.advice;

        let (left, right) = layouter.assign_region(
            || "path select",
            |mut region| {
                self.config.s_select.enable(&mut region, 0)?;

                bit.copy_advice(|| "bit", &mut region, advice[0], 0)?;
                current.copy_advice(|| "current", &mut region, advice[1], 0)?;
                sibling.copy_advice(|| "sibling", &mut region, advice[2], 0)?;

                let swap = bit.value().map(|b| *b == Fp::one());
                let pair = current
                    .value()
                    .zip(sibling.value())
                    .zip(swap)
                    .map(|((c, s), swap)| if swap { (*s, *c) } else { (*c, *s) });

                let left = region.assign_advice(|| "left", advice[3], 0, || pair.map(|p| p.0))?;
                let right = region.assign_advice(|| "right", advice[4], 0, || pair.map(|p| p.1))?;
                Ok((left, right))
            },
        )?;

        let hashed = poseidon_hash(
            &self.config.poseidon,
            layouter.namespace(|| "compress"),
            [left, right],
        )?;

        layouter.assign_region(
            || "hash or propagate",
            |mut region| {
                self.config.s_reduce.enable(&mut region, 0)?;

                sibling.copy_advice(|| "sibling", &mut region, advice[0], 0)?;
                let inv = sibling.value().map(|s| s.invert().unwrap_or(Fp::zero()));
                region.assign_advice(|| "sibling inverse", advice[1], 0, || inv)?;
                current.copy_advice(|| "current", &mut region, advice[2], 0)?;
                hashed.copy_advice(|| "hashed", &mut region, advice[3], 0)?;

                let out = sibling
                    .value()
                    .zip(current.value())
                    .zip(hashed.value())
                    .map(|((s, c), h)| if *s == Fp::zero() { *c } else { *h });
                region.assign_advice(|| "out", advice[4], 0, || out)
            },
        )
    }
}

/// Configuration for value arithmetic
///
/// - subtract: `a - b - c = 0` on `advice[0..3]`
/// - distinct: `(a - b) * inv = 1` on `advice[0..3]`
#[derive(Clone, Debug)]
pub struct ArithmeticConfig {
    pub advice: [Column<Advice>; 3],
    pub s_sub: Selector,
    pub s_distinct: Selector,
}

impl ArithmeticConfig {
    pub fn configure(meta: &mut ConstraintSystem<Fp>, advice: [Column<Advice>; 3]) -> Self {
        let s_sub = meta.selector();
        let s_distinct = meta.selector();

        meta.create_gate("subtract", |meta| {
            let s = meta.query_selector(s_sub);
            let a = meta.query_advice(advice[0], Rotation::cur());
            let b = meta.query_advice(advice[1], Rotation::cur());
            let c = meta.query_advice(advice[2], Rotation::cur());

            vec![s * (a - b - c)]
        });

        meta.create_gate("distinct", |meta| {
            let s = meta.query_selector(s_distinct);
            let a = meta.query_advice(advice[0], Rotation::cur());
            let b = meta.query_advice(advice[1], Rotation::cur());
            let inv = meta.query_advice(advice[2], Rotation::cur());

            vec![s * ((a - b) * inv - Expression::Constant(Fp::one()))]
        });

        Self {
            advice,
            s_sub,
            s_distinct,
        }
    }
}

pub struct ArithmeticChip {
    config: ArithmeticConfig,
}

impl ArithmeticChip {
    pub fn construct(config: ArithmeticConfig) -> Self {
        Self { config }
    }

    /// `a - b` (modular)
    pub fn subtract(
        &self,
        mut layouter: impl Layouter<Fp>,
        a: &Cell,
        b: &Cell,
    ) -> Result<Cell, Error> {
        layouter.assign_region(
            || "subtract",
            |mut region| {
                self.config.s_sub.enable(&mut region, 0)?;
                a.copy_advice(|| "a", &mut region, self.config.advice[0], 0)?;
                b.copy_advice(|| "b", &mut region, self.config.advice[1], 0)?;
                let diff = a.value().zip(b.value()).map(|(a, b)| *a - *b);
                region.assign_advice(|| "a - b", self.config.advice[2], 0, || diff)
            },
        )
    }

    /// `constant - b` (modular), with the constant fixed in the circuit
    pub fn subtract_from_constant(
        &self,
        mut layouter: impl Layouter<Fp>,
        constant: Fp,
        b: &Cell,
    ) -> Result<Cell, Error> {
        layouter.assign_region(
            || "subtract from constant",
            |mut region| {
                self.config.s_sub.enable(&mut region, 0)?;
                region.assign_advice_from_constant(
                    || "constant",
                    self.config.advice[0],
                    0,
                    constant,
                )?;
                b.copy_advice(|| "b", &mut region, self.config.advice[1], 0)?;
                let diff = b.value().map(|b| constant - *b);
                region.assign_advice(|| "constant - b", self.config.advice[2], 0, || diff)
            },
        )
    }

    /// Constrain `a != b` by witnessing `(a - b)^-1`
    pub fn assert_distinct(
        &self,
        mut layouter: impl Layouter<Fp>,
        a: &Cell,
        b: &Cell,
    ) -> Result<(), Error> {
        layouter.assign_region(
            || "distinct",
            |mut region| {
                self.config.s_distinct.enable(&mut region, 0)?;
                a.copy_advice(|| "a", &mut region, self.config.advice[0], 0)?;
                b.copy_advice(|| "b", &mut region, self.config.advice[1], 0)?;
                // Zero when a == b, which leaves the gate unsatisfied
                let inv = a
                    .value()
                    .zip(b.value())
                    .map(|(a, b)| (*a - *b).invert().unwrap_or(Fp::zero()));
                region.assign_advice(|| "inverse", self.config.advice[2], 0, || inv)?;
                Ok(())
            },
        )
    }
}
