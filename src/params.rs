//! Relation parameters
//!
//! The withdraw relation is shaped by three widths:
//! - `max_depth`: number of Merkle levels the verifier always folds through
//! - `depth_bits`: width of the comparator that bounds the declared depth
//! - `value_bits`: width of the non-negativity window for values
//!
//! All three are explicit and validated. The depth comparator in particular
//! must be wide enough to represent `max_depth`, otherwise the bound check
//! would silently cap the supported tree height.

use serde::{Deserialize, Serialize};

use crate::error::ParamsError;

/// Default maximum tree depth, 2^32 leaves
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default depth comparator width (supports depths up to 63)
pub const DEFAULT_DEPTH_BITS: usize = 6;

/// Default value window: values live in [0, 2^128)
pub const DEFAULT_VALUE_BITS: usize = 128;

/// Hard ceiling on the depth comparator width
pub const MAX_DEPTH_BITS: usize = 8;

/// Tree positions are addressed with `u64`
pub const MAX_SUPPORTED_DEPTH: usize = 64;

/// Range windows must stay below the Pallas base field size (~2^254) with
/// margin, so that a wrapped subtraction can never land inside the window.
pub const MAX_VALUE_BITS: usize = 252;

/// Row-count exponent used for the withdraw circuit with default parameters
pub const CIRCUIT_K: u32 = 13;

/// Approximate rows consumed by one Pow5 permutation (P128Pow5T3:
/// 8 full rounds, 56 partial rounds packed two per row, plus I/O rows)
const ROWS_PER_PERMUTATION: usize = 42;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationParams {
    pub max_depth: usize,
    pub depth_bits: usize,
    pub value_bits: usize,
}

impl RelationParams {
    /// Build and validate a parameter set
    pub fn new(
        max_depth: usize,
        depth_bits: usize,
        value_bits: usize,
    ) -> Result<Self, ParamsError> {
        let params = Self {
            max_depth,
            depth_bits,
            value_bits,
        };
        params.validate()?;
        Ok(params)
    }

    /// Parameters with the given depth and the default comparator/value widths
    pub fn with_max_depth(max_depth: usize) -> Result<Self, ParamsError> {
        Self::new(max_depth, DEFAULT_DEPTH_BITS, DEFAULT_VALUE_BITS)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.depth_bits == 0 || self.depth_bits > MAX_DEPTH_BITS {
            return Err(ParamsError::DepthBits {
                bits: self.depth_bits,
                max: MAX_DEPTH_BITS,
            });
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ParamsError::DepthTooLarge {
                depth: self.max_depth,
                max: MAX_SUPPORTED_DEPTH,
            });
        }
        // The comparator can only see values below 2^depth_bits.
        if (self.max_depth as u64) >= (1u64 << self.depth_bits) {
            return Err(ParamsError::ComparatorTooNarrow {
                depth: self.max_depth,
                bits: self.depth_bits,
            });
        }
        if self.value_bits == 0 || self.value_bits > MAX_VALUE_BITS {
            return Err(ParamsError::ValueBits {
                bits: self.value_bits,
                max: MAX_VALUE_BITS,
            });
        }
        Ok(())
    }

    /// Smallest `k` whose 2^k rows fit the withdraw relation.
    ///
    /// This is an estimate from the layout: one Poseidon permutation per
    /// level, seven for the commitment scheme (both records), the running-sum
    /// decompositions and two gate rows per level.
    pub fn min_k(&self) -> u32 {
        let permutations = self.max_depth + 7;
        let rows = permutations * ROWS_PER_PERMUTATION
            + (self.max_depth + 1)
            + 2 * (self.depth_bits + 1)
            + 2 * (self.value_bits + 1)
            + 2 * self.max_depth
            + 32;
        // Leave room for blinding rows.
        let needed = rows + 16;
        let mut k = 1;
        while (1usize << k) < needed {
            k += 1;
        }
        k
    }
}

impl Default for RelationParams {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            depth_bits: DEFAULT_DEPTH_BITS,
            value_bits: DEFAULT_VALUE_BITS,
        }
    }
}
