//! Error types.

use thiserror::Error;

/// Invalid relation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("depth comparator width {bits} must be in 1..={max}")]
    DepthBits { bits: usize, max: usize },

    #[error("max depth {depth} exceeds supported maximum {max}")]
    DepthTooLarge { depth: usize, max: usize },

    /// The comparator cannot represent `max_depth`.
    #[error("a {bits}-bit depth comparator cannot represent max depth {depth}")]
    ComparatorTooNarrow { depth: usize, bits: usize },

    #[error("value window width {bits} must be in 1..={max}")]
    ValueBits { bits: usize, max: usize },
}

/// Witness assignments that cannot satisfy the withdraw relation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    /// Declared tree depth is above the configured maximum.
    #[error("declared depth {declared} exceeds max depth {max}")]
    DepthOutOfBounds { declared: u64, max: usize },

    /// Leaf index does not fit in `max_depth` bits.
    #[error("leaf index does not fit in {max_depth} bits")]
    IndexOutOfRange { max_depth: usize },

    #[error("expected {expected} siblings, got {actual}")]
    SiblingCount { expected: usize, actual: usize },

    /// A value fell outside the non-negative window [0, 2^bits).
    #[error("{what} is outside the {bits}-bit range window")]
    ValueOutOfRange { what: &'static str, bits: usize },

    /// Split withdrawal reused the spent nullifier for the remainder.
    #[error("new nullifier must differ from the spent nullifier")]
    NullifierReuse,

    /// Folded root does not equal the public state root.
    #[error("computed root does not match the state root")]
    RootMismatch,

    #[error(transparent)]
    Params(#[from] ParamsError),
}

/// LeanIMT failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree is full at max depth {max_depth}")]
    Full { max_depth: usize },

    #[error("leaf index {index} out of bounds (size {size})")]
    IndexOutOfBounds { index: u64, size: u64 },

    #[error("leaf not found in tree")]
    LeafNotFound,
}

/// Failures while reading or building proof-input files.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid field element for {field}: {value:?}")]
    InvalidField { field: String, value: String },

    #[error("coin commitment does not match its contents")]
    CommitmentMismatch,

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Params(#[from] ParamsError),
}

/// Rejections by the ledger that records roots and nullifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("state root is not a recognized historical root")]
    UnknownRoot,

    #[error("nullifier already spent")]
    NullifierSpent,

    #[error("withdrawal proof rejected")]
    ProofRejected,

    #[error(transparent)]
    Tree(#[from] TreeError),
}
