//! Error taxonomy for the engine.
//!
//! Recoverable failures are returned as [`XaddError`]; internal invariant
//! breaches use assertions. Operations that fail leave the node store
//! untouched: construction is always the last step after a successful
//! recursion, and partially filled memo tables stay valid because the
//! store is append-only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XaddError {
    /// The expression offered as a decision is neither a Boolean atom nor a
    /// linear inequality over continuous variables.
    #[error("malformed decision: {0}")]
    MalformedDecision(String),

    /// Operator name outside the closed operator sets.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    /// Arithmetic failure while combining or transforming leaf expressions,
    /// e.g. division by the zero leaf or log of a non-positive constant.
    #[error("leaf evaluation failed: {0}")]
    LeafEvaluation(String),

    /// Strict evaluation was requested without a binding for every free
    /// variable of the diagram.
    #[error("evaluation is missing an assignment for `{0}`")]
    PartialAssignment(String),

    /// The LP backend is missing or reported an error. Pruning degrades to
    /// the identity reduction; this error is only surfaced where a caller
    /// asked for a hard failure.
    #[error("LP solver unavailable: {0}")]
    SolverUnavailable(String),

    /// Internal structural invariant broken. Always a bug.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The textual importer rejected its input.
    #[error("parse error at byte {pos}: {msg}")]
    Parse { pos: usize, msg: String },
}

pub type Result<T> = std::result::Result<T, XaddError>;
