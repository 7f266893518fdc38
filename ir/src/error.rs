use snafu::Snafu;

use crate::pattern::{Binding, Var, VarKind};
use crate::types::{NodeId, Value};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors of the graph core.
///
/// An absent match is not an error: matchers return `Option`. Among the
/// variants only [`Error::InvalidRewrite`] is recoverable (the caller skips
/// the anchor); binding errors are pattern-authoring bugs and
/// [`Error::GraphInvariantViolation`] means the graph is unsafe to keep
/// mutating.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // =========================================================================
    // Binder
    // =========================================================================
    /// Variable already holds a different binding in this match attempt.
    #[snafu(display("variable '{name}' is bound to {existing}, cannot rebind it to {attempted}"))]
    ConflictingBinding { name: String, existing: Binding, attempted: Binding },

    /// Variable queried before matching assigned it.
    #[snafu(display("variable '{name}' is unbound"))]
    UnboundVariable { name: String },

    /// Node variable given an attribute (or the other way around).
    #[snafu(display("variable '{name}' holds {expected} bindings, got {actual}"))]
    BindingKindMismatch { name: String, expected: VarKind, actual: VarKind },

    /// Variable created by another pattern's variable set.
    #[snafu(display("variable {var} does not belong to this pattern"))]
    ForeignVariable { var: Var },

    /// Pattern cannot match anything the registry describes.
    #[snafu(display("invalid pattern: {reason}"))]
    InvalidPattern { reason: String },

    // =========================================================================
    // Rewrite
    // =========================================================================
    /// Replacement does not fit the matched subgraph. The graph is untouched.
    #[snafu(display("invalid rewrite: {reason}"))]
    InvalidRewrite { reason: String },

    /// Graph consistency check failed.
    #[snafu(display("graph invariant violated: {reason}"))]
    GraphInvariantViolation { reason: String },

    // =========================================================================
    // Graph construction
    // =========================================================================
    #[snafu(display("input {value} does not reference a live node"))]
    DanglingInput { value: Value },

    #[snafu(display("{value} is out of range for a node with {outputs} outputs"))]
    OutputIndexOutOfRange { value: Value, outputs: usize },

    #[snafu(display("node {node} is still read by {consumers} consumers"))]
    NodeInUse { node: NodeId, consumers: usize },

    #[snafu(display("node {node} does not exist"))]
    UnknownNode { node: NodeId },
}

impl Error {
    /// True if the optimizer may skip the current anchor and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidRewrite { .. })
    }
}
