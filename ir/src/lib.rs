//! Graph IR and pattern-rewrite core of the graft optimizer.
//!
//! # Module Organization
//!
//! - [`types`] - Handles, edges and attribute values
//! - [`op`] - Operator kind tags
//! - [`registry`] - Operator arity and attribute schemas
//! - [`graph`] - Arena-backed dataflow graph
//! - [`pattern`] - Pattern language and variable binder
//! - [`matcher`] - Matching a pattern at an anchor node
//! - [`rewrite`] - Splicing a replacement over a match
//! - [`error`] - Error types and result handling

pub mod error;
pub mod graph;
pub mod matcher;
pub mod op;
pub mod prelude;
pub mod registry;
pub mod types;

#[macro_use]
pub mod pattern;
pub mod rewrite;

#[cfg(any(test, feature = "proptest"))]
pub mod test;

pub use error::{Error, Result};
pub use graph::{Graph, Node};
pub use matcher::{find_matches, match_at};
pub use op::OpKind;
pub use pattern::{Binding, Env, Expr, Pat, Pattern, Var, VarSet};
pub use registry::{Arity, AttrSchema, OpRegistry, OpSchema, SchemaViolation};
pub use rewrite::{Operand, Replacement, ReplacementOutcome, StagedId, rewrite};
pub use types::{AttrKind, AttrValue, Attrs, NodeId, NodeOrigin, Use, Value};

pub use graft_dtype::DType;
