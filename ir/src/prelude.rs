//! Common imports for writing fusion passes.
//!
//! ```rust,ignore
//! use graft_ir::prelude::*;
//! ```

// Graph
pub use crate::graph::{Graph, Node};
pub use crate::types::{AttrValue, Attrs, NodeId, Value};
pub use crate::{OpKind, OpRegistry};

// Patterns and rewriting
pub use crate::pat;
pub use crate::pattern::{Env, Pat, Pattern, Var, VarSet};
pub use crate::rewrite::{Operand, Replacement, StagedId};

// Re-exports from dependencies
pub use graft_dtype::DType;
