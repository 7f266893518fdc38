//! Rewrite executor: splices a staged replacement over a matched subgraph.
//!
//! The executor is atomic with respect to validation: every check runs on
//! the staged nodes before the graph is touched. Once it commits, the
//! rewrite is permanent.

mod executor;
mod replacement;

pub use executor::{ReplacementOutcome, rewrite};
pub use replacement::{Operand, Replacement, StagedId, StagedNode};
