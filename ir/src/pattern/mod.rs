//! Pattern language and variable binder.
//!
//! A fusion pass describes the subgraph it replaces as a [`Pattern`]: a
//! [`Pat`] tree written against a [`VarSet`] of fresh variables. The
//! [matcher](crate::matcher) produces an [`Env`] per successful attempt;
//! the rewrite step reads operands back out of it.

mod expr;
mod macros;
mod pat;
mod vars;

pub use expr::Expr;
pub use pat::{AttrConstraint, Inputs, OutputPat, Pat, Pattern};
pub use vars::{Binding, Env, Var, VarKind, VarSet};
