use std::fmt;

use itertools::Itertools;

use crate::op::OpKind;
use crate::types::Value;

/// Structural view of a subgraph, used to compare a match with the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Operator node reached through `value`.
    Node { value: Value, op: OpKind, children: Vec<Expr> },
    /// Operand not expanded further.
    Leaf(Value),
}

impl Expr {
    pub fn value(&self) -> Value {
        match self {
            Self::Node { value, .. } | Self::Leaf(value) => *value,
        }
    }

    /// Number of operator levels above the deepest leaf.
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Node { children, .. } => 1 + children.iter().map(Expr::depth).max().unwrap_or(0),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(value) => write!(f, "{value}"),
            Self::Node { value, op, children } => {
                write!(f, "{op}({})", children.iter().join(", "))?;
                if value.output != 0 { write!(f, "#{}", value.output) } else { Ok(()) }
            }
        }
    }
}
