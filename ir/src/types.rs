//! Fundamental handle and attribute types.
//!
//! Nodes live in an arena owned by [`Graph`](crate::Graph) and are referred
//! to by [`NodeId`] handles. An edge is described from the consumer side by
//! the [`Value`] it reads (producer + output index) and from the producer side
//! by a [`Use`] record.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

use graft_dtype::DType;

/// Handle of a node inside a [`Graph`](crate::Graph) arena.
///
/// Handles are allocated in graph-construction order and never reused, so
/// ordering by `NodeId` is a stable tie-breaker for traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[display("%{_0}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Value produced at output `output` of this node.
    pub const fn out(self, output: u32) -> Value {
        Value { node: self, output }
    }

    /// First (usually only) output of this node.
    pub const fn value(self) -> Value {
        self.out(0)
    }

    /// Arena index of this handle.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Producer end of an edge: output `output` of node `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Value {
    pub node: NodeId,
    pub output: u32,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.output == 0 { write!(f, "{}", self.node) } else { write!(f, "{}#{}", self.node, self.output) }
    }
}

impl From<NodeId> for Value {
    fn from(node: NodeId) -> Self {
        node.value()
    }
}

/// Consumer end of an edge, stored on the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Use {
    /// Node reading the value.
    pub user: NodeId,
    /// Input slot of `user` that holds the value.
    pub slot: u32,
    /// Output index of the producer being read.
    pub output: u32,
}

/// Where a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum NodeOrigin {
    /// Created by the lowering/import stage that built the graph.
    #[default]
    #[display("lowered")]
    Lowered,
    /// Created by a fusion pass rewrite.
    #[display("fused by {pass}")]
    Fused { pass: &'static str },
}

/// Kind of an attribute value, used by operator schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Str,
    DType,
    Ints,
}

/// Immutable operator-specific attribute (scale, zero-point, axis, ...).
#[derive(Debug, Clone, PartialEq, derive_more::From)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DType(DType),
    Ints(Vec<i64>),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            Self::Bool(_) => AttrKind::Bool,
            Self::Int(_) => AttrKind::Int,
            Self::Float(_) => AttrKind::Float,
            Self::Str(_) => AttrKind::Str,
            Self::DType(_) => AttrKind::DType,
            Self::Ints(_) => AttrKind::Ints,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view used by range constraints. Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_dtype(&self) -> Option<DType> {
        match self {
            Self::DType(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::DType(v) => write!(f, "{v}"),
            Self::Ints(v) => write!(f, "[{}]", v.iter().join(", ")),
        }
    }
}

/// Sorted attribute map of a node.
///
/// Kept ordered so that graph dumps and structural comparisons are
/// deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attrs(BTreeMap<String, AttrValue>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.iter().format_with(", ", |(k, v), f| f(&format_args!("{k}={v}"))))
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
