//! Pattern variables and the match environment.
//!
//! Variables are allocated by a [`VarSet`] owned by exactly one
//! [`Pattern`](super::Pattern). Every match attempt gets a fresh [`Env`]; no
//! binding survives past the attempt (or the rewrite consuming it).

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::*;
use crate::types::{AttrValue, NodeId, Value};

static NEXT_SET: AtomicU32 = AtomicU32::new(1);

/// Kind of value a variable may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum VarKind {
    /// A matched node.
    Node,
    /// An operand: producer node plus output index.
    Value,
    /// An attribute value or an output index.
    Attr,
}

/// Handle of a pattern variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("?{set}.{index}")]
pub struct Var {
    pub(crate) set: u32,
    pub(crate) index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VarInfo {
    pub(crate) name: String,
    pub(crate) kind: VarKind,
}

/// Allocator of fresh variables for one pattern.
///
/// Each set has a process-unique id, so variables of one pattern are
/// rejected by environments of another. Allocating more than `u16::MAX + 1`
/// variables panics.
#[derive(Debug)]
pub struct VarSet {
    id: u32,
    vars: Vec<VarInfo>,
}

impl Default for VarSet {
    fn default() -> Self {
        Self::new()
    }
}

impl VarSet {
    pub fn new() -> Self {
        Self { id: NEXT_SET.fetch_add(1, Ordering::Relaxed), vars: Vec::new() }
    }

    /// Variable bound to a matched node.
    pub fn node(&mut self, name: impl Into<String>) -> Var {
        self.alloc(name.into(), VarKind::Node)
    }

    /// Variable bound to an operand value.
    pub fn value(&mut self, name: impl Into<String>) -> Var {
        self.alloc(name.into(), VarKind::Value)
    }

    /// Variable bound to an attribute value or output index.
    pub fn attr(&mut self, name: impl Into<String>) -> Var {
        self.alloc(name.into(), VarKind::Attr)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn owns(&self, var: Var) -> bool {
        var.set == self.id && (var.index as usize) < self.vars.len()
    }

    pub fn kind(&self, var: Var) -> Option<VarKind> {
        self.owns(var).then(|| self.vars[var.index as usize].kind)
    }

    pub fn name(&self, var: Var) -> Option<&str> {
        self.owns(var).then(|| self.vars[var.index as usize].name.as_str())
    }

    fn alloc(&mut self, name: String, kind: VarKind) -> Var {
        let index = u16::try_from(self.vars.len()).expect("variable set holds at most 65536 variables");
        self.vars.push(VarInfo { name, kind });
        Var { set: self.id, index }
    }

    pub(crate) fn freeze(self) -> (u32, Arc<[VarInfo]>) {
        (self.id, self.vars.into())
    }
}

/// Value held by a bound variable.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum Binding {
    #[display("node {_0}")]
    Node(NodeId),
    #[display("value {_0}")]
    Value(Value),
    #[display("attribute {_0}")]
    Attr(AttrValue),
}

impl Binding {
    pub fn kind(&self) -> VarKind {
        match self {
            Self::Node(_) => VarKind::Node,
            Self::Value(_) => VarKind::Value,
            Self::Attr(_) => VarKind::Attr,
        }
    }
}

/// Match environment: variable bindings of one match attempt.
///
/// Also records the anchor, the interior nodes matched by operator patterns
/// (pre-order, each once) and the choices made at alternatives and
/// commutative operands, which [`Pattern::substitute`](super::Pattern::substitute)
/// replays.
#[derive(Debug, Clone)]
pub struct Env {
    set: u32,
    vars: Arc<[VarInfo]>,
    bindings: SmallVec<[Option<Binding>; 8]>,
    anchor: NodeId,
    pub(crate) matched: SmallVec<[NodeId; 4]>,
    pub(crate) trail: SmallVec<[u8; 4]>,
}

impl Env {
    pub(crate) fn new(set: u32, vars: Arc<[VarInfo]>, anchor: NodeId) -> Self {
        let bindings = std::iter::repeat_n(None, vars.len()).collect();
        Self { set, vars, bindings, anchor, matched: SmallVec::new(), trail: SmallVec::new() }
    }

    /// Bind `var`. Rebinding to an equal value is a no-op.
    pub fn bind(&mut self, var: Var, binding: Binding) -> Result<()> {
        let expected = self.info(var)?.kind;
        ensure!(
            expected == binding.kind(),
            BindingKindMismatchSnafu { name: self.name_of(var), expected, actual: binding.kind() }
        );

        let idx = var.index as usize;
        if let Some(existing) = &self.bindings[idx] {
            ensure!(
                *existing == binding,
                ConflictingBindingSnafu { name: self.name_of(var), existing: existing.clone(), attempted: binding }
            );
            return Ok(());
        }
        self.bindings[idx] = Some(binding);
        Ok(())
    }

    pub fn resolve(&self, var: Var) -> Result<&Binding> {
        let info = self.info(var)?;
        self.bindings[var.index as usize].as_ref().ok_or_else(|| Error::UnboundVariable { name: info.name.clone() })
    }

    /// Kind of `var`, if it belongs to this environment's pattern.
    pub fn kind(&self, var: Var) -> Option<VarKind> {
        self.info(var).ok().map(|info| info.kind)
    }

    pub fn is_bound(&self, var: Var) -> bool {
        self.info(var).is_ok() && self.bindings[var.index as usize].is_some()
    }

    /// Node bound to a node variable.
    pub fn node(&self, var: Var) -> Result<NodeId> {
        match self.resolve(var)? {
            Binding::Node(id) => Ok(*id),
            other => self.mismatch(var, VarKind::Node, other),
        }
    }

    /// Operand bound to a value variable.
    pub fn value(&self, var: Var) -> Result<Value> {
        match self.resolve(var)? {
            Binding::Value(value) => Ok(*value),
            other => self.mismatch(var, VarKind::Value, other),
        }
    }

    /// Attribute bound to an attribute variable.
    pub fn attr(&self, var: Var) -> Result<&AttrValue> {
        match self.resolve(var)? {
            Binding::Attr(value) => Ok(value),
            other => self.mismatch(var, VarKind::Attr, other),
        }
    }

    /// Output index bound to an attribute variable.
    pub fn index(&self, var: Var) -> Result<u32> {
        let value = self.attr(var)?;
        value.as_int().and_then(|i| u32::try_from(i).ok()).ok_or_else(|| Error::InvalidRewrite {
            reason: format!("variable '{}' holds {value}, not an output index", self.name_of(var)),
        })
    }

    /// Anchor node the match started from (the matched root).
    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    /// Nodes matched by operator patterns, anchor first.
    pub fn matched(&self) -> &[NodeId] {
        &self.matched
    }

    /// Bound variables with their names.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.vars.iter().zip(&self.bindings).filter_map(|(info, b)| b.as_ref().map(|b| (info.name.as_str(), b)))
    }

    pub(crate) fn record_match(&mut self, id: NodeId) {
        if !self.matched.contains(&id) {
            self.matched.push(id);
        }
    }

    fn info(&self, var: Var) -> Result<&VarInfo> {
        ensure!(var.set == self.set, ForeignVariableSnafu { var });
        self.vars.get(var.index as usize).ok_or(Error::ForeignVariable { var })
    }

    fn name_of(&self, var: Var) -> String {
        self.vars.get(var.index as usize).map(|info| info.name.clone()).unwrap_or_default()
    }

    fn mismatch<T>(&self, var: Var, expected: VarKind, actual: &Binding) -> Result<T> {
        BindingKindMismatchSnafu { name: self.name_of(var), expected, actual: actual.kind() }.fail()
    }
}
