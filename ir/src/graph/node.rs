use std::fmt;

use itertools::Itertools;
use smallvec::SmallVec;

use graft_dtype::DType;

use crate::op::OpKind;
use crate::types::{AttrValue, Attrs, NodeOrigin, Value};

/// An operation instance.
///
/// Inputs are ordered; the graph keeps the matching consumer records on the
/// producers. Attributes and output dtypes are fixed at creation: rewrites
/// replace nodes, they never edit them.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) op: OpKind,
    pub(crate) inputs: SmallVec<[Value; 4]>,
    pub(crate) attrs: Attrs,
    pub(crate) dtypes: SmallVec<[DType; 1]>,
    pub(crate) name: Option<String>,
    pub(crate) origin: NodeOrigin,
}

impl Node {
    pub(crate) fn new(
        op: OpKind,
        inputs: impl IntoIterator<Item = Value>,
        attrs: Attrs,
        dtypes: impl IntoIterator<Item = DType>,
    ) -> Self {
        Self {
            op,
            inputs: inputs.into_iter().collect(),
            attrs,
            dtypes: dtypes.into_iter().collect(),
            name: None,
            origin: NodeOrigin::Lowered,
        }
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    pub fn input(&self, slot: usize) -> Option<Value> {
        self.inputs.get(slot).copied()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Output dtypes, one per output.
    pub fn dtypes(&self) -> &[DType] {
        &self.dtypes
    }

    pub fn dtype(&self, output: u32) -> Option<DType> {
        self.dtypes.get(output as usize).copied()
    }

    pub fn num_outputs(&self) -> usize {
        self.dtypes.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn origin(&self) -> NodeOrigin {
        self.origin
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.op, self.inputs.iter().join(", "))?;
        if !self.attrs.is_empty() {
            write!(f, " {}", self.attrs)?;
        }
        match self.dtypes.as_slice() {
            [single] => write!(f, " : {single}")?,
            many => write!(f, " : ({})", many.iter().join(", "))?,
        }
        if let Some(name) = &self.name {
            write!(f, " '{name}'")?;
        }
        Ok(())
    }
}
