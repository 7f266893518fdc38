use smallvec::SmallVec;

use graft_dtype::DType;

use crate::op::OpKind;
use crate::types::{Attrs, NodeId, Value};

/// Handle of a node staged in a [`Replacement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("staged#{_0}")]
pub struct StagedId(pub(crate) u32);

impl StagedId {
    pub fn out(self, output: u32) -> Operand {
        Operand::Staged { node: self, output }
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Input of a staged node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Operand {
    /// Value already in the graph (typically a bound pattern variable).
    #[display("{_0}")]
    Existing(Value),
    /// Output of a node staged earlier in the same replacement.
    #[display("{node}#{output}")]
    Staged { node: StagedId, output: u32 },
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Existing(value)
    }
}

impl From<NodeId> for Operand {
    fn from(node: NodeId) -> Self {
        Self::Existing(node.value())
    }
}

impl From<StagedId> for Operand {
    fn from(node: StagedId) -> Self {
        node.out(0)
    }
}

/// Node waiting to be inserted by the rewrite executor.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedNode {
    pub op: OpKind,
    pub inputs: SmallVec<[Operand; 4]>,
    pub attrs: Attrs,
    pub dtypes: SmallVec<[DType; 1]>,
    pub name: Option<String>,
}

/// Nodes a rewrite builder wants to splice into the graph.
///
/// Staging happens off-graph, so a builder that fails or declines leaves the
/// graph untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replacement {
    nodes: Vec<StagedNode>,
}

impl Replacement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a node. Operands may only refer to existing values or to nodes
    /// staged before this one.
    pub fn add(
        &mut self,
        op: OpKind,
        inputs: impl IntoIterator<Item = impl Into<Operand>>,
        attrs: Attrs,
        dtypes: impl IntoIterator<Item = DType>,
    ) -> StagedId {
        let id = StagedId(u32::try_from(self.nodes.len()).expect("replacement holds too many nodes"));
        self.nodes.push(StagedNode {
            op,
            inputs: inputs.into_iter().map(Into::into).collect(),
            attrs,
            dtypes: dtypes.into_iter().collect(),
            name: None,
        });
        id
    }

    /// Attach a debug name to a staged node.
    pub fn set_name(&mut self, id: StagedId, name: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.name = Some(name.into());
        }
    }

    pub fn get(&self, id: StagedId) -> Option<&StagedNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[StagedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
