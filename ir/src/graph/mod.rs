//! Arena-backed dataflow graph.
//!
//! Nodes are stored in slots indexed by [`NodeId`]; removed nodes leave an
//! empty slot so handles are never reused. Each slot keeps the list of
//! [`Use`]s reading the node's outputs, mirrored from consumer inputs by
//! every mutating operation.
//!
//! # Invariants
//!
//! - every input and graph output references a live node and an existing
//!   output index
//! - use lists are exactly the reverse of input lists
//! - the graph is acyclic
//! - every node is reachable from a graph output
//!
//! The first two hold after every public operation. Acyclicity and
//! reachability are checked by [`Graph::validate`] and after each rewrite.

mod node;
mod tree;
mod validate;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;

use itertools::Itertools;
use smallvec::SmallVec;
use snafu::ensure;

use graft_dtype::DType;

use crate::error::*;
use crate::op::OpKind;
use crate::pattern::Expr;
use crate::types::{Attrs, NodeId, NodeOrigin, Use, Value};

pub use node::Node;
pub use tree::GraphTree;

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    node: Node,
    uses: SmallVec<[Use; 2]>,
}

/// Mutable dataflow graph owned by the optimizer for one compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    slots: Vec<Option<Slot>>,
    outputs: Vec<Value>,
    live: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Add a node reading `inputs`. Fails if an input is not a live value.
    pub fn add_node(
        &mut self,
        op: OpKind,
        inputs: impl IntoIterator<Item = Value>,
        attrs: Attrs,
        dtypes: impl IntoIterator<Item = DType>,
    ) -> Result<NodeId> {
        self.insert(Node::new(op, inputs, attrs, dtypes))
    }

    /// [`Graph::add_node`] with a debug name.
    pub fn add_named(
        &mut self,
        name: impl Into<String>,
        op: OpKind,
        inputs: impl IntoIterator<Item = Value>,
        attrs: Attrs,
        dtypes: impl IntoIterator<Item = DType>,
    ) -> Result<NodeId> {
        let mut node = Node::new(op, inputs, attrs, dtypes);
        node.name = Some(name.into());
        self.insert(node)
    }

    /// Add a named graph input.
    pub fn parameter(&mut self, name: impl Into<String>, dtype: DType) -> NodeId {
        let mut node = Node::new(OpKind::Parameter, [], Attrs::new(), [dtype]);
        node.name = Some(name.into());
        self.push_slot(node)
    }

    /// Attach a debug name to a node.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        self.slot_mut(id)?.node.name = Some(name.into());
        Ok(())
    }

    /// Mark `value` as a graph output.
    pub fn add_output(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_value(value)?;
        self.outputs.push(value);
        Ok(())
    }

    pub(crate) fn insert(&mut self, node: Node) -> Result<NodeId> {
        for &value in &node.inputs {
            self.check_value(value)?;
        }
        Ok(self.push_slot(node))
    }

    pub(crate) fn insert_fused(&mut self, mut node: Node, pass: &'static str) -> Result<NodeId> {
        node.origin = NodeOrigin::Fused { pass };
        self.insert(node)
    }

    fn push_slot(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.slots.len()).expect("node arena exhausted"));
        for (slot, value) in node.inputs.iter().enumerate() {
            if let Some(Some(producer)) = self.slots.get_mut(value.node.index()) {
                producer.uses.push(Use { user: id, slot: slot as u32, output: value.output });
            }
        }
        self.slots.push(Some(Slot { node, uses: SmallVec::new() }));
        self.live += 1;
        id
    }

    fn check_value(&self, value: Value) -> Result<()> {
        let node = self.node(value.node).ok_or(Error::DanglingInput { value })?;
        ensure!(
            (value.output as usize) < node.num_outputs(),
            OutputIndexOutOfRangeSnafu { value, outputs: node.num_outputs() }
        );
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slot(id).map(|s| &s.node)
    }

    /// Like [`Graph::node`], failing with [`Error::UnknownNode`].
    pub fn try_node(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(Error::UnknownNode { node: id })
    }

    /// Element type carried by `value`, if its producer is live and has
    /// that output.
    pub fn dtype(&self, value: Value) -> Option<DType> {
        self.node(value.node)?.dtype(value.output)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live node handles in ascending (construction) order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter(|(_, s)| s.is_some()).map(|(i, _)| NodeId(i as u32))
    }

    /// Live nodes with their handles, in construction order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|s| (NodeId(i as u32), &s.node)))
    }

    pub fn outputs(&self) -> &[Value] {
        &self.outputs
    }

    /// Consumer edges reading any output of `id`.
    pub fn consumers(&self, id: NodeId) -> &[Use] {
        self.slot(id).map(|s| s.uses.as_slice()).unwrap_or_default()
    }

    pub fn consumer_count(&self, id: NodeId) -> usize {
        self.consumers(id).len()
    }

    pub fn is_output(&self, id: NodeId) -> bool {
        self.outputs.iter().any(|v| v.node == id)
    }

    /// True if something still reads `id`: a consumer edge or a graph output.
    pub fn is_live(&self, id: NodeId) -> bool {
        self.consumer_count(id) > 0 || self.is_output(id)
    }

    /// Output indices of `id` read by consumers or graph outputs.
    pub fn read_outputs(&self, id: NodeId) -> impl Iterator<Item = u32> + '_ {
        self.consumers(id)
            .iter()
            .map(|u| u.output)
            .chain(self.outputs.iter().filter(move |v| v.node == id).map(|v| v.output))
    }

    /// All nodes transitively consuming `id` (excluding `id` itself unless it
    /// lies on a cycle).
    pub fn downstream(&self, id: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self.consumers(id).iter().map(|u| u.user).collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.consumers(next).iter().map(|u| u.user));
            }
        }
        seen
    }

    /// Deterministic topological order: producers before consumers, ties
    /// broken by ascending [`NodeId`].
    ///
    /// Fails with [`Error::GraphInvariantViolation`] if the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut pending: Vec<usize> =
            self.slots.iter().map(|s| s.as_ref().map(|s| s.node.inputs.len()).unwrap_or(0)).collect();
        let mut ready: BinaryHeap<Reverse<NodeId>> =
            self.nodes().filter(|(_, n)| n.inputs.is_empty()).map(|(id, _)| Reverse(id)).collect();

        let mut order = Vec::with_capacity(self.live);
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for u in self.consumers(id) {
                let count = &mut pending[u.user.index()];
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(u.user));
                }
            }
        }

        ensure!(
            order.len() == self.live,
            GraphInvariantViolationSnafu {
                reason: format!("cycle through {} of {} nodes", self.live - order.len(), self.live)
            }
        );
        Ok(order)
    }

    /// Subgraph feeding `value`, expanded `depth` levels deep.
    ///
    /// At depth zero (and for dangling values) the value itself is a leaf.
    pub fn expr(&self, value: Value, depth: usize) -> Expr {
        match self.node(value.node) {
            Some(node) if depth > 0 => Expr::Node {
                value,
                op: node.op,
                children: node.inputs.iter().map(|&input| self.expr(input, depth - 1)).collect(),
            },
            _ => Expr::Leaf(value),
        }
    }

    /// True if `expr` describes the subgraph feeding `value`: every interior
    /// node has the same kind and input count, leaves name the exact values.
    pub fn conforms(&self, value: Value, expr: &Expr) -> bool {
        match expr {
            Expr::Leaf(leaf) => *leaf == value,
            Expr::Node { value: expected, op, children } => {
                let Some(node) = self.node(value.node) else { return false };
                *expected == value
                    && node.op == *op
                    && node.inputs.len() == children.len()
                    && node.inputs.iter().zip(children).all(|(&input, child)| self.conforms(input, child))
            }
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Redirect every consumer edge and graph output reading output `i` of
    /// `from` to output `i` of `to`. Returns the number of redirected edges.
    ///
    /// Fails without modifying the graph if `to` lacks an output index that
    /// is currently read from `from`.
    pub fn replace_all_uses(&mut self, from: NodeId, to: NodeId) -> Result<usize> {
        let target_outputs = self.try_node(to)?.num_outputs();
        self.try_node(from)?;
        if from == to {
            return Ok(0);
        }
        if let Some(output) = self.read_outputs(from).find(|&o| o as usize >= target_outputs) {
            return OutputIndexOutOfRangeSnafu { value: to.out(output), outputs: target_outputs }.fail();
        }

        let uses = std::mem::take(&mut self.slot_mut(from)?.uses);
        for u in &uses {
            self.slot_mut(u.user)?.node.inputs[u.slot as usize] = to.out(u.output);
        }
        self.slot_mut(to)?.uses.extend(uses.iter().copied());

        let mut redirected = uses.len();
        for value in self.outputs.iter_mut().filter(|v| v.node == from) {
            value.node = to;
            redirected += 1;
        }
        Ok(redirected)
    }

    /// Remove a node nothing reads anymore.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let consumers = self.consumer_count(id);
        ensure!(
            consumers == 0 && !self.is_output(id),
            NodeInUseSnafu { node: id, consumers: consumers + usize::from(self.is_output(id)) }
        );
        let slot = self.slots.get_mut(id.index()).and_then(Option::take).ok_or(Error::UnknownNode { node: id })?;
        self.live -= 1;

        for (slot_idx, value) in slot.node.inputs.iter().enumerate() {
            if let Some(Some(producer)) = self.slots.get_mut(value.node.index())
                && let Some(pos) = producer.uses.iter().position(|u| u.user == id && u.slot == slot_idx as u32)
            {
                producer.uses.remove(pos);
            }
        }
        Ok(slot.node)
    }

    /// Remove every node not reachable from a graph output. Returns the
    /// removed handles in removal order (consumers first).
    pub fn prune_unreachable(&mut self) -> Result<Vec<NodeId>> {
        let reachable = self.reachable();
        let order = self.topological_order()?;
        let mut removed = Vec::new();
        for id in order.into_iter().rev() {
            if !reachable.contains(&id) {
                self.remove_node(id)?;
                removed.push(id);
            }
        }
        Ok(removed)
    }

    /// Nodes reachable backwards from the graph outputs.
    pub fn reachable(&self) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self.outputs.iter().map(|v| v.node).collect();
        while let Some(id) = stack.pop() {
            if seen.insert(id)
                && let Some(node) = self.node(id)
            {
                stack.extend(node.inputs.iter().map(|v| v.node));
            }
        }
        seen
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut).ok_or(Error::UnknownNode { node: id })
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, node) in self.nodes() {
            writeln!(f, "{id} = {node}")?;
        }
        write!(f, "outputs: [{}]", self.outputs.iter().join(", "))
    }
}
