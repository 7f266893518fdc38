//! Tree visualization for graphs.
//!
//! Renders the graph as an ASCII tree rooted at its outputs. Nodes feeding
//! several consumers are printed once; later occurrences become
//! back-references.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::rc::Rc;

use ptree::{Style, TreeItem};

use super::Graph;
use crate::types::{NodeId, Value};

#[derive(Debug, Clone, Copy)]
enum Item {
    Outputs,
    Value(Value),
}

/// Compact tree view of a [`Graph`].
#[derive(Clone)]
pub struct GraphTree<'g> {
    graph: &'g Graph,
    item: Item,
    visited: Rc<RefCell<HashSet<NodeId>>>,
    /// Set by `write_self` when the node was already printed.
    is_backref: RefCell<bool>,
}

impl<'g> GraphTree<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph, item: Item::Outputs, visited: Rc::default(), is_backref: RefCell::new(false) }
    }

    fn child(&self, value: Value) -> Self {
        Self {
            graph: self.graph,
            item: Item::Value(value),
            visited: self.visited.clone(),
            is_backref: RefCell::new(false),
        }
    }
}

impl TreeItem for GraphTree<'_> {
    type Child = Self;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        let value = match self.item {
            Item::Outputs => return write!(f, "outputs"),
            Item::Value(value) => value,
        };
        let Some(node) = self.graph.node(value.node) else {
            return write!(f, "{value} <dangling>");
        };

        let mut visited = self.visited.borrow_mut();
        let prefix = if value.output == 0 { String::new() } else { format!("#{} of ", value.output) };
        if !visited.insert(value.node) {
            *self.is_backref.borrow_mut() = true;
            write!(f, "{prefix}[{}] → (see above)", value.node)
        } else {
            write!(f, "{prefix}[{}] {node}", value.node)
        }
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        if *self.is_backref.borrow() {
            return Cow::Borrowed(&[]);
        }
        let children = match self.item {
            Item::Outputs => self.graph.outputs().iter().map(|&v| self.child(v)).collect(),
            Item::Value(value) => match self.graph.node(value.node) {
                Some(node) => node.inputs().iter().map(|&v| self.child(v)).collect(),
                None => Vec::new(),
            },
        };
        Cow::Owned(children)
    }
}

impl Graph {
    /// Render the graph as a compact ASCII tree rooted at its outputs.
    pub fn tree(&self) -> String {
        let mut buf = Vec::new();
        if let Err(err) = ptree::write_tree(&GraphTree::new(self), &mut buf) {
            return format!("<tree rendering failed: {err}>");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
