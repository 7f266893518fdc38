//! Graph consistency checks.

use std::collections::HashSet;

use snafu::ensure;

use super::Graph;
use crate::error::*;
use crate::registry::OpRegistry;
use crate::types::Use;

impl Graph {
    /// Check edge bookkeeping, graph outputs and acyclicity.
    ///
    /// Run after every rewrite. Does not consult the registry.
    pub fn verify_structure(&self) -> Result<()> {
        let mut edges = 0usize;
        for (id, node) in self.nodes() {
            for (slot, &value) in node.inputs.iter().enumerate() {
                let Some(producer) = self.slot(value.node) else {
                    return violation(format!("{id} input {slot} reads dead node {}", value.node));
                };
                ensure!(
                    (value.output as usize) < producer.node.num_outputs(),
                    GraphInvariantViolationSnafu {
                        reason: format!("{id} input {slot} reads missing output {value}")
                    }
                );
                let expected = Use { user: id, slot: slot as u32, output: value.output };
                ensure!(
                    producer.uses.contains(&expected),
                    GraphInvariantViolationSnafu {
                        reason: format!("{} has no use record for {id} input {slot}", value.node)
                    }
                );
                edges += 1;
            }
        }

        let mut records = 0usize;
        for id in self.node_ids() {
            for u in self.consumers(id) {
                let reads = self.node(u.user).and_then(|n| n.input(u.slot as usize));
                ensure!(
                    reads == Some(id.out(u.output)),
                    GraphInvariantViolationSnafu {
                        reason: format!("stale use record {id} -> {} slot {}", u.user, u.slot)
                    }
                );
                records += 1;
            }
        }
        ensure!(
            edges == records,
            GraphInvariantViolationSnafu { reason: format!("{edges} edges but {records} use records") }
        );

        for &value in &self.outputs {
            let in_range = self.node(value.node).is_some_and(|n| (value.output as usize) < n.num_outputs());
            ensure!(in_range, GraphInvariantViolationSnafu { reason: format!("graph output {value} is dangling") });
        }

        self.topological_order().map(drop)
    }

    /// Check every graph invariant plus operator schemas.
    ///
    /// On top of [`Graph::verify_structure`]: every node is registered and
    /// satisfies its arity, output count and attribute schema, and every node
    /// is reachable from a graph output.
    pub fn validate(&self, registry: &OpRegistry) -> Result<()> {
        self.verify_structure()?;

        for (id, node) in self.nodes() {
            if let Err(violation) = registry.check_node(node) {
                return GraphInvariantViolationSnafu { reason: format!("{id}: {violation}") }.fail();
            }
        }

        let reachable: HashSet<_> = self.reachable();
        if let Some(orphan) = self.node_ids().find(|id| !reachable.contains(id)) {
            return violation(format!("{orphan} is not reachable from any graph output"));
        }
        Ok(())
    }
}

fn violation<T>(reason: String) -> Result<T> {
    GraphInvariantViolationSnafu { reason }.fail()
}
