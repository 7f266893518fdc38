use std::collections::HashSet;

use itertools::Itertools;
use snafu::ensure;
use tracing::debug;

use super::replacement::{Operand, Replacement, StagedId};
use crate::error::*;
use crate::graph::{Graph, Node};
use crate::pattern::Env;
use crate::registry::OpRegistry;
use crate::types::{NodeId, Value};

/// Result of a rewrite attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementOutcome {
    /// The replacement was spliced in.
    Applied {
        /// Inserted node that took over the matched root's consumers.
        root: NodeId,
        /// Every inserted node, in staging order.
        inserted: Vec<NodeId>,
        /// Matched nodes removed because nothing read them anymore.
        removed: Vec<NodeId>,
    },
    /// The builder declined; the graph is untouched.
    Declined,
}

impl ReplacementOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Replace the subgraph matched in `env` with the nodes staged by `build`.
///
/// `build` sees the graph read-only and returns the staged replacement root,
/// or `None` to decline. The staged nodes are validated against the registry
/// and the graph before anything is modified; a failed check returns
/// [`Error::InvalidRewrite`] with the graph unchanged.
///
/// On commit the staged nodes are inserted (origin `Fused { pass }`), every
/// consumer edge and graph output reading the matched root is redirected to
/// the replacement root, and matched nodes left without consumers are
/// removed. Nodes still read from outside the match are kept. A replacement
/// that would leave an unmatched producer without readers is rejected.
pub fn rewrite<F>(
    graph: &mut Graph,
    registry: &OpRegistry,
    env: &Env,
    pass: &'static str,
    build: F,
) -> Result<ReplacementOutcome>
where
    F: FnOnce(&Graph, &Env, &mut Replacement) -> Result<Option<StagedId>>,
{
    let anchor = env.anchor();
    if let Some(stale) = env.matched().iter().chain([&anchor]).find(|id| !graph.contains(**id)) {
        return InvalidRewriteSnafu { reason: format!("matched node {stale} no longer exists") }.fail();
    }

    let mut staged = Replacement::new();
    let Some(root) = build(graph, env, &mut staged)? else {
        return Ok(ReplacementOutcome::Declined);
    };
    let removed = check_replacement(graph, registry, env, &staged, root)?;

    // Commit. Everything below was validated above, so failures are
    // invariant violations rather than rejected rewrites.
    let mut inserted: Vec<NodeId> = Vec::with_capacity(staged.len());
    for node in staged.nodes() {
        let inputs = node.inputs.iter().map(|&operand| match operand {
            Operand::Existing(value) => value,
            Operand::Staged { node, output } => inserted[node.index()].out(output),
        });
        let mut fresh = Node::new(node.op, inputs, node.attrs.clone(), node.dtypes.iter().copied());
        fresh.name = node.name.clone();
        inserted.push(graph.insert_fused(fresh, pass)?);
    }
    let new_root = inserted[root.index()];

    graph.replace_all_uses(anchor, new_root)?;

    // Consumers come before their producers.
    for &id in &removed {
        graph.remove_node(id)?;
    }

    graph.verify_structure()?;

    debug!(
        pass,
        anchor = %anchor,
        replacement = %new_root,
        inserted = inserted.len(),
        removed = %removed.iter().join(", "),
        "rewrite applied"
    );
    Ok(ReplacementOutcome::Applied { root: new_root, inserted, removed })
}

/// Validate the staged nodes against the graph. Returns the matched nodes the
/// commit will remove, consumers first.
fn check_replacement(
    graph: &Graph,
    registry: &OpRegistry,
    env: &Env,
    staged: &Replacement,
    root: StagedId,
) -> Result<Vec<NodeId>> {
    let anchor = env.anchor();
    let Some(root_node) = staged.get(root) else {
        return invalid(format!("replacement root {root} was never staged"));
    };

    // Reading the anchor or anything downstream of it would close a cycle
    // once its consumers are redirected.
    let mut forbidden = graph.downstream(anchor);
    forbidden.insert(anchor);

    let mut consumed: HashSet<StagedId> = HashSet::new();
    let mut read: HashSet<NodeId> = HashSet::new();
    for (index, node) in staged.nodes().iter().enumerate() {
        if let Err(violation) = registry.check(node.op, node.inputs.len(), node.dtypes.len(), &node.attrs) {
            return invalid(format!("staged#{index}: {violation}"));
        }
        for &operand in &node.inputs {
            match operand {
                Operand::Existing(value) => {
                    check_existing(graph, &forbidden, value)?;
                    read.insert(value.node);
                }
                Operand::Staged { node: producer, output } => {
                    ensure!(
                        producer.index() < index,
                        InvalidRewriteSnafu { reason: format!("staged#{index} reads later node {producer}") }
                    );
                    let outputs = staged.nodes()[producer.index()].dtypes.len();
                    ensure!(
                        (output as usize) < outputs,
                        InvalidRewriteSnafu { reason: format!("{producer} has {outputs} outputs, #{output} read") }
                    );
                    consumed.insert(producer);
                }
            }
        }
    }

    if let Some(unused) = (0..staged.len() as u32).map(StagedId).find(|id| *id != root && !consumed.contains(id)) {
        return invalid(format!("{unused} is not used by the replacement"));
    }

    let old_root = graph.try_node(anchor)?;
    for output in graph.read_outputs(anchor).unique() {
        let Some(&new) = root_node.dtypes.get(output as usize) else {
            return invalid(format!("replacement lacks output #{output} read from {anchor}"));
        };
        if let Some(old) = old_root.dtype(output)
            && old != new
        {
            return invalid(format!("output #{output} changes dtype from {old} to {new}"));
        }
    }

    let doomed = removal_order(graph, env, &read);
    for &id in &doomed {
        for input in graph.try_node(id)?.inputs() {
            let producer = input.node;
            if doomed.contains(&producer) || read.contains(&producer) || graph.is_output(producer) {
                continue;
            }
            if graph.consumers(producer).iter().all(|u| doomed.contains(&u.user)) {
                return invalid(format!("replacement drops operand {input}, leaving {producer} unread"));
            }
        }
    }
    Ok(doomed)
}

/// The anchor, then every matched node whose readers are all already doomed.
/// Nodes read by the replacement or marked as graph outputs survive.
fn removal_order(graph: &Graph, env: &Env, read: &HashSet<NodeId>) -> Vec<NodeId> {
    let mut doomed = vec![env.anchor()];
    loop {
        let next = env.matched().iter().copied().find(|id| {
            !doomed.contains(id)
                && !read.contains(id)
                && !graph.is_output(*id)
                && graph.consumers(*id).iter().all(|u| doomed.contains(&u.user))
        });
        match next {
            Some(id) => doomed.push(id),
            None => return doomed,
        }
    }
}

fn check_existing(graph: &Graph, forbidden: &HashSet<NodeId>, value: Value) -> Result<()> {
    let Some(producer) = graph.node(value.node) else {
        return invalid(format!("operand {value} is not live"));
    };
    ensure!(
        (value.output as usize) < producer.num_outputs(),
        InvalidRewriteSnafu { reason: format!("operand {value} is out of range") }
    );
    ensure!(
        !forbidden.contains(&value.node),
        InvalidRewriteSnafu { reason: format!("operand {value} lies downstream of the matched root") }
    );
    Ok(())
}

fn invalid<T>(reason: String) -> Result<T> {
    InvalidRewriteSnafu { reason }.fail()
}
