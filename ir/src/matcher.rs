//! Matcher: unifies a [`Pattern`] with the subgraph rooted at an anchor.
//!
//! Matching is total over the pattern: any violated constraint anywhere in
//! the tree aborts the attempt. Alternatives and commutative operands are
//! tried on a cloned environment so a failed branch leaves no bindings
//! behind.

use std::ops::Bound;

use tracing::trace;

use crate::error::Result;
use crate::graph::Graph;
use crate::pattern::{AttrConstraint, Binding, Env, Inputs, OutputPat, Pat, Pattern, VarKind};
use crate::registry::OpRegistry;
use crate::types::{AttrValue, NodeId, Value};

/// Match `pattern` with `anchor` as the root.
///
/// Returns `None` when the anchor's kind is not one the pattern root accepts
/// or when any constraint fails. Binding conflicts count as a mismatch.
pub fn match_at(graph: &Graph, registry: &OpRegistry, pattern: &Pattern, anchor: NodeId) -> Option<Env> {
    let node = graph.node(anchor)?;
    if !pattern.root_accepts(node.op()) {
        return None;
    }

    let mut env = pattern.env(anchor);
    let matched = Matcher { graph, registry }.matches(pattern.root(), anchor.value(), true, &mut env);
    trace!(anchor = %anchor, op = %node.op(), matched, "match attempt");
    matched.then_some(env)
}

/// Every anchor matching `pattern`, in topological order.
pub fn find_matches(graph: &Graph, registry: &OpRegistry, pattern: &Pattern) -> Result<Vec<Env>> {
    Ok(graph
        .topological_order()?
        .into_iter()
        .filter_map(|anchor| match_at(graph, registry, pattern, anchor))
        .collect())
}

struct Matcher<'a> {
    graph: &'a Graph,
    registry: &'a OpRegistry,
}

impl Matcher<'_> {
    fn matches(&self, pat: &Pat, value: Value, root: bool, env: &mut Env) -> bool {
        match pat {
            Pat::Var(var) => {
                let binding = match env.kind(*var) {
                    Some(VarKind::Value) => Binding::Value(value),
                    Some(VarKind::Node) => Binding::Node(value.node),
                    _ => return false,
                };
                env.bind(*var, binding).is_ok()
            }

            Pat::Any(alternatives) => {
                for (index, alternative) in alternatives.iter().enumerate() {
                    let mut trial = env.clone();
                    trial.trail.push(index as u8);
                    if self.matches(alternative, value, root, &mut trial) {
                        *env = trial;
                        return true;
                    }
                }
                false
            }

            Pat::Op { kinds, inputs, output, dtypes, attrs, bind } => {
                let Some(node) = self.graph.node(value.node) else { return false };

                if !kinds.is_empty() && !kinds.contains(&node.op()) {
                    return false;
                }
                let Some(schema) = self.registry.schema(node.op()) else { return false };
                if !schema.inputs.accepts(node.inputs().len()) {
                    return false;
                }

                if !root {
                    match output {
                        OutputPat::Any => {}
                        OutputPat::Exact(index) if *index == value.output => {}
                        OutputPat::Exact(_) => return false,
                        OutputPat::Bind(var) => {
                            if env.bind(*var, Binding::Attr(AttrValue::Int(value.output.into()))).is_err() {
                                return false;
                            }
                        }
                    }
                }

                if !dtypes.is_empty() && !node.dtype(value.output).is_some_and(|dtype| dtypes.contains(&dtype)) {
                    return false;
                }
                if !attrs.iter().all(|constraint| check_attr(node.attr(constraint.name()), constraint, env)) {
                    return false;
                }
                if let Some(var) = bind
                    && env.bind(*var, Binding::Node(value.node)).is_err()
                {
                    return false;
                }
                env.record_match(value.node);

                match inputs {
                    Inputs::Ignore => true,
                    Inputs::Exact(children) => {
                        children.len() == node.inputs().len()
                            && children
                                .iter()
                                .zip(node.inputs())
                                .all(|(child, &input)| self.matches(child, input, false, env))
                    }
                    Inputs::Commutative(children) => {
                        let [first, second] = match node.inputs() {
                            [a, b] => [*a, *b],
                            _ => return false,
                        };
                        for (choice, order) in [(0u8, [first, second]), (1, [second, first])] {
                            let mut trial = env.clone();
                            trial.trail.push(choice);
                            let matched = children
                                .iter()
                                .zip(order)
                                .all(|(child, input)| self.matches(child, input, false, &mut trial));
                            if matched {
                                *env = trial;
                                return true;
                            }
                        }
                        false
                    }
                }
            }
        }
    }
}

fn check_attr(actual: Option<&AttrValue>, constraint: &AttrConstraint, env: &mut Env) -> bool {
    let Some(actual) = actual else { return false };
    match constraint {
        AttrConstraint::Present { .. } => true,
        AttrConstraint::Eq { value, .. } => actual == value,
        AttrConstraint::InRange { low, high, .. } => actual.as_f64().is_some_and(|v| within(v, *low, *high)),
        AttrConstraint::Bind { var, .. } => env.bind(*var, Binding::Attr(actual.clone())).is_ok(),
    }
}

fn within(v: f64, low: Bound<f64>, high: Bound<f64>) -> bool {
    let above = match low {
        Bound::Included(l) => v >= l,
        Bound::Excluded(l) => v > l,
        Bound::Unbounded => true,
    };
    let below = match high {
        Bound::Included(h) => v <= h,
        Bound::Excluded(h) => v < h,
        Bound::Unbounded => true,
    };
    above && below
}
