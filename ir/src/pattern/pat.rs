//! Pattern trees.
//!
//! A [`Pat`] describes the shape of a subgraph from its root downwards:
//! operator patterns constrain kind, operands, output index, dtype and
//! attributes; variable leaves stand for arbitrary operands.
//!
//! # Example
//!
//! ```ignore
//! let mut vars = VarSet::new();
//! let (a, b) = (vars.value("a"), vars.value("b"));
//! let pattern = Pattern::new(vars, pat!(Relu(Add(a, b))));
//! ```

use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};
use snafu::ensure;

use graft_dtype::DType;

use super::expr::Expr;
use super::vars::{Binding, Env, Var, VarInfo, VarKind, VarSet};
use crate::error::*;
use crate::graph::Graph;
use crate::op::OpKind;
use crate::registry::{Arity, OpRegistry};
use crate::types::{AttrValue, NodeId, Value};

/// Operand patterns of an operator pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Inputs {
    /// Exactly these operands, in order.
    Exact(Vec<Pat>),
    /// Two operands in either order. The written order is tried first.
    Commutative(Box<[Pat; 2]>),
    /// Operands are not inspected.
    Ignore,
}

/// Constraint on the output index the consumer edge reads.
///
/// Ignored at the pattern root, which has no consumer edge.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OutputPat {
    #[default]
    Any,
    Exact(u32),
    /// Bind the index to an attribute variable.
    Bind(Var),
}

/// Side-constraint on a node attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrConstraint {
    Eq { name: String, value: AttrValue },
    /// Numeric attribute (integers widen) within bounds.
    InRange { name: String, low: Bound<f64>, high: Bound<f64> },
    Present { name: String },
    /// Bind the attribute to an attribute variable.
    Bind { name: String, var: Var },
}

impl AttrConstraint {
    pub fn name(&self) -> &str {
        match self {
            Self::Eq { name, .. } | Self::InRange { name, .. } | Self::Present { name } | Self::Bind { name, .. } => {
                name
            }
        }
    }
}

/// Pattern tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Pat {
    /// Binds any operand.
    Var(Var),
    /// Operator node with constrained kind and operands. An empty `kinds`
    /// list accepts every kind.
    Op {
        kinds: SmallVec<[OpKind; 2]>,
        inputs: Inputs,
        output: OutputPat,
        dtypes: SmallVec<[DType; 2]>,
        attrs: Vec<AttrConstraint>,
        bind: Option<Var>,
    },
    /// First matching alternative wins.
    Any(Vec<Pat>),
}

impl Pat {
    pub fn var(var: Var) -> Self {
        Self::Var(var)
    }

    /// Operator of kind `kind` with exactly `inputs`.
    pub fn op(kind: OpKind, inputs: impl IntoIterator<Item = Pat>) -> Self {
        Self::ops([kind], inputs)
    }

    /// Operator of any kind in `kinds` with exactly `inputs`.
    pub fn ops(kinds: impl IntoIterator<Item = OpKind>, inputs: impl IntoIterator<Item = Pat>) -> Self {
        Self::with_inputs(kinds, Inputs::Exact(inputs.into_iter().collect()))
    }

    /// Binary operator whose operands may appear in either order.
    pub fn commutative(kind: OpKind, a: Pat, b: Pat) -> Self {
        Self::with_inputs([kind], Inputs::Commutative(Box::new([a, b])))
    }

    /// Operator of kind `kind` with operands left unconstrained.
    pub fn any_inputs(kind: OpKind) -> Self {
        Self::with_inputs([kind], Inputs::Ignore)
    }

    pub fn any(alternatives: impl IntoIterator<Item = Pat>) -> Self {
        Self::Any(alternatives.into_iter().collect())
    }

    fn with_inputs(kinds: impl IntoIterator<Item = OpKind>, inputs: Inputs) -> Self {
        Self::Op {
            kinds: kinds.into_iter().collect(),
            inputs,
            output: OutputPat::Any,
            dtypes: smallvec![],
            attrs: Vec::new(),
            bind: None,
        }
    }

    // Constraint builders. They apply to operator patterns and to every
    // alternative of `Any`; variable leaves are left unchanged.

    /// Bind the matched node to a node variable.
    pub fn named(self, var: Var) -> Self {
        self.map_op(|_, _, _, bind| *bind = Some(var))
    }

    /// Require the consumer edge to read output `index`.
    pub fn output(self, index: u32) -> Self {
        self.map_op(|output, _, _, _| *output = OutputPat::Exact(index))
    }

    /// Bind the output index read by the consumer edge.
    pub fn output_var(self, var: Var) -> Self {
        self.map_op(|output, _, _, _| *output = OutputPat::Bind(var))
    }

    /// Require the read output to have dtype `dtype` (repeatable: any listed
    /// dtype is accepted).
    pub fn with_dtype(self, dtype: DType) -> Self {
        self.map_op(|_, dtypes, _, _| dtypes.push(dtype))
    }

    pub fn attr_eq(self, name: &str, value: impl Into<AttrValue>) -> Self {
        let value = value.into();
        self.map_op(|_, _, attrs, _| {
            attrs.push(AttrConstraint::Eq { name: name.to_string(), value: value.clone() })
        })
    }

    /// Require a numeric attribute within `range`.
    pub fn attr_in(self, name: &str, range: impl RangeBounds<f64>) -> Self {
        let (low, high) = (range.start_bound().cloned(), range.end_bound().cloned());
        self.map_op(|_, _, attrs, _| attrs.push(AttrConstraint::InRange { name: name.to_string(), low, high }))
    }

    pub fn attr_present(self, name: &str) -> Self {
        self.map_op(|_, _, attrs, _| attrs.push(AttrConstraint::Present { name: name.to_string() }))
    }

    pub fn attr_bind(self, name: &str, var: Var) -> Self {
        self.map_op(|_, _, attrs, _| attrs.push(AttrConstraint::Bind { name: name.to_string(), var }))
    }

    fn map_op(
        mut self,
        mut f: impl FnMut(
            &mut OutputPat,
            &mut SmallVec<[DType; 2]>,
            &mut Vec<AttrConstraint>,
            &mut Option<Var>,
        ),
    ) -> Self {
        fn walk(
            pat: &mut Pat,
            f: &mut dyn FnMut(
                &mut OutputPat,
                &mut SmallVec<[DType; 2]>,
                &mut Vec<AttrConstraint>,
                &mut Option<Var>,
            ),
        ) {
            match pat {
                Pat::Var(_) => {}
                Pat::Op { output, dtypes, attrs, bind, .. } => f(output, dtypes, attrs, bind),
                Pat::Any(alternatives) => alternatives.iter_mut().for_each(|alt| walk(alt, f)),
            }
        }
        walk(&mut self, &mut f);
        self
    }

    /// Longest operator chain from this pattern to a leaf.
    pub fn depth(&self) -> usize {
        match self {
            Self::Var(_) => 0,
            Self::Op { inputs: Inputs::Ignore, .. } => 1,
            Self::Op { inputs: Inputs::Exact(children), .. } => 1 + children.iter().map(Pat::depth).max().unwrap_or(0),
            Self::Op { inputs: Inputs::Commutative(children), .. } => {
                1 + children.iter().map(Pat::depth).max().unwrap_or(0)
            }
            Self::Any(alternatives) => alternatives.iter().map(Pat::depth).max().unwrap_or(0),
        }
    }

    fn visit<'p>(&'p self, f: &mut impl FnMut(&'p Pat)) {
        f(self);
        match self {
            Self::Var(_) | Self::Op { inputs: Inputs::Ignore, .. } => {}
            Self::Op { inputs: Inputs::Exact(children), .. } => children.iter().for_each(|c| c.visit(f)),
            Self::Op { inputs: Inputs::Commutative(children), .. } => children.iter().for_each(|c| c.visit(f)),
            Self::Any(alternatives) => alternatives.iter().for_each(|c| c.visit(f)),
        }
    }
}

/// A pattern tree together with the variable set it was written against.
#[derive(Debug, Clone)]
pub struct Pattern {
    root: Pat,
    set: u32,
    vars: Arc<[VarInfo]>,
}

impl Pattern {
    pub fn new(vars: VarSet, root: Pat) -> Self {
        let (set, vars) = vars.freeze();
        Self { root, set, vars }
    }

    pub fn root(&self) -> &Pat {
        &self.root
    }

    /// Kinds the anchor may have. Empty if any kind is accepted.
    pub fn root_kinds(&self) -> SmallVec<[OpKind; 2]> {
        let mut kinds = SmallVec::new();
        let mut any_kind = false;
        collect_root_kinds(&self.root, &mut kinds, &mut any_kind);
        if any_kind { SmallVec::new() } else { kinds }
    }

    /// Cheap pre-filter: could a node of `kind` anchor this pattern?
    pub fn root_accepts(&self, kind: OpKind) -> bool {
        let kinds = self.root_kinds();
        kinds.is_empty() || kinds.contains(&kind)
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Fresh, empty environment for a match attempt at `anchor`.
    pub fn env(&self, anchor: NodeId) -> Env {
        Env::new(self.set, self.vars.clone(), anchor)
    }

    /// Check that the pattern can match graphs described by `registry`.
    ///
    /// Rejects variable leaves at the root, empty alternatives, unregistered
    /// kinds, operand counts the declared arity forbids, out-of-range output
    /// indices, foreign variables and variables of the wrong kind.
    pub fn check(&self, registry: &OpRegistry) -> Result<()> {
        ensure!(!root_binds_variable(&self.root), InvalidPatternSnafu { reason: "pattern root must be an operator" });

        let mut problems = Vec::new();
        self.root.visit(&mut |pat| match pat {
            Pat::Var(var) => {
                if let Err(reason) = self.expect_kind(*var, &[VarKind::Value, VarKind::Node]) {
                    problems.push(reason);
                }
            }
            Pat::Any(alternatives) if alternatives.is_empty() => problems.push("empty alternative list".to_string()),
            Pat::Any(_) => {}
            Pat::Op { kinds, inputs, output, attrs, bind, .. } => {
                for &kind in kinds {
                    if let Err(reason) = check_kind(registry, kind, inputs, output) {
                        problems.push(reason);
                    }
                }
                if let OutputPat::Bind(var) = output
                    && let Err(reason) = self.expect_kind(*var, &[VarKind::Attr])
                {
                    problems.push(reason);
                }
                for constraint in attrs {
                    if let AttrConstraint::Bind { var, .. } = constraint
                        && let Err(reason) = self.expect_kind(*var, &[VarKind::Attr])
                    {
                        problems.push(reason);
                    }
                }
                if let Some(var) = bind
                    && let Err(reason) = self.expect_kind(*var, &[VarKind::Node])
                {
                    problems.push(reason);
                }
            }
        });

        match problems.into_iter().next() {
            Some(reason) => InvalidPatternSnafu { reason }.fail(),
            None => Ok(()),
        }
    }

    fn expect_kind(&self, var: Var, allowed: &[VarKind]) -> Result<(), String> {
        let info = if var.set == self.set { self.vars.get(var.index as usize) } else { None };
        let Some(info) = info else {
            return Err(format!("variable {var} belongs to another pattern"));
        };
        if allowed.contains(&info.kind) {
            Ok(())
        } else {
            Err(format!("{} variable '{}' used where a {} variable is expected", info.kind, info.name, allowed[0]))
        }
    }

    /// Rebuild the matched subgraph from an environment.
    ///
    /// Operator patterns are followed through `graph` from the anchor,
    /// replaying the alternatives and operand orders recorded in `env`;
    /// variable leaves and named nodes are re-resolved from their bindings.
    pub fn substitute(&self, env: &Env, graph: &Graph) -> Result<Expr> {
        let mut trail = env.trail.iter().copied();
        substitute(&self.root, env, graph, env.anchor().value(), &mut trail)
    }
}

/// True if some alternative at the root is a bare variable.
fn root_binds_variable(pat: &Pat) -> bool {
    match pat {
        Pat::Var(_) => true,
        Pat::Op { .. } => false,
        Pat::Any(alternatives) => alternatives.iter().any(root_binds_variable),
    }
}

fn collect_root_kinds(pat: &Pat, kinds: &mut SmallVec<[OpKind; 2]>, any_kind: &mut bool) {
    match pat {
        Pat::Var(_) => *any_kind = true,
        Pat::Op { kinds: own, .. } if own.is_empty() => *any_kind = true,
        Pat::Op { kinds: own, .. } => {
            for kind in own {
                if !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
        }
        Pat::Any(alternatives) => alternatives.iter().for_each(|alt| collect_root_kinds(alt, kinds, any_kind)),
    }
}

fn check_kind(registry: &OpRegistry, kind: OpKind, inputs: &Inputs, output: &OutputPat) -> Result<(), String> {
    let schema = registry.schema(kind).ok_or_else(|| format!("{kind} is not registered"))?;
    let count = match inputs {
        Inputs::Exact(children) => Some(children.len()),
        Inputs::Commutative(_) => Some(2),
        Inputs::Ignore => None,
    };
    if let Some(count) = count
        && !schema.inputs.accepts(count)
    {
        return Err(format!("{kind} takes {} inputs, pattern has {count}", schema.inputs));
    }
    if matches!(inputs, Inputs::Commutative(_)) && schema.inputs != Arity::Fixed(2) {
        return Err(format!("{kind} is not binary"));
    }
    if let OutputPat::Exact(index) = output
        && *index as usize >= schema.outputs
    {
        return Err(format!("{kind} has {} outputs, pattern reads #{index}", schema.outputs));
    }
    Ok(())
}

fn substitute(
    pat: &Pat,
    env: &Env,
    graph: &Graph,
    value: Value,
    trail: &mut impl Iterator<Item = u8>,
) -> Result<Expr> {
    match pat {
        Pat::Var(var) => match env.resolve(*var)? {
            Binding::Value(bound) => Ok(Expr::Leaf(*bound)),
            Binding::Node(node) => Ok(Expr::Leaf(node.out(value.output))),
            Binding::Attr(_) => BindingKindMismatchSnafu {
                name: var.to_string(),
                expected: VarKind::Value,
                actual: VarKind::Attr,
            }
            .fail(),
        },
        Pat::Any(alternatives) => {
            let choice = trail.next().map(usize::from).unwrap_or(0);
            let alternative = alternatives
                .get(choice)
                .ok_or_else(|| Error::InvalidPattern { reason: format!("no alternative #{choice}") })?;
            substitute(alternative, env, graph, value, trail)
        }
        Pat::Op { inputs, bind, .. } => {
            let node_id = match bind {
                Some(var) => env.node(*var)?,
                None => value.node,
            };
            let node = graph.try_node(node_id)?;
            let value = node_id.out(value.output);
            let children = match inputs {
                Inputs::Ignore => node.inputs().iter().map(|&v| Expr::Leaf(v)).collect(),
                Inputs::Exact(children) => children
                    .iter()
                    .zip(node.inputs())
                    .map(|(child, &input)| substitute(child, env, graph, input, trail))
                    .collect::<Result<Vec<_>>>()?,
                Inputs::Commutative(children) => {
                    let order: [usize; 2] = if trail.next() == Some(1) { [1, 0] } else { [0, 1] };
                    let mut out = vec![Expr::Leaf(value); 2];
                    for (child, slot) in children.iter().zip(order) {
                        let input = node.input(slot).ok_or_else(|| Error::InvalidPattern {
                            reason: format!("{} has no input {slot}", node.op()),
                        })?;
                        out[slot] = substitute(child, env, graph, input, trail)?;
                    }
                    out
                }
            };
            Ok(Expr::Node { value, op: node.op(), children })
        }
    }
}
