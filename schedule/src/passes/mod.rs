//! Fusion pass descriptors.
//!
//! A pass is a [`Pattern`] plus a builder that stages the fused replacement.
//! Built-in passes form the closed set [`PassKind`]; each is written as a
//! [`FusionRule`] and instantiated with a fresh variable set every time.

mod add_relu;
mod batch_norm_relu;
mod bn_grad_cast;
mod square;

use std::fmt;

use graft_dtype::DType;
use graft_ir::{Env, Graph, Pat, Pattern, Replacement, Result, StagedId, VarSet};

pub use add_relu::{AddRelu, AddReluGrad};
pub use batch_norm_relu::BatchNormRelu;
pub use bn_grad_cast::BnGradCast;
pub use square::Square;

/// Builder half of a pass: stages the replacement for one match, or returns
/// `None` to decline.
pub type BuildFn = Box<dyn Fn(&Graph, &Env, &mut Replacement) -> Result<Option<StagedId>> + Send + Sync>;

/// A fusion written against the uniform `define_pattern` / `build` interface.
pub trait FusionRule: Sized + Send + Sync + 'static {
    /// Declare the pattern. Returns the root together with the rule state
    /// (the variables `build` reads back).
    fn define_pattern(vars: &mut VarSet) -> (Pat, Self);

    /// Stage the replacement for a match of the pattern.
    fn build(&self, graph: &Graph, env: &Env, staged: &mut Replacement) -> Result<Option<StagedId>>;
}

/// Named pattern and replacement builder, ready for a
/// [`PassManager`](crate::PassManager).
pub struct FusionPass {
    name: &'static str,
    pattern: Pattern,
    build: BuildFn,
}

impl FusionPass {
    pub fn new(
        name: &'static str,
        pattern: Pattern,
        build: impl Fn(&Graph, &Env, &mut Replacement) -> Result<Option<StagedId>> + Send + Sync + 'static,
    ) -> Self {
        Self { name, pattern, build: Box::new(build) }
    }

    /// Instantiate a [`FusionRule`] under `name`.
    pub fn from_rule<R: FusionRule>(name: &'static str) -> Self {
        let mut vars = VarSet::new();
        let (root, rule) = R::define_pattern(&mut vars);
        Self::new(name, Pattern::new(vars, root), move |graph, env, staged| rule.build(graph, env, staged))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn build(&self, graph: &Graph, env: &Env, staged: &mut Replacement) -> Result<Option<StagedId>> {
        (self.build)(graph, env, staged)
    }
}

impl fmt::Debug for FusionPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FusionPass").field("name", &self.name).field("pattern", &self.pattern).finish_non_exhaustive()
    }
}

/// Built-in fusion passes, in standard pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter, strum::IntoStaticStr)]
pub enum PassKind {
    /// `Cast[float16](BatchNormGrad(..)[i])` to `FusedBatchNormGradCast`.
    #[strum(serialize = "replace_bn_grad_cast2")]
    BnGradCast,
    /// `Relu(BatchNorm(..)[0])` to `FusedBatchNormRelu`.
    #[strum(serialize = "batch_norm_relu_fusion")]
    BatchNormRelu,
    /// `ReluGrad(Add(dy1, dy2), y)` to `FusedAddReluGrad`.
    #[strum(serialize = "add_relu_grad_fusion")]
    AddReluGrad,
    /// `Relu(Add(x, y))` to `FusedAddRelu`.
    #[strum(serialize = "add_relu_fusion")]
    AddRelu,
    /// `Mul(x, x)` to `Square`.
    #[strum(serialize = "square_fusion")]
    Square,
}

impl PassKind {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Fresh pass instance with its own variable set.
    pub fn instantiate(self) -> FusionPass {
        let name = self.name();
        match self {
            Self::BnGradCast => FusionPass::from_rule::<BnGradCast>(name),
            Self::BatchNormRelu => FusionPass::from_rule::<BatchNormRelu>(name),
            Self::AddReluGrad => FusionPass::from_rule::<AddReluGrad>(name),
            Self::AddRelu => FusionPass::from_rule::<AddRelu>(name),
            Self::Square => FusionPass::from_rule::<Square>(name),
        }
    }
}

/// Output dtypes of the matched root, for replacements that keep them.
fn anchor_dtypes(graph: &Graph, env: &Env) -> Result<Vec<DType>> {
    Ok(graph.try_node(env.anchor())?.dtypes().to_vec())
}
