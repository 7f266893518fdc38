use std::ops::Bound;

use graft_dtype::DType;
use graft_ir::{Attrs, Env, Graph, OpKind, Pat, Replacement, Result, StagedId, Var, VarSet, pat};

use super::{FusionRule, anchor_dtypes};

/// Folds a half-precision cast of one batch-norm gradient output into the
/// gradient kernel.
///
/// ```text
/// Cast[float16](BatchNormGrad(dy, x, scale, mean, var)[i])
///   => FusedBatchNormGradCast(dy, x, scale, mean, var) {epsilon, output_index = i}
/// ```
///
/// The gradient node survives when other consumers still read it.
#[derive(Debug)]
pub struct BnGradCast {
    operands: [Var; 5],
    index: Var,
    epsilon: Var,
}

impl FusionRule for BnGradCast {
    fn define_pattern(vars: &mut VarSet) -> (Pat, Self) {
        let operands = ["dy", "x", "scale", "mean", "var"].map(|name| vars.value(name));
        let (index, epsilon) = (vars.attr("index"), vars.attr("epsilon"));

        let [dy, x, scale, mean, var] = operands;
        let grad = pat!(BatchNormGrad(dy, x, scale, mean, var))
            .output_var(index)
            .attr_in("epsilon", (Bound::Excluded(0.0), Bound::Excluded(1.0)))
            .attr_bind("epsilon", epsilon);
        let root = pat!(Cast({ grad })).with_dtype(DType::Float16);

        (root, Self { operands, index, epsilon })
    }

    fn build(&self, graph: &Graph, env: &Env, staged: &mut Replacement) -> Result<Option<StagedId>> {
        let inputs = self.operands.iter().map(|&var| env.value(var)).collect::<Result<Vec<_>>>()?;
        let attrs = Attrs::new()
            .with("epsilon", env.attr(self.epsilon)?.clone())
            .with("output_index", env.index(self.index)?);
        let fused = staged.add(OpKind::FusedBatchNormGradCast, inputs, attrs, anchor_dtypes(graph, env)?);
        staged.set_name(fused, "bn_grad_cast");
        Ok(Some(fused))
    }
}
