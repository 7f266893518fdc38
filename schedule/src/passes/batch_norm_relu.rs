use graft_ir::{Attrs, Env, Graph, OpKind, Pat, Replacement, Result, StagedId, Var, VarSet, pat};

use super::{FusionRule, anchor_dtypes};

/// `Relu(BatchNorm(x, scale, bias, mean, var)[0])` => `FusedBatchNormRelu`.
#[derive(Debug)]
pub struct BatchNormRelu {
    operands: [Var; 5],
    epsilon: Var,
}

impl FusionRule for BatchNormRelu {
    fn define_pattern(vars: &mut VarSet) -> (Pat, Self) {
        let operands = ["x", "scale", "bias", "mean", "var"].map(|name| vars.value(name));
        let epsilon = vars.attr("epsilon");

        let [x, scale, bias, mean, var] = operands;
        let norm = pat!(BatchNorm(x, scale, bias, mean, var)).output(0).attr_bind("epsilon", epsilon);
        (pat!(Relu({ norm })), Self { operands, epsilon })
    }

    fn build(&self, graph: &Graph, env: &Env, staged: &mut Replacement) -> Result<Option<StagedId>> {
        let inputs = self.operands.iter().map(|&var| env.value(var)).collect::<Result<Vec<_>>>()?;
        let attrs = Attrs::new().with("epsilon", env.attr(self.epsilon)?.clone());
        Ok(Some(staged.add(OpKind::FusedBatchNormRelu, inputs, attrs, anchor_dtypes(graph, env)?)))
    }
}
