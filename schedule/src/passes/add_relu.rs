use graft_ir::{Attrs, Env, Graph, OpKind, Pat, Replacement, Result, StagedId, Var, VarSet, pat};
use tracing::trace;

use super::{FusionRule, anchor_dtypes};

/// `Relu(Add(x, y))` => `FusedAddRelu(x, y)`.
///
/// Declines mixed-precision additions; the fused kernel takes one element
/// type.
#[derive(Debug)]
pub struct AddRelu {
    x: Var,
    y: Var,
}

impl FusionRule for AddRelu {
    fn define_pattern(vars: &mut VarSet) -> (Pat, Self) {
        let (x, y) = (vars.value("x"), vars.value("y"));
        (pat!(Relu(Add(x, y))), Self { x, y })
    }

    fn build(&self, graph: &Graph, env: &Env, staged: &mut Replacement) -> Result<Option<StagedId>> {
        let (x, y) = (env.value(self.x)?, env.value(self.y)?);
        if graph.dtype(x) != graph.dtype(y) {
            trace!(anchor = %env.anchor(), %x, %y, "operand dtypes differ, not fusing");
            return Ok(None);
        }
        Ok(Some(staged.add(OpKind::FusedAddRelu, [x, y], Attrs::new(), anchor_dtypes(graph, env)?)))
    }
}

/// `ReluGrad(Add(dy1, dy2), y)` => `FusedAddReluGrad(dy1, dy2, y)`.
#[derive(Debug)]
pub struct AddReluGrad {
    dy1: Var,
    dy2: Var,
    y: Var,
}

impl FusionRule for AddReluGrad {
    fn define_pattern(vars: &mut VarSet) -> (Pat, Self) {
        let (dy1, dy2, y) = (vars.value("dy1"), vars.value("dy2"), vars.value("y"));
        (pat!(ReluGrad(Add(dy1, dy2), y)), Self { dy1, dy2, y })
    }

    fn build(&self, graph: &Graph, env: &Env, staged: &mut Replacement) -> Result<Option<StagedId>> {
        let inputs = [env.value(self.dy1)?, env.value(self.dy2)?, env.value(self.y)?];
        Ok(Some(staged.add(OpKind::FusedAddReluGrad, inputs, Attrs::new(), anchor_dtypes(graph, env)?)))
    }
}
