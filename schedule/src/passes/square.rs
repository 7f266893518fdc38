use graft_ir::{Attrs, Env, Graph, OpKind, Pat, Replacement, Result, StagedId, Var, VarSet, pat};

use super::{FusionRule, anchor_dtypes};

/// `Mul(x, x)` => `Square(x)`. Both operands must be the same value.
#[derive(Debug)]
pub struct Square {
    x: Var,
}

impl FusionRule for Square {
    fn define_pattern(vars: &mut VarSet) -> (Pat, Self) {
        let x = vars.value("x");
        (pat!(Mul(x, x)), Self { x })
    }

    fn build(&self, graph: &Graph, env: &Env, staged: &mut Replacement) -> Result<Option<StagedId>> {
        Ok(Some(staged.add(OpKind::Square, [env.value(self.x)?], Attrs::new(), anchor_dtypes(graph, env)?)))
    }
}
