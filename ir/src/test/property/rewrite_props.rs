use proptest::prelude::*;

use super::generators::{add_relu, arb_graph, bn_grad_cast, square};
use crate::matcher::{find_matches, match_at};
use crate::pattern::{Pattern, VarSet};
use crate::registry::OpRegistry;

proptest! {
    #[test]
    fn generated_graphs_validate(graph in arb_graph()) {
        prop_assert!(graph.validate(&OpRegistry::standard()).is_ok());
    }

    /// A match re-resolved through its environment describes exactly the
    /// subgraph under the anchor.
    #[test]
    fn substitution_reproduces_matched_subgraph(graph in arb_graph()) {
        let registry = OpRegistry::standard();
        for fusion in [add_relu(), square(), bn_grad_cast()] {
            for env in find_matches(&graph, &registry, &fusion.pattern).unwrap() {
                let expr = fusion.pattern.substitute(&env, &graph).unwrap();
                let anchor = env.anchor().value();
                prop_assert!(graph.conforms(anchor, &expr));
                prop_assert_eq!(&expr, &graph.expr(anchor, fusion.pattern.depth()));
            }
        }
    }

    #[test]
    fn match_attempts_leave_graph_unchanged(graph in arb_graph()) {
        let registry = OpRegistry::standard();
        let before = graph.clone();
        for fusion in [add_relu(), square(), bn_grad_cast()] {
            for anchor in graph.node_ids() {
                let _ = match_at(&graph, &registry, &fusion.pattern, anchor);
            }
        }
        prop_assert_eq!(graph, before);
    }

    #[test]
    fn sweep_without_matches_is_noop(graph in arb_graph()) {
        let registry = OpRegistry::standard();
        let mut vars = VarSet::new();
        let x = vars.value("x");
        let quantize = super::generators::TestFusion::new(
            "never",
            Pattern::new(vars, crate::pat!(Quantize(x))),
            |_, _, _| Ok(None),
        );

        let mut rewritten = graph.clone();
        prop_assert_eq!(quantize.sweep(&mut rewritten, &registry).unwrap(), 0);
        prop_assert_eq!(rewritten, graph);
    }

    #[test]
    fn rewrites_preserve_validity(mut graph in arb_graph()) {
        let registry = OpRegistry::standard();
        for fusion in [bn_grad_cast(), add_relu(), square()] {
            while fusion.sweep(&mut graph, &registry).unwrap() > 0 {}
            prop_assert!(graph.validate(&registry).is_ok(), "invalid after {}:\n{}", fusion.name, graph);
        }
        for fusion in [bn_grad_cast(), add_relu(), square()] {
            prop_assert!(find_matches(&graph, &registry, &fusion.pattern).unwrap().is_empty());
        }
    }

    #[test]
    fn second_sweep_finds_nothing(mut graph in arb_graph()) {
        let registry = OpRegistry::standard();
        for fusion in [bn_grad_cast(), add_relu(), square()] {
            while fusion.sweep(&mut graph, &registry).unwrap() > 0 {}
            let snapshot = graph.clone();
            prop_assert_eq!(fusion.sweep(&mut graph, &registry).unwrap(), 0);
            prop_assert_eq!(&graph, &snapshot);
        }
    }
}
