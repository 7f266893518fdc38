use proptest::prelude::*;
use strum::IntoEnumIterator;

use graft_ir::test::property::generators::arb_graph;
use graft_ir::{OpRegistry, find_matches};

use crate::config::OptimizerConfig;
use crate::manager::PassManager;
use crate::passes::PassKind;

fn standard(registry: &OpRegistry) -> PassManager<'_> {
    PassManager::standard(registry, OptimizerConfig::default()).unwrap()
}

proptest! {
    #[test]
    fn pipeline_keeps_graphs_valid(mut graph in arb_graph()) {
        let registry = OpRegistry::standard();
        let report = standard(&registry).run(&mut graph).unwrap();
        prop_assert!(report.converged());
        prop_assert!(graph.validate(&registry).is_ok());
    }

    #[test]
    fn pipeline_preserves_output_types(mut graph in arb_graph()) {
        let registry = OpRegistry::standard();
        let before: Vec<_> = graph.outputs().iter().map(|&v| graph.dtype(v)).collect();
        standard(&registry).run(&mut graph).unwrap();
        let after: Vec<_> = graph.outputs().iter().map(|&v| graph.dtype(v)).collect();
        prop_assert_eq!(after, before);
    }

    #[test]
    fn second_run_applies_nothing(mut graph in arb_graph()) {
        let registry = OpRegistry::standard();
        let manager = standard(&registry);
        manager.run(&mut graph).unwrap();

        let before = graph.clone();
        prop_assert_eq!(manager.run(&mut graph).unwrap().total_rewrites(), 0);
        prop_assert_eq!(graph, before);
    }

    #[test]
    fn disabled_pipeline_is_noop(mut graph in arb_graph()) {
        let registry = OpRegistry::standard();
        let disabled: Vec<PassKind> = PassKind::iter().collect();
        let config = OptimizerConfig::builder().disabled(disabled).build();
        let manager = PassManager::standard(&registry, config).unwrap();
        prop_assert!(manager.passes().is_empty());

        let before = graph.clone();
        prop_assert!(manager.run(&mut graph).unwrap().passes.is_empty());
        prop_assert_eq!(graph, before);
    }

    /// Passes that never decline leave no match behind.
    #[test]
    fn converged_passes_leave_no_matches(mut graph in arb_graph()) {
        let registry = OpRegistry::standard();
        standard(&registry).run(&mut graph).unwrap();
        for kind in [PassKind::BnGradCast, PassKind::BatchNormRelu, PassKind::AddReluGrad, PassKind::Square] {
            let pass = kind.instantiate();
            prop_assert!(find_matches(&graph, &registry, pass.pattern()).unwrap().is_empty(), "{kind} still matches");
        }
    }
}
