use graft_dtype::DType;

use super::{add_relu_graph, bn_grad_cast_graph};
use crate::error::Error;
use crate::graph::Graph;
use crate::op::OpKind;
use crate::registry::OpRegistry;
use crate::types::{Attrs, NodeId, NodeOrigin, Use};

#[test]
fn test_add_node_tracks_consumers() {
    let (graph, a, b, add, relu) = add_relu_graph();
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.consumers(a), &[Use { user: add, slot: 0, output: 0 }]);
    assert_eq!(graph.consumers(b), &[Use { user: add, slot: 1, output: 0 }]);
    assert_eq!(graph.consumer_count(relu), 0);
    assert!(graph.is_output(relu));
    assert!(graph.is_live(relu));
    assert_eq!(graph.node(add).unwrap().origin(), NodeOrigin::Lowered);
}

#[test]
fn test_add_node_rejects_dangling_input() {
    let mut graph = Graph::new();
    let ghost = NodeId(7);
    let err = graph.add_node(OpKind::Relu, [ghost.value()], Attrs::new(), [DType::Float32]).unwrap_err();
    assert_eq!(err, Error::DanglingInput { value: ghost.value() });
    assert!(graph.is_empty());
}

#[test]
fn test_add_node_rejects_missing_output() {
    let mut graph = Graph::new();
    let p = graph.parameter("p", DType::Float32);
    let err = graph.add_node(OpKind::Relu, [p.out(2)], Attrs::new(), [DType::Float32]).unwrap_err();
    assert!(matches!(err, Error::OutputIndexOutOfRange { outputs: 1, .. }));
}

#[test]
fn test_add_output_rejects_dangling_value() {
    let mut graph = Graph::new();
    assert!(matches!(graph.add_output(NodeId(0)), Err(Error::DanglingInput { .. })));
}

#[test]
fn test_replace_all_uses_redirects_edges_and_outputs() {
    let (mut graph, a, b, add, relu) = add_relu_graph();
    let mul = graph.add_node(OpKind::Mul, [a.value(), b.value()], Attrs::new(), [DType::Float32]).unwrap();

    assert_eq!(graph.replace_all_uses(add, mul).unwrap(), 1);
    assert_eq!(graph.node(relu).unwrap().inputs(), &[mul.value()]);
    assert!(graph.consumers(add).is_empty());
    assert_eq!(graph.consumers(mul), &[Use { user: relu, slot: 0, output: 0 }]);

    let other = graph.add_node(OpKind::Relu, [mul.value()], Attrs::new(), [DType::Float32]).unwrap();
    assert_eq!(graph.replace_all_uses(relu, other).unwrap(), 1);
    assert_eq!(graph.outputs(), &[other.value()]);
    graph.verify_structure().unwrap();
}

#[test]
fn test_replace_all_uses_checks_output_range() {
    let fixture = bn_grad_cast_graph(2);
    let mut graph = fixture.graph;
    let before = graph.clone();

    // A single-output node cannot stand in for output #2.
    let err = graph.replace_all_uses(fixture.grad, fixture.operands[0]).unwrap_err();
    assert!(matches!(err, Error::OutputIndexOutOfRange { outputs: 1, .. }));
    assert_eq!(graph, before);
}

#[test]
fn test_remove_node_requires_no_consumers() {
    let (mut graph, _, _, add, relu) = add_relu_graph();
    assert_eq!(graph.remove_node(add).unwrap_err(), Error::NodeInUse { node: add, consumers: 1 });
    assert_eq!(graph.remove_node(relu).unwrap_err(), Error::NodeInUse { node: relu, consumers: 1 });
    assert_eq!(graph.remove_node(NodeId(42)).unwrap_err(), Error::UnknownNode { node: NodeId(42) });
}

#[test]
fn test_removed_ids_are_not_reused() {
    let mut graph = Graph::new();
    let p = graph.parameter("p", DType::Float32);
    let dead = graph.add_node(OpKind::Relu, [p.value()], Attrs::new(), [DType::Float32]).unwrap();
    graph.add_output(p).unwrap();

    let removed = graph.remove_node(dead).unwrap();
    assert_eq!(removed.op(), OpKind::Relu);
    assert!(graph.consumers(p).is_empty());
    assert!(!graph.contains(dead));

    let fresh = graph.add_node(OpKind::Relu, [p.value()], Attrs::new(), [DType::Float32]).unwrap();
    assert_ne!(fresh, dead);
    assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![p, fresh]);
}

#[test]
fn test_topological_order_breaks_ties_by_id() {
    let mut graph = Graph::new();
    let b = graph.parameter("b", DType::Float32);
    let a = graph.parameter("a", DType::Float32);
    let relu_a = graph.add_node(OpKind::Relu, [a.value()], Attrs::new(), [DType::Float32]).unwrap();
    let relu_b = graph.add_node(OpKind::Relu, [b.value()], Attrs::new(), [DType::Float32]).unwrap();
    let add = graph.add_node(OpKind::Add, [relu_b.value(), relu_a.value()], Attrs::new(), [DType::Float32]).unwrap();
    graph.add_output(add).unwrap();

    assert_eq!(graph.topological_order().unwrap(), vec![b, a, relu_a, relu_b, add]);
}

#[test]
fn test_prune_unreachable() {
    let (mut graph, a, _, add, relu) = add_relu_graph();
    let dangling = graph.add_node(OpKind::Relu, [add.value()], Attrs::new(), [DType::Float32]).unwrap();
    let chained = graph.add_node(OpKind::Relu, [dangling.value()], Attrs::new(), [DType::Float32]).unwrap();

    assert_eq!(graph.prune_unreachable().unwrap(), vec![chained, dangling]);
    assert_eq!(graph.len(), 4);
    assert!(graph.contains(a) && graph.contains(relu));
    graph.validate(&OpRegistry::standard()).unwrap();
}

#[test]
fn test_downstream() {
    let (graph, a, _, add, relu) = add_relu_graph();
    let downstream = graph.downstream(a);
    assert!(downstream.contains(&add) && downstream.contains(&relu));
    assert!(graph.downstream(relu).is_empty());
}

#[test]
fn test_validate_checks_schema() {
    let registry = OpRegistry::standard();
    let (graph, ..) = add_relu_graph();
    graph.validate(&registry).unwrap();

    let mut graph = Graph::new();
    let p = graph.parameter("p", DType::Float32);
    let add = graph.add_node(OpKind::Add, [p.value()], Attrs::new(), [DType::Float32]).unwrap();
    graph.add_output(add).unwrap();
    let err = graph.validate(&registry).unwrap_err();
    assert!(matches!(err, Error::GraphInvariantViolation { ref reason } if reason.contains("Add takes 2 inputs")));
}

#[test]
fn test_validate_checks_reachability() {
    let (mut graph, a, ..) = add_relu_graph();
    graph.add_node(OpKind::Relu, [a.value()], Attrs::new(), [DType::Float32]).unwrap();
    let err = graph.validate(&OpRegistry::standard()).unwrap_err();
    assert!(matches!(err, Error::GraphInvariantViolation { ref reason } if reason.contains("not reachable")));
    // Structure alone is still fine.
    graph.verify_structure().unwrap();
}

#[test]
fn test_validate_requires_registered_attrs() {
    let mut graph = Graph::new();
    let p = graph.parameter("p", DType::Float32);
    let q = graph.add_node(OpKind::Quantize, [p.value()], Attrs::new().with("scale", 0.5), [DType::Int8]).unwrap();
    graph.add_output(q).unwrap();
    let err = graph.validate(&OpRegistry::standard()).unwrap_err();
    assert!(err.to_string().contains("requires attribute 'zero_point'"), "{err}");
}

#[test]
fn test_expr_and_conforms() {
    let (graph, _, _, add, relu) = add_relu_graph();
    let expr = graph.expr(relu.value(), 2);
    assert_eq!(expr.depth(), 2);
    assert_eq!(expr.to_string(), "Relu(Add(%0, %1))");
    assert!(graph.conforms(relu.value(), &expr));
    assert!(!graph.conforms(add.value(), &expr));
    assert_eq!(graph.expr(relu.value(), 0), crate::Expr::Leaf(relu.value()));

    let shallow = graph.expr(relu.value(), 1);
    assert!(graph.conforms(relu.value(), &shallow));
    assert_ne!(shallow, expr);
}

#[test]
fn test_display_lists_nodes() {
    let (mut graph, _, _, add, _) = add_relu_graph();
    graph.set_name(add, "sum").unwrap();
    let text = graph.to_string();
    assert!(text.contains("%2 = Add(%0, %1) : float32 'sum'"), "{text}");
    assert!(text.ends_with("outputs: [%3]"), "{text}");
}

#[test]
fn test_dtype_of_value() {
    let fixture = bn_grad_cast_graph(1);
    let graph = &fixture.graph;
    assert_eq!(graph.dtype(fixture.cast.value()), Some(DType::Float16));
    assert_eq!(graph.dtype(fixture.grad.out(2)), Some(DType::Float32));
    assert_eq!(graph.dtype(fixture.grad.out(3)), None);
    assert_eq!(graph.dtype(NodeId(99).value()), None);
}
