mod graph;
mod registry;

use graft_dtype::DType;

use crate::graph::Graph;
use crate::op::OpKind;
use crate::types::{Attrs, NodeId};

/// Handles of the batch-norm-gradient + cast chain built by [`bn_grad_cast_graph`].
pub(crate) struct BnGradCast {
    pub graph: Graph,
    pub operands: [NodeId; 5],
    pub grad: NodeId,
    pub cast: NodeId,
}

/// `out = Cast[float16](BatchNormGrad(dy, x, scale, mean, var)[index])`
pub(crate) fn bn_grad_cast_graph(index: u32) -> BnGradCast {
    let mut graph = Graph::new();
    let operands = ["dy", "x", "scale", "mean", "var"].map(|name| graph.parameter(name, DType::Float32));
    let grad = graph
        .add_named(
            "bn_grad",
            OpKind::BatchNormGrad,
            operands.map(NodeId::value),
            Attrs::new().with("epsilon", 1e-5),
            [DType::Float32; 3],
        )
        .unwrap();
    let cast = graph.add_node(OpKind::Cast, [grad.out(index)], Attrs::new(), [DType::Float16]).unwrap();
    graph.add_output(cast).unwrap();
    BnGradCast { graph, operands, grad, cast }
}

/// `out = Relu(Add(a, b))`, returning `(graph, a, b, add, relu)`.
pub(crate) fn add_relu_graph() -> (Graph, NodeId, NodeId, NodeId, NodeId) {
    let mut graph = Graph::new();
    let a = graph.parameter("a", DType::Float32);
    let b = graph.parameter("b", DType::Float32);
    let add = graph.add_node(OpKind::Add, [a.value(), b.value()], Attrs::new(), [DType::Float32]).unwrap();
    let relu = graph.add_node(OpKind::Relu, [add.value()], Attrs::new(), [DType::Float32]).unwrap();
    graph.add_output(relu).unwrap();
    (graph, a, b, add, relu)
}
