//! Graph builders shared by the scheduler tests.

use graft_dtype::DType;
use graft_ir::{Attrs, Graph, NodeId, OpKind};

/// Handles of the graph built by [`training_step`].
pub struct TrainingStep {
    pub graph: Graph,
    pub params: [NodeId; 6],
    pub outputs: [NodeId; 3],
}

/// A small forward/backward fragment offering one match to every built-in
/// pass.
///
/// ```text
/// norm  = BatchNorm(x, scale, bias, mean, var)
/// act   = Relu(norm#0)                               batch_norm_relu_fusion
/// sq    = Mul(Relu(Add(act, dy)), <same>)            add_relu_fusion, square_fusion
/// half  = Cast[float16](BatchNormGrad(dy, x, scale, mean, var)#0)
///                                                    replace_bn_grad_cast2
/// dgrad = ReluGrad(Add(dy, x), act)                  add_relu_grad_fusion
/// outputs: sq, half, dgrad
/// ```
pub fn training_step() -> TrainingStep {
    let mut graph = Graph::new();
    let params = ["dy", "x", "scale", "bias", "mean", "var"].map(|name| graph.parameter(name, DType::Float32));
    let [dy, x, scale, bias, mean, var] = params.map(NodeId::value);
    let f32_node = |graph: &mut Graph, op, inputs: &[graft_ir::Value]| {
        graph.add_node(op, inputs.iter().copied(), Attrs::new(), [DType::Float32]).unwrap()
    };

    let norm = graph
        .add_named(
            "norm",
            OpKind::BatchNorm,
            [x, scale, bias, mean, var],
            Attrs::new().with("epsilon", 1e-3),
            [DType::Float32; 3],
        )
        .unwrap();
    let act = f32_node(&mut graph, OpKind::Relu, &[norm.out(0)]);
    let residual = f32_node(&mut graph, OpKind::Add, &[act.value(), dy]);
    let activated = f32_node(&mut graph, OpKind::Relu, &[residual.value()]);
    let sq = f32_node(&mut graph, OpKind::Mul, &[activated.value(), activated.value()]);

    let grad = graph
        .add_named(
            "bn_grad",
            OpKind::BatchNormGrad,
            [dy, x, scale, mean, var],
            Attrs::new().with("epsilon", 1e-5),
            [DType::Float32; 3],
        )
        .unwrap();
    let half = graph.add_node(OpKind::Cast, [grad.out(0)], Attrs::new(), [DType::Float16]).unwrap();

    let sum = f32_node(&mut graph, OpKind::Add, &[dy, x]);
    let dgrad = f32_node(&mut graph, OpKind::ReluGrad, &[sum.value(), act.value()]);

    for output in [sq, half, dgrad] {
        graph.add_output(output).unwrap();
    }
    TrainingStep { graph, params, outputs: [sq, half, dgrad] }
}

/// `out = Relu(p)` over one float32 parameter.
pub fn single_relu() -> (Graph, NodeId, NodeId) {
    let mut graph = Graph::new();
    let p = graph.parameter("p", DType::Float32);
    let relu = graph.add_node(OpKind::Relu, [p.value()], Attrs::new(), [DType::Float32]).unwrap();
    graph.add_output(relu).unwrap();
    (graph, p, relu)
}

/// Op kinds of the live nodes, in id order.
pub fn op_kinds(graph: &Graph) -> Vec<OpKind> {
    graph.nodes().map(|(_, node)| node.op()).collect()
}
