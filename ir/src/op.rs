//! Operator kind tags.

/// Operator kind of a node.
///
/// The set is closed: framework operators produced by lowering, plus the
/// fused operators that fusion passes substitute in. Arity and attribute
/// schemas live in [`OpRegistry`](crate::OpRegistry), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter, strum::AsRefStr, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpKind {
    // Graph inputs
    Parameter,
    Constant,

    // Elementwise
    Cast,
    Add,
    Mul,
    Relu,
    ReluGrad,

    // Quantization
    Quantize,
    Dequantize,

    // Normalization
    BatchNorm,
    BatchNormGrad,

    // Linear algebra and layout
    MatMul,
    BiasAdd,
    Reshape,
    Concat,

    // Fused kernels
    FusedBatchNormGradCast,
    FusedBatchNormRelu,
    FusedAddRelu,
    FusedAddReluGrad,
    Square,
}
