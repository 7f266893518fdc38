//! Operator registry: arity and attribute schemas per operator kind.
//!
//! The registry is an explicit object built once at startup and passed by
//! reference to the matcher, the rewrite executor and graph validation.
//! There is no process-wide table.

use std::collections::HashMap;
use std::fmt;

use bon::Builder;

use crate::op::OpKind;
use crate::types::{AttrKind, Attrs};

/// Number of inputs an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic { min: usize },
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Self::Fixed(n) => count == *n,
            Self::Variadic { min } => count >= *min,
        }
    }
}

impl Default for Arity {
    fn default() -> Self {
        Self::Fixed(0)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Variadic { min } => write!(f, "at least {min}"),
        }
    }
}

/// Declared attribute of an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSchema {
    pub name: &'static str,
    pub kind: AttrKind,
    pub required: bool,
}

impl AttrSchema {
    pub const fn required(name: &'static str, kind: AttrKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: AttrKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Schema of one operator kind.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct OpSchema {
    pub kind: OpKind,
    #[builder(default)]
    pub inputs: Arity,
    #[builder(default = 1)]
    pub outputs: usize,
    #[builder(default)]
    pub attrs: Vec<AttrSchema>,
}

impl OpSchema {
    pub fn attr(&self, name: &str) -> Option<&AttrSchema> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

/// Reason a node (or staged node) does not satisfy its operator schema.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SchemaViolation {
    #[display("{kind} is not registered")]
    Unregistered { kind: OpKind },
    #[display("{kind} takes {expected} inputs, got {actual}")]
    InputArity { kind: OpKind, expected: Arity, actual: usize },
    #[display("{kind} produces {expected} outputs, got {actual} dtypes")]
    OutputArity { kind: OpKind, expected: usize, actual: usize },
    #[display("{kind} requires attribute '{name}'")]
    MissingAttr { kind: OpKind, name: &'static str },
    #[display("{kind} attribute '{name}' must be {expected}, got {actual}")]
    AttrKind { kind: OpKind, name: String, expected: AttrKind, actual: AttrKind },
    #[display("{kind} has no attribute '{name}'")]
    UnknownAttr { kind: OpKind, name: String },
}

/// Maps operator kinds to their schemas.
#[derive(Debug, Clone, Default)]
pub struct OpRegistry {
    schemas: HashMap<OpKind, OpSchema>,
}

impl OpRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operator kind.
    pub fn standard() -> Self {
        use AttrKind::*;
        use OpKind::*;

        let fixed = |kind, inputs, outputs, attrs: Vec<AttrSchema>| {
            OpSchema::builder().kind(kind).inputs(Arity::Fixed(inputs)).outputs(outputs).attrs(attrs).build()
        };
        let bn_attrs = || {
            vec![
                AttrSchema::required("epsilon", Float),
                AttrSchema::optional("momentum", Float),
                AttrSchema::optional("is_training", Bool),
            ]
        };

        let quant_attrs = || vec![AttrSchema::required("scale", Float), AttrSchema::required("zero_point", Int)];

        let mut registry = Self::new();
        for schema in [
            fixed(Parameter, 0, 1, vec![]),
            fixed(Constant, 0, 1, vec![AttrSchema::optional("value", Float)]),
            fixed(Cast, 1, 1, vec![]),
            fixed(Add, 2, 1, vec![]),
            fixed(Mul, 2, 1, vec![]),
            fixed(Relu, 1, 1, vec![]),
            fixed(ReluGrad, 2, 1, vec![]),
            fixed(Quantize, 1, 1, quant_attrs()),
            fixed(Dequantize, 1, 1, quant_attrs()),
            // y, batch_mean, batch_variance
            fixed(BatchNorm, 5, 3, bn_attrs()),
            // dx, dscale, dbias
            fixed(BatchNormGrad, 5, 3, bn_attrs()),
            fixed(
                MatMul,
                2,
                1,
                vec![AttrSchema::optional("transpose_a", Bool), AttrSchema::optional("transpose_b", Bool)],
            ),
            fixed(BiasAdd, 2, 1, vec![]),
            fixed(Reshape, 1, 1, vec![AttrSchema::required("shape", Ints)]),
            OpSchema::builder()
                .kind(Concat)
                .inputs(Arity::Variadic { min: 1 })
                .attrs(vec![AttrSchema::required("axis", Int)])
                .build(),
            fixed(
                FusedBatchNormGradCast,
                5,
                1,
                vec![AttrSchema::required("epsilon", Float), AttrSchema::required("output_index", Int)],
            ),
            fixed(FusedBatchNormRelu, 5, 1, vec![AttrSchema::required("epsilon", Float)]),
            fixed(FusedAddRelu, 2, 1, vec![]),
            fixed(FusedAddReluGrad, 3, 1, vec![]),
            fixed(Square, 1, 1, vec![]),
        ] {
            registry.register(schema);
        }
        registry
    }

    /// Register (or replace) a schema. Returns the replaced schema.
    pub fn register(&mut self, schema: OpSchema) -> Option<OpSchema> {
        self.schemas.insert(schema.kind, schema)
    }

    pub fn schema(&self, kind: OpKind) -> Option<&OpSchema> {
        self.schemas.get(&kind)
    }

    pub fn contains(&self, kind: OpKind) -> bool {
        self.schemas.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Check an operator instance against its schema.
    ///
    /// `inputs` and `outputs` are the instance's input count and number of
    /// output dtypes.
    pub fn check(&self, kind: OpKind, inputs: usize, outputs: usize, attrs: &Attrs) -> Result<(), SchemaViolation> {
        let schema = self.schema(kind).ok_or(SchemaViolation::Unregistered { kind })?;

        if !schema.inputs.accepts(inputs) {
            return Err(SchemaViolation::InputArity { kind, expected: schema.inputs, actual: inputs });
        }
        if schema.outputs != outputs {
            return Err(SchemaViolation::OutputArity { kind, expected: schema.outputs, actual: outputs });
        }

        for (name, value) in attrs.iter() {
            let Some(declared) = schema.attr(name) else {
                return Err(SchemaViolation::UnknownAttr { kind, name: name.to_string() });
            };
            if declared.kind != value.kind() {
                return Err(SchemaViolation::AttrKind {
                    kind,
                    name: name.to_string(),
                    expected: declared.kind,
                    actual: value.kind(),
                });
            }
        }
        if let Some(missing) = schema.attrs.iter().find(|a| a.required && !attrs.contains(a.name)) {
            return Err(SchemaViolation::MissingAttr { kind, name: missing.name });
        }

        Ok(())
    }

    /// Check a graph node against its schema.
    pub fn check_node(&self, node: &crate::Node) -> Result<(), SchemaViolation> {
        self.check(node.op(), node.inputs().len(), node.num_outputs(), node.attrs())
    }
}
