use test_case::test_case;

use crate::op::OpKind;
use crate::registry::{Arity, AttrSchema, OpRegistry, OpSchema, SchemaViolation};
use crate::types::{AttrKind, Attrs};

#[test]
fn test_standard_registers_every_kind() {
    use strum::IntoEnumIterator;

    let registry = OpRegistry::standard();
    for kind in OpKind::iter() {
        assert!(registry.contains(kind), "{kind} missing");
    }
    assert_eq!(registry.len(), OpKind::iter().count());
}

#[test_case(OpKind::Add, 2, 1 => true; "binary")]
#[test_case(OpKind::Add, 3, 1 => false; "binary with extra input")]
#[test_case(OpKind::Relu, 1, 2 => false; "unary with extra output")]
#[test_case(OpKind::Concat, 5, 1 => false; "concat without axis")]
#[test_case(OpKind::Parameter, 0, 1 => true; "parameter")]
fn test_check_shape(kind: OpKind, inputs: usize, outputs: usize) -> bool {
    OpRegistry::standard().check(kind, inputs, outputs, &Attrs::new()).is_ok()
}

#[test]
fn test_check_reports_violation() {
    let registry = OpRegistry::standard();
    assert_eq!(
        registry.check(OpKind::BatchNorm, 5, 1, &Attrs::new().with("epsilon", 1e-3)),
        Err(SchemaViolation::OutputArity { kind: OpKind::BatchNorm, expected: 3, actual: 1 })
    );
    assert_eq!(
        registry.check(OpKind::Reshape, 1, 1, &Attrs::new().with("shape", 4i64)),
        Err(SchemaViolation::AttrKind {
            kind: OpKind::Reshape,
            name: "shape".into(),
            expected: AttrKind::Ints,
            actual: AttrKind::Int
        })
    );
    assert_eq!(
        registry.check(OpKind::Relu, 1, 1, &Attrs::new().with("alpha", 0.1)),
        Err(SchemaViolation::UnknownAttr { kind: OpKind::Relu, name: "alpha".into() })
    );
    assert!(registry.check(OpKind::Concat, 3, 1, &Attrs::new().with("axis", 1i64)).is_ok());
}

#[test]
fn test_empty_registry_rejects_everything() {
    let registry = OpRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(
        registry.check(OpKind::Add, 2, 1, &Attrs::new()),
        Err(SchemaViolation::Unregistered { kind: OpKind::Add })
    );
}

#[test]
fn test_register_replaces_schema() {
    let mut registry = OpRegistry::standard();
    let relaxed = OpSchema::builder()
        .kind(OpKind::Add)
        .inputs(Arity::Variadic { min: 2 })
        .attrs(vec![AttrSchema::optional("alpha", AttrKind::Float)])
        .build();

    let previous = registry.register(relaxed).unwrap();
    assert_eq!(previous.inputs, Arity::Fixed(2));
    assert!(registry.check(OpKind::Add, 4, 1, &Attrs::new()).is_ok());
    assert_eq!(registry.schema(OpKind::Add).unwrap().outputs, 1);
}
