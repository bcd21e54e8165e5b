use dataforge::{
    data::Value,
    transform::{BuiltinTransform, TransformRegistry},
};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        any::<f64>().prop_map(Value::Float),
        ".{0,24}".prop_map(Value::String),
        "[0-9 .,-]{0,12}".prop_map(Value::String),
        "[0-9]{4}-[0-9]{2}-[0-9]{2}".prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn every_builtin_is_total(value in arb_value()) {
        let registry = TransformRegistry::standard();
        for builtin in BuiltinTransform::ALL {
            let _ = builtin.apply(value.clone());
            prop_assert!(registry.apply(builtin.name(), value.clone()).is_some());
        }
        prop_assert!(registry.apply("phone", value).is_some());
    }

    #[test]
    fn strip_is_idempotent(text in ".{0,32}") {
        let once = BuiltinTransform::Strip.apply(Value::String(text));
        let twice = BuiltinTransform::Strip.apply(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn int_keeps_integers(n in any::<i64>()) {
        prop_assert_eq!(BuiltinTransform::Int.apply(Value::Integer(n)), Value::Integer(n));
        prop_assert_eq!(
            BuiltinTransform::Int.apply(Value::String(n.to_string())),
            Value::Integer(n)
        );
    }
}

#[test]
fn unknown_names_are_not_applied() {
    let registry = TransformRegistry::standard();
    assert!(registry.apply("rot13", Value::from("x")).is_none());
}
