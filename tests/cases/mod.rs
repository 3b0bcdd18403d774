//! Shared harness for the integration tests.
//!
//! Every test file starts with `mod cases;` and declares its cases with
//! [`test_case!`]. A case evaluates `input` with the default engine, binding
//! the optional `names`, and checks either the resulting `value` or the
//! `error` kind and message fragment.
#![allow(dead_code)]

use formula::{ErrorKind, InvalidExpression, Value};

#[macro_export]
macro_rules! test_case {
    (
        $name:ident,
        input: $input:expr,
        $(names: [$(($var:literal, $val:expr)),* $(,)?],)?
        value: $value:expr $(,)?
    ) => {
        #[test]
        fn $name() {
            let names: Vec<(&str, formula::Value)> =
                vec![$($(($var, formula::Value::from($val))),*)?];
            let result = $crate::cases::run($input, &names);
            pretty_assertions::assert_eq!(result, formula::Value::from($value));
        }
    };
    (
        $name:ident,
        input: $input:expr,
        $(names: [$(($var:literal, $val:expr)),* $(,)?],)?
        error: $kind:ident($message:expr) $(,)?
    ) => {
        #[test]
        fn $name() {
            let names: Vec<(&str, formula::Value)> =
                vec![$($(($var, formula::Value::from($val))),*)?];
            let err = $crate::cases::run_err($input, &names);
            assert!(
                matches!(err.kind(), formula::ErrorKind::$kind(_)),
                "expected {}, got {:?}",
                stringify!($kind),
                err,
            );
            $crate::cases::assert_message(&err, $message);
        }
    };
}

/// Evaluate and panic with the rendered diagnostic on failure.
pub fn run(source: &str, names: &[(&str, Value)]) -> Value {
    formula::evaluate(source, names).unwrap_or_else(|err| {
        panic!(
            "evaluation should succeed for:\n{source}\n{}",
            formula::render_error_to_string_no_color(&err, source)
        )
    })
}

pub fn run_err(source: &str, names: &[(&str, Value)]) -> InvalidExpression {
    match formula::evaluate(source, names) {
        Ok(value) => panic!("evaluation should fail for:\n{source}\ngot: {value:?}"),
        Err(err) => err,
    }
}

pub fn assert_message(err: &InvalidExpression, fragment: &str) {
    assert!(
        err.message().contains(fragment),
        "message {:?} does not contain {:?}",
        err.message(),
        fragment,
    );
}

pub fn is_limit(kind: &ErrorKind) -> bool {
    matches!(kind, ErrorKind::LimitExceeded(_))
}

pub fn ints(xs: &[i64]) -> Value {
    Value::list(xs.iter().copied().map(Value::Int).collect())
}

pub fn strs(xs: &[&str]) -> Value {
    Value::list(xs.iter().map(Value::str).collect())
}
