mod cases;

use formula::{
    Args, Builtin, Context, Engine, Evaluator, InvalidExpression, RegistryError, Value,
    render_error_to_string_no_color,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn validate_does_not_execute() {
    assert!(formula::validate("1/0"));
    assert!(formula::is_valid("1/0"));
    assert!(formula::evaluate("1/0", &[]).is_err());

    assert!(!formula::validate("def f(:"));
    assert!(!formula::is_valid("x = = 1"));
    // Unknown names are a runtime concern.
    assert!(formula::validate("undefined_function(undefined_name)"));
}

#[test]
fn validate_rejects_runaway_operator_chains() {
    let chain = format!("1{}", "+1".repeat(200_000));
    assert!(!formula::validate(&chain));
    let err = formula::evaluate(&chain, &[]).unwrap_err();
    assert_eq!(err.type_name(), "ExpressionSyntaxError");

    let lookups = format!("record{}", ".field".repeat(200_000));
    assert!(!formula::is_valid(&lookups));

    // Flat `or` chains do not nest.
    let alternatives = format!("0{}", " or 0".repeat(10_000));
    assert!(formula::validate(&alternatives));
}

#[test]
fn evaluate_with_log_collects_messages() {
    let source = indoc! {"
        total = 0
        for x in [1, 2, 3]:
            total = total + x
            print_message('running total', total)
        total
    "};
    let (value, log) = formula::evaluate_with_log(source, &[]).unwrap();
    assert_eq!(value, Value::Int(6));
    assert_eq!(log, "running total 1\nrunning total 3\nrunning total 6\n");
}

#[test]
fn evaluate_with_log_appends_to_existing_log() {
    let engine = Engine::default();
    let context = Context::from_iter([("log", "earlier\n")]);
    let (_, log) = engine
        .evaluate_with_log("print_message('later')", &[], context)
        .unwrap();
    assert_eq!(log, "earlier\nlater\n");
}

#[test]
fn print_message_without_log_is_silent() {
    assert_eq!(
        formula::evaluate("print_message('ignored')\n1", &[]).unwrap(),
        Value::Int(1)
    );
}

fn fx_rate(args: Args) -> Result<Value, InvalidExpression> {
    let [base, quote] = args.bind("fx_rate", ["base", "quote"])?;
    let pair = format!(
        "{}{}",
        base.unwrap_or(Value::None),
        quote.unwrap_or_else(|| Value::str("USD"))
    );
    Ok(Value::Float(match pair.as_str() {
        "EURUSD" => 1.1,
        "GBPUSD" => 1.25,
        _ => 1.0,
    }))
}

fn engine_with_fx() -> Engine {
    Engine::builder()
        .register_function("fx_rate", Builtin::new(fx_rate))
        .unwrap()
        .register_function(
            "whoami",
            Builtin::with_context(|evaluator: &mut Evaluator, _args: Args| {
                Ok(evaluator.context().get("member").cloned().unwrap_or(Value::None))
            }),
        )
        .unwrap()
        .build()
}

#[test]
fn host_functions_are_callable() {
    let engine = engine_with_fx();
    assert_eq!(
        engine
            .evaluate("amount * fx_rate('EUR')", &[("amount", Value::Int(100))])
            .unwrap(),
        Value::Float(110.00000000000001)
    );
    assert_eq!(
        engine.evaluate("fx_rate(base='GBP', quote='USD')", &[]).unwrap(),
        Value::Float(1.25)
    );
    let err = engine.evaluate("fx_rate('EUR', 'USD', 'x')", &[]).unwrap_err();
    assert_eq!(err.type_name(), "ExpressionEvalError");
}

#[test]
fn host_functions_can_read_the_context() {
    let engine = engine_with_fx();
    let context = Context::from_iter([("member", "ops")]);
    let value = engine
        .evaluate_with_options("whoami()", &[], context, &engine.options().execution)
        .unwrap();
    assert_eq!(value, Value::str("ops"));
}

#[test]
fn registration_rejects_bad_names() {
    let noop = || Builtin::new(|_| Ok(Value::None));
    assert_eq!(
        Engine::builder().register_function("len", noop()).err(),
        Some(RegistryError::AlreadyRegistered("len".to_string()))
    );
    assert_eq!(
        Engine::builder().register_function("2fast", noop()).err(),
        Some(RegistryError::InvalidName("2fast".to_string()))
    );
    assert_eq!(
        Engine::builder().register_function("while", noop()).err(),
        Some(RegistryError::InvalidName("while".to_string()))
    );
    assert!(
        Engine::builder()
            .register_function("custom", noop())
            .unwrap()
            .register_function("custom", noop())
            .is_err()
    );
}

#[test]
fn engines_do_not_share_registrations() {
    let _ = engine_with_fx();
    let err = Engine::default().evaluate("fx_rate('EUR')", &[]).unwrap_err();
    assert_eq!(err.type_name(), "FunctionNotDefined");
}

#[test]
fn errors_render_with_source_context() {
    let source = indoc! {"
        rate = 0
        amount / rate
    "};
    let err = formula::evaluate(source, &[("amount", Value::Int(5))]).unwrap_err();
    let rendered = render_error_to_string_no_color(&err, source);
    assert!(rendered.contains("[ExpressionEvalError]"), "{rendered}");
    assert!(rendered.contains("amount / rate"), "{rendered}");
    assert!(rendered.contains("division by zero"), "{rendered}");
}

#[test]
fn syntax_errors_render_with_source_context() {
    let source = "total = (1 +";
    let err = formula::evaluate(source, &[]).unwrap_err();
    assert!(err.is_syntax());
    let rendered = render_error_to_string_no_color(&err, source);
    assert!(rendered.contains("[ExpressionSyntaxError]"), "{rendered}");
    assert!(rendered.contains("total = (1 +"), "{rendered}");
}

#[test]
fn evaluator_can_be_reused_across_scripts() {
    let engine = Engine::default();
    let mut evaluator = engine.evaluator(&[("qty", Value::Int(3))], Context::new());
    let define = engine.parse("def double(v):\n    return v * 2").unwrap();
    let call = engine.parse("double(qty)").unwrap();
    evaluator.run(&define).unwrap();
    assert_eq!(evaluator.run(&call).unwrap(), Value::Int(6));
    assert_eq!(evaluator.name("qty"), Some(&Value::Int(3)));
}
