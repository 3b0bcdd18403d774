//! Control Package
//!
//! Small helpers that stand in for statements in single-expression
//! formulas, plus `print_message` for debugging output.

use uuid::Uuid;

use crate::api::Registry;
use crate::errors::{InvalidExpression, Result};
use crate::evaluator::Evaluator;
use crate::values::{Args, Builtin, Value};

use super::{expect_int, required};

/// Largest list `range()` will materialise.
const MAX_RANGE_LEN: i64 = 1_000_000;

pub(super) fn register(registry: &mut Registry) {
    registry.define("iff", Builtin::new(iff));
    registry.define("if_null", Builtin::new(if_null));
    registry.define("len", Builtin::new(len));
    registry.define("range", Builtin::new(range));
    registry.define("uuid", Builtin::new(uuid));
    registry.define("random", Builtin::new(random));
    registry.define("print_message", Builtin::with_context(print_message));
}

/// `iff(condition, if_true, if_false)`. Both branches are already
/// evaluated by the time this runs.
fn iff(args: Args) -> Result<Value> {
    let [condition, if_true, if_false] = args.bind("iff", ["condition", "if_true", "if_false"])?;
    let condition = required(condition, "iff", "condition")?;
    Ok(if condition.is_truthy() {
        if_true.unwrap_or(Value::None)
    } else {
        if_false.unwrap_or(Value::None)
    })
}

fn if_null(args: Args) -> Result<Value> {
    let [value, default] = args.bind("if_null", ["value", "default"])?;
    Ok(match value {
        Some(value) if !value.is_none() => value,
        _ => default.unwrap_or(Value::None),
    })
}

fn len(args: Args) -> Result<Value> {
    let [value] = args.bind("len", ["value"])?;
    let value = required(value, "len", "value")?;
    let n = match &value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Set(set) => set.borrow().len(),
        Value::Dict(dict) => dict.borrow().len(),
        other => {
            return Err(InvalidExpression::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(n as i64))
}

/// `range(stop)` or `range(start, stop, step=1)`, as a list.
fn range(args: Args) -> Result<Value> {
    let [first, second, step] = args.bind("range", ["start", "stop", "step"])?;
    let first = expect_int(&required(first, "range", "start")?, "range", "start")?;
    let (start, stop) = match second {
        Some(stop) => (first, expect_int(&stop, "range", "stop")?),
        None => (0, first),
    };
    let step = match step {
        Some(step) => expect_int(&step, "range", "step")?,
        None => 1,
    };
    if step == 0 {
        return Err(InvalidExpression::eval("range() arg 3 must not be zero"));
    }

    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let count = if span <= 0 {
        0
    } else {
        (span + i128::from(step).abs() - 1) / i128::from(step).abs()
    };
    if count > i128::from(MAX_RANGE_LEN) {
        return Err(InvalidExpression::limit(format!(
            "range() length {count} exceeds maximum of {MAX_RANGE_LEN}"
        )));
    }

    let items = (0..count as i64)
        .map(|i| Value::Int(start + i * step))
        .collect();
    Ok(Value::list(items))
}

fn uuid(args: Args) -> Result<Value> {
    args.bind("uuid", [])?;
    Ok(Value::from(Uuid::new_v4().to_string()))
}

/// A float in `[0, 1)`.
fn random(args: Args) -> Result<Value> {
    args.bind("random", [])?;
    Ok(Value::Float(rand::random::<f64>()))
}

/// Append the arguments, joined by spaces, as one line of the `log` entry
/// in the context.
fn print_message(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    if let Some((name, _)) = args.keywords.first() {
        return Err(InvalidExpression::type_error(format!(
            "print_message() got an unexpected keyword argument '{name}'"
        )));
    }
    let line = args
        .positional
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    evaluator.context_mut().append_log(&format!("{line}\n"));
    Ok(Value::None)
}
