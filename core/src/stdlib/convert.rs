//! Conversion Package
//!
//! Python-style coercions between scalars.

use crate::api::Registry;
use crate::errors::{InvalidExpression, Result};
use crate::values::{Args, Builtin, Number, Value};

use super::required;

pub(super) fn register(registry: &mut Registry) {
    registry.define("str", Builtin::new(to_str));
    registry.define("int", Builtin::new(to_int));
    registry.define("float", Builtin::new(to_float));
    registry.define("bool", Builtin::new(to_bool));
    registry.define("round", Builtin::new(round));
    registry.define("trunc", Builtin::new(trunc));
    registry.define("abs", Builtin::new(abs));
}

fn to_str(args: Args) -> Result<Value> {
    let [value] = args.bind("str", ["value"])?;
    Ok(match value {
        None => Value::str(""),
        Some(Value::Str(s)) => Value::Str(s),
        Some(other) => Value::from(other.to_string()),
    })
}

fn to_int(args: Args) -> Result<Value> {
    let [value] = args.bind("int", ["value"])?;
    let Some(value) = value else {
        return Ok(Value::Int(0));
    };
    match &value {
        Value::Float(f) => float_to_int(*f).map(Value::Int),
        Value::Str(s) => {
            let text = s.trim().replace('_', "");
            text.parse::<i64>().map(Value::Int).map_err(|_| {
                InvalidExpression::eval(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            })
        }
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            InvalidExpression::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn float_to_int(f: f64) -> Result<i64> {
    if !f.is_finite() {
        return Err(InvalidExpression::eval(format!(
            "cannot convert float {f} to integer"
        )));
    }
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(InvalidExpression::eval("integer overflow"));
    }
    Ok(truncated as i64)
}

fn to_float(args: Args) -> Result<Value> {
    let [value] = args.bind("float", ["value"])?;
    let Some(value) = value else {
        return Ok(Value::Float(0.0));
    };
    match &value {
        Value::Str(s) => s.trim().replace('_', "").parse::<f64>().map(Value::Float).map_err(|_| {
            InvalidExpression::eval(format!(
                "could not convert string to float: {}",
                value.repr()
            ))
        }),
        other => other
            .as_number()
            .map(|n| Value::Float(n.as_f64()))
            .ok_or_else(|| {
                InvalidExpression::type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))
            }),
    }
}

fn to_bool(args: Args) -> Result<Value> {
    let [value] = args.bind("bool", ["value"])?;
    Ok(Value::Bool(value.is_some_and(|v| v.is_truthy())))
}

/// Banker's rounding, as Python does. Without `ndigits` the result is an int.
fn round(args: Args) -> Result<Value> {
    let [number, ndigits] = args.bind("round", ["number", "ndigits"])?;
    let number = required(number, "round", "number")?;
    let ndigits = match ndigits {
        None | Some(Value::None) => None,
        Some(v) => Some(v.as_int().ok_or_else(|| {
            InvalidExpression::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                v.type_name()
            ))
        })?),
    };
    match (number.as_number(), ndigits) {
        (Some(Number::Int(i)), None) => Ok(Value::Int(i)),
        (Some(Number::Int(i)), Some(n)) if n >= 0 => Ok(Value::Int(i)),
        (Some(Number::Int(i)), Some(n)) => {
            let scale = 10f64.powi(n.saturating_neg().min(308) as i32);
            float_to_int((i as f64 / scale).round_ties_even() * scale).map(Value::Int)
        }
        (Some(n), None) => float_to_int(n.as_f64().round_ties_even()).map(Value::Int),
        (Some(n), Some(digits)) => {
            let x = n.as_f64();
            let digits = digits.clamp(-308, 308) as i32;
            let scale = 10f64.powi(digits);
            let rounded = (x * scale).round_ties_even() / scale;
            Ok(Value::Float(if rounded.is_finite() { rounded } else { x }))
        }
        (None, _) => Err(InvalidExpression::type_error(format!(
            "type {} doesn't define __round__ method",
            number.type_name()
        ))),
    }
}

fn trunc(args: Args) -> Result<Value> {
    let [number] = args.bind("trunc", ["number"])?;
    match required(number, "trunc", "number")? {
        Value::Float(f) => float_to_int(f).map(Value::Int),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            InvalidExpression::type_error(format!(
                "type {} doesn't define __trunc__ method",
                other.type_name()
            ))
        }),
    }
}

fn abs(args: Args) -> Result<Value> {
    let [number] = args.bind("abs", ["number"])?;
    match required(number, "abs", "number")? {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Duration(d) => Ok(Value::Duration(d.abs())),
        other => match other.as_int() {
            Some(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| InvalidExpression::eval("integer overflow")),
            None => Err(InvalidExpression::type_error(format!(
                "bad operand type for abs(): '{}'",
                other.type_name()
            ))),
        },
    }
}
