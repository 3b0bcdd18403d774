//! The operator table.
//!
//! Arithmetic follows Python semantics over the dynamic value model. Four
//! operators are guarded by [`Limits`]: `**` bounds both operands, `*`
//! rejects strings outright, string `+` bounds the result length and `<<`
//! bounds the shift amount. Integer arithmetic is checked; overflow is an
//! evaluation error instead of wrapping, except for `**`, whose integer
//! overflow counts against the limits.

use chrono::TimeDelta;

use crate::api::Limits;
use crate::errors::{InvalidExpression, Result};
use crate::parser::{BinaryOp, ComparisonOp, UnaryOp};
use crate::values::{Number, Value};

pub fn binary(op: BinaryOp, left: &Value, right: &Value, limits: &Limits) -> Result<Value> {
    match op {
        BinaryOp::Add => add(left, right, limits),
        BinaryOp::Sub => sub(left, right),
        BinaryOp::Mul => mul(left, right),
        BinaryOp::Pow => power(left, right, limits),
        BinaryOp::LShift => shift_left(left, right, limits),
        BinaryOp::RShift => shift_right(left, right),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => bitwise(op, left, right),
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => match numbers(left, right) {
            Some((a, b)) => arith(op, a, b),
            None => Err(unsupported(op, left, right)),
        },
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Duration(d)) => Ok(Value::Duration(-*d)),
        (UnaryOp::Neg, Value::Delta(d)) => Ok(Value::Delta(d.negate())),
        (UnaryOp::Neg, v) => match v.as_int() {
            Some(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            None => Err(bad_operand('-', v)),
        },
        (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Pos, Value::Duration(_) | Value::Delta(_)) => Ok(operand.clone()),
        (UnaryOp::Pos, v) => v.as_int().map(Value::Int).ok_or_else(|| bad_operand('+', v)),
        (UnaryOp::Invert, v) => v.as_int().map(|i| Value::Int(!i)).ok_or_else(|| bad_operand('~', v)),
    }
}

pub fn compare(op: ComparisonOp, left: &Value, right: &Value) -> Result<bool> {
    Ok(match op {
        ComparisonOp::Eq => left.try_eq(right)?,
        ComparisonOp::Neq => !left.try_eq(right)?,
        ComparisonOp::Is => left.is_same(right),
        ComparisonOp::IsNot => !left.is_same(right),
        ComparisonOp::In => contains(right, left)?,
        ComparisonOp::NotIn => !contains(right, left)?,
        ComparisonOp::Lt | ComparisonOp::Le | ComparisonOp::Gt | ComparisonOp::Ge => {
            let ordering = left.try_cmp(right).map_err(|err| {
                if err.is_limit() {
                    return err;
                }
                InvalidExpression::type_error(format!(
                    "'{op}' not supported between instances of '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            // NaN compares false against everything.
            let Some(ordering) = ordering else {
                return Ok(false);
            };
            match op {
                ComparisonOp::Lt => ordering.is_lt(),
                ComparisonOp::Le => ordering.is_le(),
                ComparisonOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }
        }
    })
}

/// Python `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(&**needle)),
            other => Err(InvalidExpression::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => any_equal(&items.borrow(), item),
        Value::Tuple(items) => any_equal(items, item),
        Value::Dict(dict) => dict.borrow().contains_key(item),
        Value::Set(set) => set.borrow().contains(item),
        other => Err(InvalidExpression::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn any_equal(items: &[Value], item: &Value) -> Result<bool> {
    for candidate in items {
        if candidate.try_eq(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn numbers(left: &Value, right: &Value) -> Option<(Number, Number)> {
    Some((left.as_number()?, right.as_number()?))
}

fn add(left: &Value, right: &Value, limits: &Limits) -> Result<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => {
            let len = a.chars().count() + b.chars().count();
            if len > limits.max_str_len {
                return Err(InvalidExpression::limit(format!(
                    "String length {len} exceeds maximum of {} characters",
                    limits.max_str_len
                )));
            }
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::from(joined))
        }
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().to_vec();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::Date(d), Value::Duration(td)) | (Value::Duration(td), Value::Date(d)) => {
            shift_date(*d, floor_days(*td))
        }
        (Value::DateTime(dt), Value::Duration(td)) | (Value::Duration(td), Value::DateTime(dt)) => dt
            .checked_add_signed(*td)
            .map(Value::DateTime)
            .ok_or_else(out_of_range),
        (Value::Date(d), Value::Delta(delta)) | (Value::Delta(delta), Value::Date(d)) => {
            delta.apply(*d).map(Value::Date).ok_or_else(out_of_range)
        }
        (Value::DateTime(dt), Value::Delta(delta)) | (Value::Delta(delta), Value::DateTime(dt)) => {
            delta.apply_datetime(*dt).map(Value::DateTime).ok_or_else(out_of_range)
        }
        (Value::Duration(a), Value::Duration(b)) => {
            a.checked_add(b).map(Value::Duration).ok_or_else(overflow)
        }
        (Value::Delta(a), Value::Delta(b)) => Ok(Value::Delta(a.add(b))),
        _ => match numbers(left, right) {
            Some((a, b)) => arith(BinaryOp::Add, a, b),
            None => Err(unsupported(BinaryOp::Add, left, right)),
        },
    }
}

fn sub(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Date(a), Value::Date(b)) => Ok(Value::Duration(a.signed_duration_since(*b))),
        (Value::DateTime(a), Value::DateTime(b)) => {
            Ok(Value::Duration(a.signed_duration_since(*b)))
        }
        (Value::Date(d), Value::Duration(td)) => shift_date(*d, -floor_days(*td)),
        (Value::DateTime(dt), Value::Duration(td)) => dt
            .checked_sub_signed(*td)
            .map(Value::DateTime)
            .ok_or_else(out_of_range),
        (Value::Date(d), Value::Delta(delta)) => {
            delta.negate().apply(*d).map(Value::Date).ok_or_else(out_of_range)
        }
        (Value::DateTime(dt), Value::Delta(delta)) => delta
            .negate()
            .apply_datetime(*dt)
            .map(Value::DateTime)
            .ok_or_else(out_of_range),
        (Value::Duration(a), Value::Duration(b)) => {
            a.checked_sub(b).map(Value::Duration).ok_or_else(overflow)
        }
        (Value::Delta(a), Value::Delta(b)) => Ok(Value::Delta(a.add(&b.negate()))),
        (Value::Set(a), Value::Set(b)) => Ok(Value::set(a.borrow().difference(&b.borrow()))),
        _ => match numbers(left, right) {
            Some((a, b)) => arith(BinaryOp::Sub, a, b),
            None => Err(unsupported(BinaryOp::Sub, left, right)),
        },
    }
}

fn mul(left: &Value, right: &Value) -> Result<Value> {
    // No string repetition, in either operand order.
    if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
        return Err(unsupported(BinaryOp::Mul, left, right));
    }
    match (left, right) {
        (Value::Duration(d), Value::Int(n)) | (Value::Int(n), Value::Duration(d)) => {
            let factor = i32::try_from(*n).map_err(|_| overflow())?;
            d.checked_mul(factor).map(Value::Duration).ok_or_else(overflow)
        }
        (Value::Delta(d), Value::Int(n)) | (Value::Int(n), Value::Delta(d)) => {
            d.scale(*n).map(Value::Delta).ok_or_else(overflow)
        }
        _ => match numbers(left, right) {
            Some((a, b)) => arith(BinaryOp::Mul, a, b),
            None => Err(unsupported(BinaryOp::Mul, left, right)),
        },
    }
}

fn arith(op: BinaryOp, a: Number, b: Number) -> Result<Value> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_arith(op, x, y),
        _ => float_arith(op, a.as_f64(), b.as_f64()),
    }
}

fn int_arith(op: BinaryOp, x: i64, y: i64) -> Result<Value> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::Div => {
            if y == 0 {
                return Err(InvalidExpression::eval("division by zero"));
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(InvalidExpression::eval("integer division or modulo by zero"));
            }
            x.checked_div(y).map(|q| {
                if x % y != 0 && ((x < 0) != (y < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(InvalidExpression::eval("integer division or modulo by zero"));
            }
            let r = x.wrapping_rem(y);
            Some(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
        _ => None,
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_arith(op: BinaryOp, x: f64, y: f64) -> Result<Value> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0.0 => {
            return Err(InvalidExpression::eval("float division by zero"));
        }
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => {
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        _ => return Err(InvalidExpression::eval(format!("unsupported float operator {op}"))),
    };
    Ok(Value::Float(result))
}

fn power(left: &Value, right: &Value, limits: &Limits) -> Result<Value> {
    let Some((base, exp)) = numbers(left, right) else {
        return Err(unsupported(BinaryOp::Pow, left, right));
    };
    let max = limits.max_exponent as f64;
    if base.as_f64().abs() > max || exp.as_f64().abs() > max {
        return Err(InvalidExpression::limit(format!(
            "Power operands exceed maximum of {}: {left} ** {right}",
            limits.max_exponent
        )));
    }
    match (base, exp) {
        (Number::Int(x), Number::Int(y)) if y >= 0 => x
            .checked_pow(y as u32)
            .map(Value::Int)
            .ok_or_else(|| {
                InvalidExpression::limit(format!(
                    "Power result exceeds integer range: {left} ** {right}"
                ))
            }),
        _ => {
            let (x, y) = (base.as_f64(), exp.as_f64());
            if x == 0.0 && y < 0.0 {
                return Err(InvalidExpression::eval(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            let result = x.powf(y);
            if result.is_nan() {
                return Err(InvalidExpression::eval("math domain error"));
            }
            if result.is_infinite() {
                return Err(InvalidExpression::eval("Numerical result out of range"));
            }
            Ok(Value::Float(result))
        }
    }
}

fn shift_left(left: &Value, right: &Value, limits: &Limits) -> Result<Value> {
    let (Some(x), Some(y)) = (left.as_int(), right.as_int()) else {
        return Err(unsupported(BinaryOp::LShift, left, right));
    };
    if y > limits.max_shift {
        return Err(InvalidExpression::limit(format!(
            "Shift {y} exceeds maximum of {}",
            limits.max_shift
        )));
    }
    if y < 0 {
        return Err(InvalidExpression::eval("negative shift count"));
    }
    x.checked_mul(1i64 << y).map(Value::Int).ok_or_else(overflow)
}

fn shift_right(left: &Value, right: &Value) -> Result<Value> {
    let (Some(x), Some(y)) = (left.as_int(), right.as_int()) else {
        return Err(unsupported(BinaryOp::RShift, left, right));
    };
    if y < 0 {
        return Err(InvalidExpression::eval("negative shift count"));
    }
    Ok(Value::Int(if y >= 64 { x >> 63 } else { x >> y }))
}

fn bitwise(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitOr => a | b,
            _ => a ^ b,
        })),
        (Value::Set(a), Value::Set(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            Ok(Value::set(match op {
                BinaryOp::BitAnd => a.intersection(&b),
                BinaryOp::BitOr => a.union(&b),
                _ => a.symmetric_difference(&b),
            }))
        }
        _ => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) => Ok(Value::Int(match op {
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                _ => a ^ b,
            })),
            _ => Err(unsupported(op, left, right)),
        },
    }
}

/// Python's `timedelta.days`, which floors toward negative infinity.
pub(crate) fn floor_days(td: TimeDelta) -> i64 {
    td.num_seconds().div_euclid(86_400)
}

fn shift_date(date: chrono::NaiveDate, days: i64) -> Result<Value> {
    TimeDelta::try_days(days)
        .and_then(|td| date.checked_add_signed(td))
        .map(Value::Date)
        .ok_or_else(out_of_range)
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> InvalidExpression {
    InvalidExpression::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn bad_operand(op: char, value: &Value) -> InvalidExpression {
    InvalidExpression::type_error(format!(
        "bad operand type for unary {op}: '{}'",
        value.type_name()
    ))
}

fn overflow() -> InvalidExpression {
    InvalidExpression::eval("integer overflow")
}

fn out_of_range() -> InvalidExpression {
    InvalidExpression::eval("date value out of range")
}
