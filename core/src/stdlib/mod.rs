//! Formula Standard Library
//!
//! The built-in functions every engine starts with, grouped by package:
//! - Conversion: `str int float bool round trunc abs`
//! - Strings: case, search, split/join and regular expressions
//! - Dates: calendar arithmetic, business days, formatting and parsing
//! - Numbers: locale-style formatting and parsing
//! - Control: `iff if_null len range uuid random print_message`
//! - Grouping: `simple_group date_group`
//! - Introspection: `has_var get_var globals locals`
//!
//! Host applications add their own domain functions on top through
//! [`EngineBuilder::register_function`](crate::api::EngineBuilder::register_function).

use chrono::{NaiveDate, NaiveDateTime};

use crate::api::Registry;
use crate::errors::{InvalidExpression, Result};
use crate::values::Value;

mod control;
mod convert;
mod datetime;
mod group;
mod introspect;
mod number;
mod string;


pub use datetime::{format_date, parse_date};

/// Register every standard library function.
pub fn register_stdlib(registry: &mut Registry) {
    convert::register(registry);
    string::register(registry);
    datetime::register(registry);
    number::register(registry);
    control::register(registry);
    group::register(registry);
    introspect::register(registry);
}

// ============================================================================
// Argument helpers
// ============================================================================

fn required(value: Option<Value>, function: &str, param: &str) -> Result<Value> {
    value.ok_or_else(|| {
        InvalidExpression::type_error(format!(
            "{function}() missing required argument: '{param}'"
        ))
    })
}

fn wrong_type(function: &str, param: &str, expected: &str, got: &Value) -> InvalidExpression {
    InvalidExpression::type_error(format!(
        "{function}() argument '{param}' must be {expected}, not {}",
        got.type_name()
    ))
}

fn expect_str(value: &Value, function: &str, param: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(function, param, "str", value))
}

/// An optional string argument; `None` and a missing argument both fall
/// back to `default`.
fn str_or(value: Option<Value>, default: &str, function: &str, param: &str) -> Result<String> {
    match value {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(v) => expect_str(&v, function, param),
    }
}

fn expect_int(value: &Value, function: &str, param: &str) -> Result<i64> {
    match value {
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
        other => other
            .as_int()
            .ok_or_else(|| wrong_type(function, param, "int", other)),
    }
}

fn expect_f64(value: &Value, function: &str, param: &str) -> Result<f64> {
    value
        .as_number()
        .map(|n| n.as_f64())
        .ok_or_else(|| wrong_type(function, param, "a number", value))
}

/// Dates, date-times (truncated) and ISO `YYYY-MM-DD` strings.
fn expect_date(value: &Value, function: &str, param: &str) -> Result<NaiveDate> {
    match value {
        Value::Str(s) => parse_date(s, datetime::DEFAULT_FORMAT),
        other => other
            .as_date()
            .ok_or_else(|| wrong_type(function, param, "a date", other)),
    }
}

fn expect_datetime(value: &Value, function: &str, param: &str) -> Result<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        other => Ok(expect_date(other, function, param)?.and_time(chrono::NaiveTime::MIN)),
    }
}

fn is_missing(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::None))
}
