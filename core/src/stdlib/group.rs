//! Grouping Package
//!
//! Bucket a number or a date into a labelled range. Ranges are tried in
//! the order given and the first match wins; they need not be sorted or
//! disjoint.

use chrono::{NaiveDate, TimeDelta};

use crate::api::Registry;
use crate::errors::{InvalidExpression, Result};
use crate::evaluator::Evaluator;
use crate::values::{Args, Builtin, Value};

use super::{datetime, expect_date, required};

/// Context flag that makes `date_group` return `(label, begin, end)`.
pub const WITH_DATES_KEY: &str = "date_group_with_dates";

pub(super) fn register(registry: &mut Registry) {
    registry.define("simple_group", Builtin::new(simple_group));
    registry.define("date_group", Builtin::with_context(date_group));
}

fn entry(value: &Value, function: &str, arity: usize) -> Result<Vec<Value>> {
    match value.as_sequence() {
        Some(items) if items.len() == arity => Ok(items),
        _ => Err(InvalidExpression::type_error(format!(
            "{function}() ranges must be sequences of {arity} items, got {}",
            value.repr()
        ))),
    }
}

// ============================================================================
// simple_group
// ============================================================================

/// `simple_group(value, ranges, default=None)`: the label of the first
/// `(begin, end, label)` with `begin < value <= end`. A `None` bound is
/// unbounded.
fn simple_group(args: Args) -> Result<Value> {
    let [value, ranges, default] = args.bind("simple_group", ["value", "ranges", "default"])?;
    let value = required(value, "simple_group", "value")?;
    let ranges = required(ranges, "simple_group", "ranges")?.iterate()?;
    for range in &ranges {
        let [begin, end, label]: [Value; 3] = entry(range, "simple_group", 3)?
            .try_into()
            .map_err(|_| InvalidExpression::type_error("simple_group() malformed range"))?;
        let above = begin.is_none() || begin.try_cmp(&value)?.is_some_and(|o| o.is_lt());
        let below = end.is_none() || value.try_cmp(&end)?.is_some_and(|o| o.is_le());
        if above && below {
            return Ok(label);
        }
    }
    Ok(default.unwrap_or(Value::None))
}

// ============================================================================
// date_group
// ============================================================================

fn default_begin() -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(1900, 1, 1).ok_or_else(|| InvalidExpression::eval("invalid date"))
}

fn default_end() -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(2100, 12, 31).ok_or_else(|| InvalidExpression::eval("invalid date"))
}

fn bound(value: &Value, fallback: fn() -> Result<NaiveDate>, param: &str) -> Result<NaiveDate> {
    if value.is_none() {
        fallback()
    } else {
        expect_date(value, "date_group", param)
    }
}

/// Advance one bucket. Integers count days.
fn advance(date: NaiveDate, step: &Value) -> Result<Option<NaiveDate>> {
    match step {
        Value::Duration(d) => Ok(date.checked_add_signed(*d)),
        Value::Delta(delta) => Ok(delta.apply(date)),
        other => match other.as_int() {
            Some(n) => Ok(TimeDelta::try_days(n).and_then(|d| date.checked_add_signed(d))),
            None => Err(InvalidExpression::type_error(format!(
                "date_group() step must be a duration, not '{}'",
                other.type_name()
            ))),
        },
    }
}

/// The bucket of `begin..=end` stepped by `step` that holds `value`.
fn find_bucket(
    evaluator: &Evaluator,
    value: NaiveDate,
    begin: NaiveDate,
    end: NaiveDate,
    step: &Value,
) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let mut start = begin;
    while start <= end && start <= value {
        evaluator.check_time()?;
        let Some(next) = advance(start, step)? else {
            // The next bucket starts past the representable range.
            return Ok((value <= end).then_some((start, end)));
        };
        if next <= start {
            return Err(InvalidExpression::invalid(format!(
                "date_group() step {} does not advance from {start}",
                step.repr()
            )));
        }
        if value < next && value <= end {
            return Ok(Some((start, next.min(end))));
        }
        start = next;
    }
    Ok(None)
}

fn render_label(label: &Value, begin: NaiveDate, end: NaiveDate) -> Result<Value> {
    let Some(parts) = label.as_sequence().filter(|parts| parts.len() == 6) else {
        return Ok(label.clone());
    };
    let text = |v: &Value| match v {
        Value::None => String::new(),
        other => other.as_str().map_or_else(|| other.to_string(), str::to_string),
    };
    let date = |v: &Value, d: NaiveDate| -> Result<String> {
        match v {
            Value::None => Ok(String::new()),
            other => {
                let format = other.as_str().ok_or_else(|| {
                    InvalidExpression::type_error(format!(
                        "date_group() format must be a str, not '{}'",
                        other.type_name()
                    ))
                })?;
                datetime::format_date(d.and_time(chrono::NaiveTime::MIN), format)
            }
        }
    };
    Ok(Value::from(format!(
        "{}{}{}{}{}{}",
        text(&parts[0]),
        date(&parts[1], begin)?,
        text(&parts[2]),
        text(&parts[3]),
        date(&parts[4], end)?,
        text(&parts[5]),
    )))
}

/// `date_group(value, ranges, default=None)` where each range is
/// `(begin, end, step, label)`.
///
/// Without a step a range matches when `begin <= value <= end`. With a
/// step the range is cut into consecutive buckets and the label describes
/// the bucket holding `value`. A six-item label
/// `(prefix, begin_format, infix, infix, end_format, suffix)` is rendered
/// with the bucket's dates.
///
/// When the context flag `date_group_with_dates` is set the result is
/// `(label, begin, end)`, or `(default, None, None)` when nothing matches.
fn date_group(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    let [value, ranges, default] = args.bind("date_group", ["value", "ranges", "default"])?;
    let value = expect_date(&required(value, "date_group", "value")?, "date_group", "value")?;
    let ranges = required(ranges, "date_group", "ranges")?.iterate()?;
    let with_dates = evaluator.context().flag(WITH_DATES_KEY);

    for range in &ranges {
        evaluator.check_time()?;
        let [begin, end, step, label]: [Value; 4] = entry(range, "date_group", 4)?
            .try_into()
            .map_err(|_| InvalidExpression::type_error("date_group() malformed range"))?;
        let begin = bound(&begin, default_begin, "begin")?;
        let end = bound(&end, default_end, "end")?;
        if value < begin || value > end {
            continue;
        }
        let bucket = if step.is_none() {
            Some((begin, end))
        } else {
            find_bucket(evaluator, value, begin, end, &step)?
        };
        if let Some((bucket_begin, bucket_end)) = bucket {
            let label = render_label(&label, bucket_begin, bucket_end)?;
            return Ok(if with_dates {
                Value::tuple(vec![label, Value::Date(bucket_begin), Value::Date(bucket_end)])
            } else {
                label
            });
        }
    }

    let default = default.unwrap_or(Value::None);
    Ok(if with_dates {
        Value::tuple(vec![default, Value::None, Value::None])
    } else {
        default
    })
}
