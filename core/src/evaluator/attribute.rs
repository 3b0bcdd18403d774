//! Attribute access, subscripts and slices.
//!
//! Attribute access is strict: anything outside the allow-lists is an
//! `AttributeDoesNotExist`. Subscripts are soft: a missing index or key
//! yields `Ok(None)` and type mismatches surface as type errors that the
//! evaluator turns into `None` (see [`is_soft`]).

use std::rc::Rc;

use chrono::{Datelike, Weekday};

use crate::errors::{ErrorKind, InvalidExpression, Result};
use crate::values::{BoundMethod, ListMethod, Value};

use super::operators::floor_days;

/// Errors a subscript swallows.
pub(super) fn is_soft(err: &InvalidExpression) -> bool {
    matches!(err.kind(), ErrorKind::Type(_))
}

/// `value.attr`.
pub(super) fn get(value: &Value, attr: &str) -> Result<Value> {
    let missing = || InvalidExpression::attribute_does_not_exist(attr);
    match value {
        Value::Dict(dict) => dict.borrow().get_str(attr).cloned().ok_or_else(missing),
        Value::List(items) => {
            let method = ListMethod::from_name(attr).ok_or_else(missing)?;
            Ok(Value::Method(Rc::new(BoundMethod {
                receiver: items.clone(),
                method,
            })))
        }
        Value::Date(date) => date_field(*date, attr).ok_or_else(missing),
        Value::DateTime(dt) => date_field(dt.date(), attr).ok_or_else(missing),
        Value::Duration(td) => match attr {
            "days" => Ok(Value::Int(floor_days(*td))),
            _ => Err(missing()),
        },
        Value::Delta(delta) => Ok(match attr {
            "years" => Value::Int(delta.years),
            "months" => Value::Int(delta.months),
            "days" => Value::Int(delta.days),
            "leapdays" => Value::Int(delta.leapdays),
            "year" => Value::from(delta.year.map(i64::from)),
            "month" => Value::from(delta.month.map(i64::from)),
            "day" => Value::from(delta.day.map(i64::from)),
            "weekday" => Value::from(delta.weekday.map(weekday_index)),
            _ => return Err(missing()),
        }),
        _ => Err(missing()),
    }
}

fn date_field(date: impl Datelike, attr: &str) -> Option<Value> {
    match attr {
        "year" => Some(Value::Int(date.year().into())),
        "month" => Some(Value::Int(date.month().into())),
        "day" => Some(Value::Int(date.day().into())),
        _ => None,
    }
}

fn weekday_index(weekday: Weekday) -> i64 {
    weekday.num_days_from_monday().into()
}

/// `container[key]`. `Ok(None)` is a miss.
pub(super) fn index(container: &Value, key: &Value) -> Result<Option<Value>> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            Ok(position(items.len(), key)?.map(|i| items[i].clone()))
        }
        Value::Tuple(items) => Ok(position(items.len(), key)?.map(|i| items[i].clone())),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(position(chars.len(), key)?.map(|i| Value::from(chars[i].to_string())))
        }
        Value::Dict(dict) => Ok(dict.borrow().get(key)?.cloned()),
        other => Err(InvalidExpression::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Resolve a possibly negative index against `len`.
fn position(len: usize, key: &Value) -> Result<Option<usize>> {
    let i = key.as_int().ok_or_else(|| {
        InvalidExpression::type_error(format!(
            "indices must be integers, not {}",
            key.type_name()
        ))
    })?;
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    Ok((0..len).contains(&i).then_some(i as usize))
}

/// `container[lower:upper:step]`, with Python's clamping rules.
pub(super) fn slice(
    container: &Value,
    lower: Option<Value>,
    upper: Option<Value>,
    step: Option<Value>,
) -> Result<Option<Value>> {
    let bound = |v: Option<Value>| -> Result<Option<i64>> {
        match v {
            None | Some(Value::None) => Ok(None),
            Some(v) => v.as_int().map(Some).ok_or_else(|| {
                InvalidExpression::type_error(
                    "slice indices must be integers or None".to_string(),
                )
            }),
        }
    };
    let (lower, upper, step) = (bound(lower)?, bound(upper)?, bound(step)?.unwrap_or(1));
    if step == 0 {
        return Err(InvalidExpression::eval("slice step cannot be zero"));
    }

    Ok(Some(match container {
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), lower, upper, step);
            Value::list(picked.into_iter().map(|i| items[i].clone()).collect())
        }
        Value::Tuple(items) => {
            let picked = slice_indices(items.len(), lower, upper, step);
            Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), lower, upper, step);
            Value::from(picked.into_iter().map(|i| chars[i]).collect::<String>())
        }
        other => {
            return Err(InvalidExpression::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            )));
        }
    }))
}

fn slice_indices(len: usize, lower: Option<i64>, upper: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let clamp = |i: i64, low: i64, high: i64| {
        let i = if i < 0 { i + len } else { i };
        i.clamp(low, high)
    };
    let mut picked = Vec::new();
    if step > 0 {
        let start = lower.map_or(0, |i| clamp(i, 0, len));
        let stop = upper.map_or(len, |i| clamp(i, 0, len));
        let mut i = start;
        while i < stop {
            picked.push(i as usize);
            let Some(next) = i.checked_add(step) else { break };
            i = next;
        }
    } else {
        let start = lower.map_or(len - 1, |i| clamp(i, -1, len - 1));
        let stop = upper.map_or(-1, |i| clamp(i, -1, len - 1));
        let mut i = start;
        while i > stop {
            picked.push(i as usize);
            let Some(next) = i.checked_add(step) else { break };
            i = next;
        }
    }
    picked
}

/// `container[key] = value`, mutating in place.
pub(super) fn set_item(container: &Value, key: Value, value: Value) -> Result<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = position(items.len(), &key)?
                .ok_or_else(|| InvalidExpression::eval("list assignment index out of range"))?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(dict) => {
            dict.borrow_mut().insert(key, value)?;
            Ok(())
        }
        other => Err(InvalidExpression::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::values::CalendarDelta;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().map(|i| Value::Int(*i)).collect())
    }

    fn sl(container: &Value, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Value {
        slice(
            container,
            lower.map(Value::Int),
            upper.map(Value::Int),
            step.map(Value::Int),
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_index() {
        let list = ints(&[1, 2, 3]);
        assert_eq!(index(&list, &Value::Int(0)).unwrap(), Some(Value::Int(1)));
        assert_eq!(index(&list, &Value::Int(-1)).unwrap(), Some(Value::Int(3)));
        assert_eq!(index(&list, &Value::Int(3)).unwrap(), None);
        assert!(is_soft(&index(&list, &Value::str("a")).unwrap_err()));
        assert_eq!(
            index(&Value::str("héllo"), &Value::Int(1)).unwrap(),
            Some(Value::str("é"))
        );
        assert!(is_soft(&index(&Value::Int(1), &Value::Int(0)).unwrap_err()));
    }

    #[test]
    fn test_slices() {
        let list = ints(&[0, 1, 2, 3, 4]);
        assert_eq!(sl(&list, Some(1), Some(3), None), ints(&[1, 2]));
        assert_eq!(sl(&list, None, None, Some(-1)), ints(&[4, 3, 2, 1, 0]));
        assert_eq!(sl(&list, Some(-2), None, None), ints(&[3, 4]));
        assert_eq!(sl(&list, None, None, Some(2)), ints(&[0, 2, 4]));
        assert_eq!(sl(&list, Some(10), None, None), ints(&[]));
        assert_eq!(sl(&list, Some(3), Some(0), Some(-1)), ints(&[3, 2, 1]));
        assert_eq!(sl(&Value::str("hello"), Some(1), Some(-1), None), Value::str("ell"));

        let err = slice(&list, None, None, Some(Value::Int(0))).unwrap_err();
        assert!(!is_soft(&err));
    }

    #[test]
    fn test_extreme_steps() {
        let list = ints(&[1, 2, 3]);
        assert_eq!(sl(&list, Some(1), None, Some(i64::MAX)), ints(&[2]));
        assert_eq!(sl(&list, None, None, Some(-i64::MAX)), ints(&[3]));
        assert_eq!(sl(&list, None, None, Some(i64::MIN)), ints(&[3]));
        assert_eq!(
            sl(&Value::str("abc"), Some(i64::MIN), Some(i64::MAX), Some(i64::MAX)),
            Value::str("a")
        );
    }

    #[test]
    fn test_allow_listed_attributes() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(get(&date, "month").unwrap(), Value::Int(3));
        assert!(get(&date, "weekday").is_err());

        let delta = Value::Delta(CalendarDelta {
            months: 2,
            day: Some(31),
            ..CalendarDelta::default()
        });
        assert_eq!(get(&delta, "months").unwrap(), Value::Int(2));
        assert_eq!(get(&delta, "day").unwrap(), Value::Int(31));
        assert_eq!(get(&delta, "year").unwrap(), Value::None);

        let list = ints(&[]);
        assert!(matches!(get(&list, "append").unwrap(), Value::Method(_)));
        let err = get(&list, "sort").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::AttributeDoesNotExist("sort".into()));
        assert!(get(&Value::Int(1), "real").is_err());
    }

    #[test]
    fn test_set_item() {
        let list = ints(&[1, 2]);
        set_item(&list, Value::Int(-1), Value::Int(9)).unwrap();
        assert_eq!(list, ints(&[1, 9]));
        assert!(set_item(&list, Value::Int(5), Value::None).is_err());
        assert!(set_item(&Value::tuple(vec![]), Value::Int(0), Value::None).is_err());
    }
}
