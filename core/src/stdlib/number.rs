//! Number Package
//!
//! Locale-style rendering and parsing of numbers, driven by explicit
//! separators rather than a system locale.

use crate::api::Registry;
use crate::errors::{InvalidExpression, Result};
use crate::values::{Args, Builtin, Number, Value, format_float};

use super::{expect_int, expect_str, is_missing, required, str_or};

pub(super) fn register(registry: &mut Registry) {
    registry.define("format_number", Builtin::new(format_number));
    registry.define("parse_number", Builtin::new(parse_number));
}

/// How negative numbers are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NegativeFormat {
    /// `-1,234.50`
    Sign,
    /// `(1,234.50)`
    Parentheses,
}

/// `format_number(number, decimal_sep='.', decimal_round=None,
/// thousands_sep='', zero_format=None, negative_format=0)`.
fn format_number(args: Args) -> Result<Value> {
    let [number, decimal_sep, decimal_round, thousands_sep, zero_format, negative_format] = args
        .bind(
            "format_number",
            [
                "number",
                "decimal_sep",
                "decimal_round",
                "thousands_sep",
                "zero_format",
                "negative_format",
            ],
        )?;
    let number = required(number, "format_number", "number")?;
    let number = number.as_number().ok_or_else(|| {
        InvalidExpression::type_error(format!(
            "format_number() argument 'number' must be a number, not {}",
            number.type_name()
        ))
    })?;
    let decimal_sep = str_or(decimal_sep, ".", "format_number", "decimal_sep")?;
    let thousands_sep = str_or(thousands_sep, "", "format_number", "thousands_sep")?;
    let decimal_round = match decimal_round {
        Some(v) if !v.is_none() => {
            let digits = expect_int(&v, "format_number", "decimal_round")?;
            Some(usize::try_from(digits).map_err(|_| {
                InvalidExpression::eval("format_number() decimal_round must not be negative")
            })?)
        }
        _ => None,
    };
    let negative_format = match negative_format {
        Some(v) if !v.is_none() => match expect_int(&v, "format_number", "negative_format")? {
            0 => NegativeFormat::Sign,
            1 => NegativeFormat::Parentheses,
            other => {
                return Err(InvalidExpression::eval(format!(
                    "format_number() unknown negative_format {other}"
                )));
            }
        },
        _ => NegativeFormat::Sign,
    };

    if number.as_f64() == 0.0 && !is_missing(&zero_format) {
        return zero_format.map_or(Ok(Value::None), |v| {
            expect_str(&v, "format_number", "zero_format").map(Value::from)
        });
    }

    Ok(Value::from(render(
        number,
        decimal_round,
        &decimal_sep,
        &thousands_sep,
        negative_format,
    )))
}

fn render(
    number: Number,
    decimal_round: Option<usize>,
    decimal_sep: &str,
    thousands_sep: &str,
    negative_format: NegativeFormat,
) -> String {
    let negative = number.as_f64() < 0.0;
    let digits = match (number, decimal_round) {
        (Number::Int(i), None) => i.unsigned_abs().to_string(),
        (Number::Float(f), None) => format_float(f.abs()),
        (n, Some(places)) => format!("{:.*}", places.min(20), n.as_f64().abs()),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits.as_str(), None),
    };

    let mut out = group_thousands(whole, thousands_sep);
    if let Some(fraction) = fraction {
        out.push_str(decimal_sep);
        out.push_str(fraction);
    }
    // Rounding can turn a small negative into zero.
    let negative = negative && out.chars().any(|c| c.is_ascii_digit() && c != '0');
    match (negative, negative_format) {
        (false, _) => out,
        (true, NegativeFormat::Sign) => format!("-{out}"),
        (true, NegativeFormat::Parentheses) => format!("({out})"),
    }
}

fn group_thousands(whole: &str, sep: &str) -> String {
    if sep.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return whole.to_string();
    }
    let mut out = String::with_capacity(whole.len() + whole.len() / 3 * sep.len());
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push_str(sep);
        }
        out.push(c);
    }
    out
}

/// `parse_number(text, decimal_sep='.', thousands_sep='')`: the inverse of
/// `format_number`. Parentheses mean a negative number.
fn parse_number(args: Args) -> Result<Value> {
    let [text, decimal_sep, thousands_sep] =
        args.bind("parse_number", ["text", "decimal_sep", "thousands_sep"])?;
    let text = required(text, "parse_number", "text")?;
    if text.as_number().is_some() {
        return Ok(text);
    }
    let raw = expect_str(&text, "parse_number", "text")?;
    let decimal_sep = str_or(decimal_sep, ".", "parse_number", "decimal_sep")?;
    let thousands_sep = str_or(thousands_sep, "", "parse_number", "thousands_sep")?;

    let mut cleaned = raw.trim().to_string();
    let negative = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].trim().to_string();
    }
    if !thousands_sep.is_empty() {
        cleaned = cleaned.replace(&thousands_sep, "");
    }
    if decimal_sep != "." {
        cleaned = cleaned.replace(&decimal_sep, ".");
    }
    cleaned.retain(|c| !c.is_whitespace());

    let invalid = || {
        InvalidExpression::eval(format!(
            "could not convert string to number: {}",
            text.repr()
        ))
    };
    let value = if cleaned.contains(['.', 'e', 'E']) {
        Value::Float(cleaned.parse::<f64>().map_err(|_| invalid())?)
    } else {
        Value::Int(cleaned.parse::<i64>().map_err(|_| invalid())?)
    };
    Ok(match (negative, value) {
        (false, value) => value,
        (true, Value::Int(i)) => Value::Int(
            i.checked_neg()
                .ok_or_else(|| InvalidExpression::eval("integer overflow"))?,
        ),
        (true, Value::Float(f)) => Value::Float(-f),
        (true, other) => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1234567", ","), "1,234,567");
        assert_eq!(group_thousands("123", ","), "123");
        assert_eq!(group_thousands("1000", " "), "1 000");
        assert_eq!(group_thousands("1000", ""), "1000");
    }

    #[test]
    fn test_render() {
        assert_eq!(
            render(Number::Float(-1234.5), Some(2), ",", ".", NegativeFormat::Sign),
            "-1.234,50"
        );
        assert_eq!(
            render(Number::Int(-1000), None, ".", ",", NegativeFormat::Parentheses),
            "(1,000)"
        );
        assert_eq!(
            render(Number::Float(-0.001), Some(2), ".", "", NegativeFormat::Sign),
            "0.00"
        );
    }
}
