//! `str()` and `repr()` renderings of values.

use core::fmt;

use chrono::TimeDelta;

use crate::values::{MAX_VALUE_DEPTH, Value};

impl Value {
    /// The quoted rendering used inside containers: `'a'` instead of `a`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_repr(&mut out, self, &mut Vec::new());
        out
    }
}

/// `str(value)`: strings render bare, everything else as its repr.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => write_repr(f, other, &mut Vec::new()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_repr(f, self, &mut Vec::new())
    }
}

/// `open` holds the containers being rendered, outermost first. A
/// container already open, or one nested past [`MAX_VALUE_DEPTH`],
/// renders as `[...]`.
fn write_repr(f: &mut impl fmt::Write, value: &Value, open: &mut Vec<usize>) -> fmt::Result {
    let (start, end) = match value {
        Value::List(_) => ('[', ']'),
        Value::Tuple(_) => ('(', ')'),
        Value::Set(set) if set.borrow().is_empty() => return f.write_str("set()"),
        Value::Set(_) | Value::Dict(_) => ('{', '}'),
        other => return write_scalar(f, other),
    };
    let id = value.identity().unwrap_or_default();
    if open.len() >= MAX_VALUE_DEPTH || open.contains(&id) {
        f.write_char(start)?;
        f.write_str("...")?;
        return f.write_char(end);
    }
    open.push(id);
    f.write_char(start)?;
    match value {
        Value::List(items) => write_items(f, &items.borrow(), open)?,
        Value::Tuple(items) => {
            write_items(f, items, open)?;
            if items.len() == 1 {
                f.write_char(',')?;
            }
        }
        Value::Set(set) => {
            for (i, item) in set.borrow().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_repr(f, item, open)?;
            }
        }
        Value::Dict(dict) => {
            for (i, (k, v)) in dict.borrow().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_repr(f, k, open)?;
                f.write_str(": ")?;
                write_repr(f, v, open)?;
            }
        }
        _ => {}
    }
    open.pop();
    f.write_char(end)
}

fn write_scalar(f: &mut impl fmt::Write, value: &Value) -> fmt::Result {
    match value {
        Value::None => f.write_str("None"),
        Value::Bool(true) => f.write_str("True"),
        Value::Bool(false) => f.write_str("False"),
        Value::Int(i) => write!(f, "{i}"),
        Value::Float(x) => f.write_str(&format_float(*x)),
        Value::Str(s) => escape_string(f, s),
        Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        Value::Duration(d) => f.write_str(&format_duration(*d)),
        Value::Delta(d) => write!(f, "{d}"),
        Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
        Value::Function(func) => write!(f, "<function {}>", func.name()),
        Value::Method(m) => write!(f, "<built-in method {} of list object>", m.method.name()),
        Value::Object(o) => write!(f, "<{} object>", o.type_name()),
        Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Dict(_) => Ok(()),
    }
}

fn write_items(f: &mut impl fmt::Write, items: &[Value], open: &mut Vec<usize>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_repr(f, item, open)?;
    }
    Ok(())
}

fn escape_string(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

/// Floats always show a fractional part or exponent, as in Python.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = value.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{value:e}");
        // Rust prints `1e20`; Python prints `1e+20`.
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        };
    }
    let s = value.to_string();
    if s.contains('.') { s } else { format!("{s}.0") }
}

/// Python's `str(timedelta)`: `[D day[s], ]H:MM:SS[.ffffff]`.
pub fn format_duration(d: TimeDelta) -> String {
    let total = d.num_seconds();
    let micros = (d - TimeDelta::seconds(total)).num_microseconds().unwrap_or(0);
    // Python normalises so that only the day count is negative.
    let (mut days, mut secs, mut micros) = (total.div_euclid(86_400), total.rem_euclid(86_400), micros);
    if micros < 0 {
        micros += 1_000_000;
        secs -= 1;
        if secs < 0 {
            secs += 86_400;
            days -= 1;
        }
    }
    let mut out = String::new();
    if days != 0 {
        let plural = if days.abs() == 1 { "" } else { "s" };
        out.push_str(&format!("{days} day{plural}, "));
    }
    out.push_str(&format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60));
    if micros != 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}
