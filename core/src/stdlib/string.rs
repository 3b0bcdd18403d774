//! String Package
//!
//! Design notes:
//! - Positions and lengths count characters, not bytes
//! - Regular expressions use the `regex` crate with a bounded compiled size,
//!   so a hostile pattern cannot exhaust memory
//! - Replacement strings accept Python's `\1` and `\g<name>` group references

use regex::{Regex, RegexBuilder};

use crate::api::Registry;
use crate::errors::{InvalidExpression, Result};
use crate::evaluator::operators;
use crate::values::{Args, Builtin, Value};

use super::{expect_int, expect_str, is_missing, required};

/// Upper bound on a compiled pattern, in bytes.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

pub(super) fn register(registry: &mut Registry) {
    registry.define("upper", Builtin::new(upper));
    registry.define("lower", Builtin::new(lower));
    registry.define("contains", Builtin::new(contains));
    registry.define("replace", Builtin::new(replace));
    registry.define("substr", Builtin::new(substr));
    registry.define("split", Builtin::new(split));
    registry.define("join", Builtin::new(join));
    registry.define("reverse", Builtin::new(reverse));
    registry.define("reg_search", Builtin::new(reg_search));
    registry.define("reg_replace", Builtin::new(reg_replace));
}

// ============================================================================
// Case and search
// ============================================================================

fn upper(args: Args) -> Result<Value> {
    let [text] = args.bind("upper", ["text"])?;
    let text = expect_str(&required(text, "upper", "text")?, "upper", "text")?;
    Ok(Value::from(text.to_uppercase()))
}

fn lower(args: Args) -> Result<Value> {
    let [text] = args.bind("lower", ["text"])?;
    let text = expect_str(&required(text, "lower", "text")?, "lower", "text")?;
    Ok(Value::from(text.to_lowercase()))
}

/// `contains(container, item)` is `item in container`.
fn contains(args: Args) -> Result<Value> {
    let [container, item] = args.bind("contains", ["container", "item"])?;
    let container = required(container, "contains", "container")?;
    let item = required(item, "contains", "item")?;
    operators::contains(&container, &item).map(Value::Bool)
}

fn replace(args: Args) -> Result<Value> {
    let [text, old, new] = args.bind("replace", ["text", "old", "new"])?;
    let text = expect_str(&required(text, "replace", "text")?, "replace", "text")?;
    let old = expect_str(&required(old, "replace", "old")?, "replace", "old")?;
    let new = expect_str(&required(new, "replace", "new")?, "replace", "new")?;
    Ok(Value::from(text.replace(&old, &new)))
}

// ============================================================================
// Slicing and splitting
// ============================================================================

/// `substr(text, start, length=None)`. A negative start counts from the end.
fn substr(args: Args) -> Result<Value> {
    let [text, start, length] = args.bind("substr", ["text", "start", "length"])?;
    let text = expect_str(&required(text, "substr", "text")?, "substr", "text")?;
    let start = expect_int(&required(start, "substr", "start")?, "substr", "start")?;
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let start = if start < 0 { (start + len).max(0) } else { start.min(len) };
    let end = match length {
        Some(v) if !v.is_none() => {
            let length = expect_int(&v, "substr", "length")?;
            if length < 0 {
                return Err(InvalidExpression::eval("substr() length must not be negative"));
            }
            start.saturating_add(length).min(len)
        }
        _ => len,
    };
    Ok(Value::from(
        chars[start as usize..end as usize].iter().collect::<String>(),
    ))
}

/// `split(text, sep=None)`. Without a separator, splits on runs of
/// whitespace.
fn split(args: Args) -> Result<Value> {
    let [text, sep] = args.bind("split", ["text", "sep"])?;
    let text = expect_str(&required(text, "split", "text")?, "split", "text")?;
    let parts: Vec<Value> = if is_missing(&sep) {
        text.split_whitespace().map(Value::str).collect()
    } else {
        let sep = expect_str(&required(sep, "split", "sep")?, "split", "sep")?;
        if sep.is_empty() {
            return Err(InvalidExpression::eval("empty separator"));
        }
        text.split(sep.as_str()).map(Value::str).collect()
    };
    Ok(Value::list(parts))
}

/// `join(items, sep='')`. Non-string items are converted with `str()`.
fn join(args: Args) -> Result<Value> {
    let [items, sep] = args.bind("join", ["items", "sep"])?;
    let items = required(items, "join", "items")?.iterate()?;
    let sep = super::str_or(sep, "", "join", "sep")?;
    let joined = items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(&sep);
    Ok(Value::from(joined))
}

fn reverse(args: Args) -> Result<Value> {
    let [value] = args.bind("reverse", ["value"])?;
    match required(value, "reverse", "value")? {
        Value::Str(s) => Ok(Value::from(s.chars().rev().collect::<String>())),
        Value::List(items) => Ok(Value::list(items.borrow().iter().rev().cloned().collect())),
        Value::Tuple(items) => Ok(Value::tuple(items.iter().rev().cloned().collect())),
        other => Err(InvalidExpression::type_error(format!(
            "reverse() argument must be a string or sequence, not '{}'",
            other.type_name()
        ))),
    }
}

// ============================================================================
// Regular expressions
// ============================================================================

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| InvalidExpression::eval(format!("invalid regular expression: {e}")))
}

/// `reg_search(text, pattern)`: the first match, or `None`.
fn reg_search(args: Args) -> Result<Value> {
    let [text, pattern] = args.bind("reg_search", ["text", "pattern"])?;
    let text = expect_str(&required(text, "reg_search", "text")?, "reg_search", "text")?;
    let pattern = expect_str(
        &required(pattern, "reg_search", "pattern")?,
        "reg_search",
        "pattern",
    )?;
    let regex = compile(&pattern)?;
    Ok(regex
        .find(&text)
        .map_or(Value::None, |m| Value::str(m.as_str())))
}

/// `reg_replace(text, pattern, replacement)`: replace every match.
fn reg_replace(args: Args) -> Result<Value> {
    let [text, pattern, replacement] =
        args.bind("reg_replace", ["text", "pattern", "replacement"])?;
    let text = expect_str(&required(text, "reg_replace", "text")?, "reg_replace", "text")?;
    let pattern = expect_str(
        &required(pattern, "reg_replace", "pattern")?,
        "reg_replace",
        "pattern",
    )?;
    let replacement = expect_str(
        &required(replacement, "reg_replace", "replacement")?,
        "reg_replace",
        "replacement",
    )?;
    let regex = compile(&pattern)?;
    let replacement = translate_replacement(&replacement);
    Ok(Value::from(
        regex.replace_all(&text, replacement.as_str()).into_owned(),
    ))
}

/// Rewrite Python replacement syntax for the `regex` crate.
fn translate_replacement(python: &str) -> String {
    let mut out = String::with_capacity(python.len());
    let mut chars = python.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        if group.len() == 2 {
                            break;
                        }
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|c| *c != '>').collect();
                        out.push_str(&format!("${{{name}}}"));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement(r"\1-\2"), "${1}-${2}");
        assert_eq!(translate_replacement(r"\g<year>/x"), "${year}/x");
        assert_eq!(translate_replacement("cost $5"), "cost $$5");
        assert_eq!(translate_replacement(r"a\\b"), r"a\b");
        assert_eq!(translate_replacement(r"\12"), "${12}");
    }

    #[test]
    fn test_regex_size_limit() {
        assert!(compile(r"\d+").is_ok());
        assert!(compile(r"(\w{1000}){1000}").is_err());
    }
}
