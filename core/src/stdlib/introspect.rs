//! Introspection Package
//!
//! Look at the variable table of the running script. Values come back
//! projected, exactly as a plain name lookup would return them.

use crate::api::Registry;
use crate::errors::Result;
use crate::evaluator::Evaluator;
use crate::values::{Args, Builtin, Dict, Value};

use super::{expect_str, required};

pub(super) fn register(registry: &mut Registry) {
    registry.define("has_var", Builtin::with_context(has_var));
    registry.define("get_var", Builtin::with_context(get_var));
    registry.define("globals", Builtin::with_context(globals));
    registry.define("locals", Builtin::with_context(locals));
}

fn has_var(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    let [name] = args.bind("has_var", ["name"])?;
    let name = expect_str(&required(name, "has_var", "name")?, "has_var", "name")?;
    Ok(Value::Bool(evaluator.name(&name).is_some()))
}

/// `get_var(name, default=None)`.
fn get_var(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    let [name, default] = args.bind("get_var", ["name", "default"])?;
    let name = expect_str(&required(name, "get_var", "name")?, "get_var", "name")?;
    match evaluator.name(&name).cloned() {
        Some(value) => evaluator.project(value),
        None => Ok(default.unwrap_or(Value::None)),
    }
}

/// The names the host supplied, in the order given.
fn globals(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    args.bind("globals", [])?;
    let mut dict = Dict::new();
    for (name, value) in evaluator.globals().to_vec() {
        let value = evaluator.project(value)?;
        dict.insert_str(&name, value);
    }
    Ok(Value::dict(dict))
}

/// Every name currently bound except the built-in functions, sorted.
fn locals(evaluator: &mut Evaluator, args: Args) -> Result<Value> {
    args.bind("locals", [])?;
    let mut names: Vec<(String, Value)> = evaluator
        .names()
        .iter()
        .filter(|(_, value)| !matches!(value, Value::Builtin(_)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    let mut dict = Dict::new();
    for (name, value) in names {
        let value = evaluator.project(value)?;
        dict.insert_str(&name, value);
    }
    Ok(Value::dict(dict))
}
