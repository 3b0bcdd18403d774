//! Formula - a sandboxed engine for Python-like business formulas
//!
//! # Overview
//!
//! Formula evaluates short scripts written by end users (report columns,
//! import mappings, naming rules) inside a host application. Scripts use a
//! Python-like syntax with assignment, `if`, `for`, `while`, `def` and
//! `try`, but run under strict limits: a wall-clock budget, a nesting depth,
//! and bounds on string length, collection size, exponents and shifts.
//!
//! # Quick Start
//!
//! ```
//! use formula::{Engine, Value};
//!
//! let engine = Engine::default();
//! let result = engine
//!     .evaluate("price * qty if qty > 0 else 0", &[
//!         ("price", Value::Float(2.5)),
//!         ("qty", Value::Int(4)),
//!     ])
//!     .unwrap();
//! assert_eq!(result, Value::Float(10.0));
//! ```
//!
//! # Host Integration
//!
//! Host functions are registered on an [`EngineBuilder`]; host objects are
//! exposed as mappings through projectors:
//!
//! ```
//! use std::any::Any;
//! use formula::{Builtin, Context, Dict, DomainObject, Engine, Value};
//!
//! struct Portfolio { name: String }
//!
//! impl DomainObject for Portfolio {
//!     fn type_name(&self) -> &str { "Portfolio" }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! let engine = Engine::builder()
//!     .register_function("greet", Builtin::new(|args| {
//!         let [name] = args.bind("greet", ["name"])?;
//!         Ok(Value::from(format!("hello {}", name.unwrap_or(Value::None))))
//!     }))
//!     .unwrap()
//!     .register_projector(|p: &Portfolio, _: &Context| {
//!         let mut dict = Dict::new();
//!         dict.insert_str("name", Value::str(&p.name));
//!         Ok(dict)
//!     })
//!     .build();
//!
//! let names = [("portfolio", Value::object(Portfolio { name: "Core".into() }))];
//! assert_eq!(
//!     engine.evaluate("greet(portfolio.name)", &names).unwrap(),
//!     Value::str("hello Core"),
//! );
//! ```
//!
//! # One-off Evaluation
//!
//! The free functions in this crate use a shared default engine:
//!
//! ```
//! assert_eq!(formula::evaluate("1 + 1", &[]).unwrap(), formula::Value::Int(2));
//! assert!(formula::validate("x = 1"));
//! assert!(!formula::validate("x = (1 +"));
//! ```

use once_cell::sync::Lazy;

// Re-export public API from formula_core
pub use formula_core::api::{
    Context, Engine, EngineBuilder, EngineOptions, ExecutionOptions, Limits, Now, ParseOptions,
    Registry, RegistryError,
};
pub use formula_core::errors::{ErrorKind, InvalidExpression};
pub use formula_core::evaluator::Evaluator;
pub use formula_core::parser::SyntaxTree;
pub use formula_core::values::{self, Args, Builtin, CalendarDelta, Dict, DomainObject, Value};

mod error_renderer;

pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(Engine::default);

/// The shared engine behind the free functions.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

/// Evaluate `source` with the default engine and options.
pub fn evaluate(source: &str, names: &[(&str, Value)]) -> Result<Value, InvalidExpression> {
    DEFAULT_ENGINE.evaluate(source, names)
}

/// Evaluate and collect the `print_message` output.
pub fn evaluate_with_log(
    source: &str,
    names: &[(&str, Value)],
) -> Result<(Value, String), InvalidExpression> {
    DEFAULT_ENGINE.evaluate_with_log(source, names, Context::with_log())
}

/// True when `source` parses.
pub fn validate(source: &str) -> bool {
    DEFAULT_ENGINE.validate(source)
}

pub fn is_valid(source: &str) -> bool {
    DEFAULT_ENGINE.is_valid(source)
}
