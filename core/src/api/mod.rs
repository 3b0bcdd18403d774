//! Public API for the formula engine.
//!
//! An [`Engine`] owns an immutable [`Registry`] of built-ins and domain
//! projectors plus default [`EngineOptions`]. Each evaluation gets its own
//! [`Evaluator`](crate::evaluator::Evaluator) with a fresh variable table,
//! deadline and projection cache.
//!
//! # Example
//!
//! ```
//! use formula_core::api::{Context, Engine};
//! use formula_core::values::Value;
//!
//! let engine = Engine::default();
//! let (value, log) = engine
//!     .evaluate_with_log("print_message('total', n)\nn + 1", &[("n", Value::Int(1))], Context::with_log())
//!     .unwrap();
//! assert_eq!(value, Value::Int(2));
//! assert_eq!(log, "total 1\n");
//! ```

pub mod context;
pub mod engine;
pub mod options;
pub mod registry;

pub use context::Context;
pub use engine::{Engine, EngineBuilder};
pub use options::{EngineOptions, ExecutionOptions, Limits, Now, ParseOptions};
pub use registry::{Registry, RegistryError};
