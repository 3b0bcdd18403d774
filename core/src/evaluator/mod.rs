//! Tree-walking evaluator for formula scripts.
//!
//! The evaluator walks a [`SyntaxTree`](crate::parser::SyntaxTree) statement
//! by statement and produces a [`Value`](crate::values::Value).
//!
//! ## Design Principles
//!
//! - **Never panic**: adversarial scripts end in an `InvalidExpression`, never
//!   an abort of the host.
//! - **Bounded**: every node checks the wall-clock deadline and a depth
//!   counter before it runs, so neither runaway loops nor deep recursion can
//!   escape the budget.
//! - **Copy-on-enter scoping**: a user function runs against a copy of the
//!   caller's variable table; the caller's table is restored untouched when
//!   the call returns.
//! - **Explicit control flow**: `break` and `return` travel as a [`Flow`]
//!   signal through the statement results rather than as errors.
//!
//! ## Example
//!
//! ```
//! use formula_core::api::Engine;
//! use formula_core::values::Value;
//!
//! let engine = Engine::default();
//! let result = engine.evaluate("x * 2 + 1", &[("x", Value::Int(20))]).unwrap();
//! assert_eq!(result, Value::Int(41));
//! ```

mod attribute;
mod call;
mod eval;
pub(crate) mod operators;


pub use eval::{Evaluator, Flow};
