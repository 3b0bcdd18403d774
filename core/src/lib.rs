//! A sandboxed engine for Python-like business formulas.
//!
//! Scripts are parsed into a syntax tree and walked directly by an
//! [`Evaluator`](evaluator::Evaluator) under wall-clock, depth and size
//! limits. Host objects reach scripts only through registered projectors
//! (see [`projection`]).

pub mod api;
pub mod errors;
pub mod evaluator;
pub mod parser;
pub mod projection;
pub mod stdlib;
pub mod values;

pub use api::{Context, Engine, EngineBuilder, EngineOptions, ExecutionOptions, Limits, Now};
pub use errors::{ErrorKind, InvalidExpression};
pub use values::{Args, Builtin, Dict, DomainObject, Value};

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
    /// Call this at the start of tests where you want to see logging output
    ///
    /// # Example
    /// ```ignore
    /// #[test]
    /// fn test_projection_cache() {
    ///     test_utils::init_test_logging();
    ///     // ... your test code
    /// }
    /// ```
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
