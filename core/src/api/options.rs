//! Configuration options for the formula engine.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::parser::DEFAULT_MAX_NESTING;

/// Resource guards enforced by the operator table and collection literals.
///
/// # Example
///
/// ```
/// use formula_core::api::Limits;
///
/// let limits = Limits {
///     max_str_len: 1_000,
///     ..Limits::default()
/// };
/// assert_eq!(limits.max_len, 1_000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    /// Longest string a literal or `+` may produce, in characters.
    ///
    /// Default: 20,000
    pub max_str_len: usize,

    /// Most elements a collection literal may hold.
    ///
    /// Default: 1,000
    pub max_len: usize,

    /// Largest absolute base or exponent accepted by `**`.
    ///
    /// Default: 10,000
    pub max_exponent: i64,

    /// Largest shift amount accepted by `<<`.
    ///
    /// Default: 10
    pub max_shift: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_str_len: 20_000,
            max_len: 1_000,
            max_exponent: 10_000,
            max_shift: 10,
        }
    }
}

/// Where `now()` gets today's date from.
#[derive(Clone)]
pub enum Now {
    Fixed(NaiveDate),
    Clock(Arc<dyn Fn() -> NaiveDate + Send + Sync>),
}

impl Now {
    pub fn today(&self) -> NaiveDate {
        match self {
            Now::Fixed(date) => *date,
            Now::Clock(clock) => clock(),
        }
    }
}

impl fmt::Debug for Now {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Now::Fixed(date) => f.debug_tuple("Fixed").field(date).finish(),
            Now::Clock(_) => f.write_str("Clock(..)"),
        }
    }
}

/// Configuration options for script execution.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use formula_core::api::ExecutionOptions;
///
/// let options = ExecutionOptions {
///     max_time: Duration::from_secs(5),
///     allow_assign: false,
///     ..ExecutionOptions::default()
/// };
/// assert!(options.check_time);
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Wall-clock budget for one run.
    ///
    /// Default: 1800 seconds
    pub max_time: Duration,

    /// Consult the deadline before every node. Turning this off is the
    /// trusted/debug mode.
    ///
    /// Default: true
    pub check_time: bool,

    /// Whether `=` statements are allowed. Read-only contexts turn this off.
    ///
    /// Default: true
    pub allow_assign: bool,

    /// Maximum nesting of node evaluations, counting user function calls.
    ///
    /// Default: 256
    pub max_depth: usize,

    /// Override for `now()`. `None` means the local clock.
    pub now: Option<Now>,

    pub limits: Limits,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_time: Duration::from_secs(1800),
            check_time: true,
            allow_assign: true,
            max_depth: 256,
            now: None,
            limits: Limits::default(),
        }
    }
}

/// Configuration options for parsing.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum bracket/operator nesting the parser accepts.
    ///
    /// Default: 100
    pub max_nesting: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

/// Configuration options for the engine.
///
/// These set the defaults for every call, which can be overridden per call
/// with [`Engine::evaluate_with_options`](crate::api::Engine::evaluate_with_options).
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub parse: ParseOptions,
    pub execution: ExecutionOptions,
}
