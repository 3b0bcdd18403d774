//! The formula engine.

use std::sync::Arc;

use super::{Context, EngineOptions, ExecutionOptions, Registry, RegistryError, context::LOG_KEY};
use crate::errors::Result;
use crate::evaluator::Evaluator;
use crate::parser::{self, SyntaxTree};
use crate::stdlib;
use crate::values::{Builtin, Dict, DomainObject, Value};

/// Parses and evaluates scripts against a fixed registry of built-ins and
/// projectors.
///
/// The engine itself holds no per-evaluation state and can be shared
/// between threads; every call builds its own [`Evaluator`].
///
/// # Example
///
/// ```
/// use formula_core::api::{Engine, EngineOptions};
/// use formula_core::values::{Builtin, Value};
///
/// let engine = Engine::builder()
///     .register_function("double", Builtin::new(|args| {
///         let [x] = args.bind("double", ["x"])?;
///         let x = x.and_then(|v| v.as_int()).unwrap_or(0);
///         Ok(Value::Int(x * 2))
///     }))
///     .unwrap()
///     .build();
///
/// assert_eq!(engine.evaluate("double(21)", &[]).unwrap(), Value::Int(42));
/// assert!(engine.validate("1 / 0"));
/// ```
pub struct Engine {
    registry: Arc<Registry>,
    options: EngineOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl Engine {
    /// An engine with the standard library and no host functions.
    pub fn new(options: EngineOptions) -> Self {
        Self::builder().options(options).build()
    }

    pub fn builder() -> EngineBuilder {
        let mut registry = Registry::new();
        stdlib::register_stdlib(&mut registry);
        EngineBuilder {
            registry,
            options: EngineOptions::default(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Parse without evaluating.
    pub fn parse(&self, source: &str) -> Result<SyntaxTree> {
        parser::parse_with_max_depth(source, self.options.parse.max_nesting)
    }

    /// True iff `source` parses. Nothing is executed.
    pub fn validate(&self, source: &str) -> bool {
        self.parse(source).is_ok()
    }

    /// Same check as [`validate`](Self::validate), for callers vetting user
    /// input before storing it.
    pub fn is_valid(&self, source: &str) -> bool {
        self.validate(source)
    }

    /// Evaluate with the engine's default execution options and an empty
    /// context.
    pub fn evaluate(&self, source: &str, names: &[(&str, Value)]) -> Result<Value> {
        self.evaluate_with_options(source, names, Context::new(), &self.options.execution)
    }

    pub fn evaluate_with_options(
        &self,
        source: &str,
        names: &[(&str, Value)],
        context: Context,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let tree = self.parse(source)?;
        self.evaluator_with_options(names, context, options.clone())
            .run(&tree)
    }

    /// Evaluate and return the output accumulated by `print_message`.
    ///
    /// A missing `log` entry in `context` is created empty.
    pub fn evaluate_with_log(
        &self,
        source: &str,
        names: &[(&str, Value)],
        mut context: Context,
    ) -> Result<(Value, String)> {
        let tree = self.parse(source)?;
        if !context.contains_key(LOG_KEY) {
            context.insert(LOG_KEY, "");
        }
        let mut evaluator = self.evaluator(names, context);
        let value = evaluator.run(&tree)?;
        let log = evaluator.context().log().unwrap_or_default().to_string();
        Ok((value, log))
    }

    /// A reusable evaluator, for hosts running several scripts against the
    /// same names.
    pub fn evaluator(&self, names: &[(&str, Value)], context: Context) -> Evaluator {
        self.evaluator_with_options(names, context, self.options.execution.clone())
    }

    pub fn evaluator_with_options(
        &self,
        names: &[(&str, Value)],
        context: Context,
        options: ExecutionOptions,
    ) -> Evaluator {
        Evaluator::new(self.registry.clone(), names, context, options)
    }
}

/// Collects host functions and projectors before the registry is frozen.
pub struct EngineBuilder {
    registry: Registry,
    options: EngineOptions,
}

impl EngineBuilder {
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a host function. Fails on invalid or already registered names,
    /// including standard library names.
    pub fn register_function(
        mut self,
        name: &str,
        builtin: Builtin,
    ) -> Result<Self, RegistryError> {
        self.registry.register_function(name, builtin)?;
        Ok(self)
    }

    /// Teach the engine how to turn a `T` into a mapping.
    pub fn register_projector<T: DomainObject>(
        mut self,
        projector: impl Fn(&T, &Context) -> Result<Dict> + Send + Sync + 'static,
    ) -> Self {
        self.registry.register_projector(projector);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            registry: Arc::new(self.registry),
            options: self.options,
        }
    }
}
