//! The `InvalidExpression` error family.
//!
//! Every failure the engine can produce, from a malformed script to an
//! exhausted time budget, is an [`InvalidExpression`]. The [`ErrorKind`]
//! tells callers which named subtype they are looking at.

use core::fmt;

use thiserror::Error;

use crate::parser::Span;

/// An engine failure, optionally pinned to a region of the script.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidExpression {
    kind: ErrorKind,
    span: Option<Span>,
}

/// The named subtypes of [`InvalidExpression`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// The script could not be tokenized or parsed.
    #[error("{0}")]
    Syntax(String),

    /// A generic evaluation-time failure.
    #[error("{0}")]
    Eval(String),

    /// An operand or argument had the wrong type.
    #[error("{0}")]
    Type(String),

    /// The call target is missing or not callable.
    #[error("Function '{0}' not found")]
    FunctionNotDefined(String),

    /// A variable lookup missed.
    #[error("Name '{0}' is not defined")]
    NameNotDefined(String),

    /// Disallowed or missing attribute access.
    #[error("Attribute '{0}' does not exist")]
    AttributeDoesNotExist(String),

    /// A resource guard tripped: time budget, depth, power, shift, length.
    #[error("{0}")]
    LimitExceeded(String),

    /// Plain invalid expression.
    #[error("{0}")]
    Invalid(String),
}

impl InvalidExpression {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, span: None }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Syntax(message.into())).with_span(span)
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Eval(message.into()))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type(message.into()))
    }

    pub fn limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LimitExceeded(message.into()))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid(message.into()))
    }

    pub fn function_not_defined(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::FunctionNotDefined(name.into()))
    }

    pub fn name_not_defined(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameNotDefined(name.into()))
    }

    pub fn attribute_does_not_exist(attr: impl Into<String>) -> Self {
        Self::new(ErrorKind::AttributeDoesNotExist(attr.into()))
    }

    /// Attach a span unless one is already present.
    ///
    /// The innermost node that failed owns the span; outer nodes unwinding
    /// through the error leave it alone.
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self.kind, ErrorKind::Syntax(_))
    }

    pub fn is_limit(&self) -> bool {
        matches!(self.kind, ErrorKind::LimitExceeded(_))
    }

    /// Short label for the subtype, used in `except ... as e` bindings and
    /// rendered diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ErrorKind::Syntax(_) => "ExpressionSyntaxError",
            ErrorKind::Eval(_) | ErrorKind::Type(_) => "ExpressionEvalError",
            ErrorKind::FunctionNotDefined(_) => "FunctionNotDefined",
            ErrorKind::NameNotDefined(_) => "NameNotDefined",
            ErrorKind::AttributeDoesNotExist(_) => "AttributeDoesNotExist",
            ErrorKind::LimitExceeded(_) | ErrorKind::Invalid(_) => "InvalidExpression",
        }
    }
}

impl fmt::Display for InvalidExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(span) = &self.span {
            write!(f, " at {}..{}", span.0.start, span.0.end)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidExpression {}

impl From<ErrorKind> for InvalidExpression {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

pub type Result<T, E = InvalidExpression> = core::result::Result<T, E>;
