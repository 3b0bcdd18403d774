mod lexer;
pub mod parser;
mod syntax;
pub mod tree;

pub use parser::{DEFAULT_MAX_NESTING, parse, parse_with_max_depth};
pub use syntax::{BinaryOp, BoolOp, ComparisonOp, Span, UnaryOp};
pub use tree::{ExceptHandler, Expr, ExprKind, FunctionDef, Literal, Param, Stmt, StmtKind, SyntaxTree};

#[cfg(test)]
mod parse_test;

#[cfg(test)]
mod precedence_test;
