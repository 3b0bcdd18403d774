//! Recursive-descent parser for formula scripts.
//!
//! Precedence, lowest to highest:
//!
//! ```text
//! a if c else b
//! or
//! and
//! not
//! == != < <= > >= is in       (comparison)
//! |
//! ^
//! &
//! << >>
//! + -
//! * / // %
//! unary + - ~
//! **                          (right-assoc)
//! call, subscript, attribute  (postfix)
//! ```

use std::rc::Rc;

use tracing::debug;

use crate::errors::{InvalidExpression, Result};
use crate::parser::lexer::{RawToken, Token, TokenKind, tokenize};
use crate::parser::tree::{
    ExceptHandler, Expr, ExprKind, FunctionDef, Literal, Param, Stmt, StmtKind, SyntaxTree,
};
use crate::parser::{BinaryOp, BoolOp, ComparisonOp, Span, UnaryOp};

/// Default maximum nesting depth for expressions and blocks.
pub const DEFAULT_MAX_NESTING: usize = 100;

/// Parse a script with the default nesting limit.
pub fn parse(source: &str) -> Result<SyntaxTree> {
    parse_with_max_depth(source, DEFAULT_MAX_NESTING)
}

/// Parse a script, failing with a syntax error once expressions or blocks
/// nest deeper than `max_depth`.
pub fn parse_with_max_depth(source: &str, max_depth: usize) -> Result<SyntaxTree> {
    if source.trim().is_empty() {
        return Err(InvalidExpression::invalid("Empty expression"));
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
        loop_depth: 0,
    };
    let body = parser.parse_file()?;
    debug!(statements = body.len(), "Parsed script");
    Ok(SyntaxTree {
        source: source.to_string(),
        body,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
    /// Loops enclosing the current statement inside the current function.
    loop_depth: usize,
}

impl Parser {
    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span.clone()
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span.clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, raw: &RawToken) -> bool {
        matches!(self.peek(), TokenKind::Raw(r) if r == raw)
    }

    fn eat(&mut self, raw: &RawToken) -> bool {
        if self.check(raw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, raw: &RawToken, what: &str) -> Result<Span> {
        if self.check(raw) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String> {
        match self.peek().clone() {
            TokenKind::Raw(RawToken::Name(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> InvalidExpression {
        let found = match self.peek() {
            TokenKind::Raw(raw) => describe(raw),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "unexpected indent".to_string(),
            TokenKind::Dedent => "unexpected dedent".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        };
        InvalidExpression::syntax(format!("Expected {expected}, found {found}"), self.span())
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.deepen()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run `f`, which may [`deepen`](Self::deepen) once per node it folds
    /// in a loop, and restore the depth afterwards.
    fn chain<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.depth;
        let result = f(self);
        self.depth = saved;
        result
    }

    /// Count one level of nesting. Left-associative chains (`a + b + c`,
    /// `a.b.c`) deepen the tree without recursing, so they count here too.
    fn deepen(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(InvalidExpression::syntax(
                format!(
                    "Nesting depth exceeds maximum of {} levels",
                    self.max_depth
                ),
                self.span(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_file(&mut self) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.advance();
                }
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    /// One logical line or one compound statement. Simple statements joined
    /// by `;` yield several statements.
    fn parse_statement(&mut self) -> Result<Vec<Stmt>> {
        self.nested(|p| match p.peek() {
            TokenKind::Raw(RawToken::If) => Ok(vec![p.parse_if()?]),
            TokenKind::Raw(RawToken::While) => Ok(vec![p.parse_while()?]),
            TokenKind::Raw(RawToken::For) => Ok(vec![p.parse_for()?]),
            TokenKind::Raw(RawToken::Def) => Ok(vec![p.parse_def()?]),
            TokenKind::Raw(RawToken::Try) => Ok(vec![p.parse_try()?]),
            _ => p.parse_simple_statements(),
        })
    }

    fn parse_simple_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.eat(&RawToken::Semicolon) {
            if matches!(self.peek(), TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        match self.peek() {
            TokenKind::Newline => {
                self.advance();
            }
            TokenKind::Eof | TokenKind::Dedent => {}
            _ => return Err(self.unexpected("end of statement")),
        }
        Ok(stmts)
    }

    fn parse_small_statement(&mut self) -> Result<Stmt> {
        let start = self.span();
        match self.peek() {
            TokenKind::Raw(RawToken::Pass) => {
                self.advance();
                Ok(Stmt::new(StmtKind::Pass, start))
            }
            TokenKind::Raw(RawToken::Break) => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(InvalidExpression::syntax("'break' outside loop", start));
                }
                Ok(Stmt::new(StmtKind::Break, start))
            }
            TokenKind::Raw(RawToken::Return) => {
                self.advance();
                let value = if matches!(
                    self.peek(),
                    TokenKind::Newline | TokenKind::Eof | TokenKind::Raw(RawToken::Semicolon)
                ) {
                    None
                } else {
                    Some(self.parse_testlist()?)
                };
                let span = Span::combine(&start, &self.prev_span());
                Ok(Stmt::new(StmtKind::Return(value), span))
            }
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_expr_statement(&mut self) -> Result<Stmt> {
        let start = self.span();
        let first = self.parse_testlist()?;
        if !self.check(&RawToken::Assign) {
            let span = first.span.clone();
            return Ok(Stmt::new(StmtKind::Expr(first), span));
        }

        // In `a = b = value` every expression but the last is a target.
        let mut targets = Vec::new();
        let mut value = first;
        while self.eat(&RawToken::Assign) {
            let next = self.parse_testlist()?;
            targets.push(std::mem::replace(&mut value, next));
        }
        for target in &targets {
            check_assign_target(target)?;
        }
        let span = Span::combine(&start, &value.span);
        Ok(Stmt::new(
            StmtKind::Assign {
                targets,
                value,
            },
            span,
        ))
    }

    /// Either an indented block or simple statements on the same line.
    fn parse_suite(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&RawToken::Colon, "':'")?;
        if !matches!(self.peek(), TokenKind::Newline) {
            return self.parse_simple_statements();
        }
        self.advance();
        if !matches!(self.peek(), TokenKind::Indent) {
            return Err(self.unexpected("an indented block"));
        }
        self.advance();
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.advance();
                }
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        // Consumes `if` or `elif`.
        let start = self.advance().span;
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = match self.peek() {
            TokenKind::Raw(RawToken::Elif) => vec![self.nested(Self::parse_if)?],
            TokenKind::Raw(RawToken::Else) => {
                self.advance();
                self.parse_suite()?
            }
            _ => Vec::new(),
        };
        let span = Span::combine(&start, &self.prev_span());
        Ok(Stmt::new(StmtKind::If { test, body, orelse }, span))
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let test = self.parse_test()?;
        self.loop_depth += 1;
        let body = self.parse_suite();
        self.loop_depth -= 1;
        let body = body?;
        let span = Span::combine(&start, &self.prev_span());
        Ok(Stmt::new(StmtKind::While { test, body }, span))
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let target = self.parse_for_target()?;
        self.expect(&RawToken::In, "'in'")?;
        let iter = self.parse_testlist()?;
        self.loop_depth += 1;
        let body = self.parse_suite();
        self.loop_depth -= 1;
        let body = body?;
        let span = Span::combine(&start, &self.prev_span());
        Ok(Stmt::new(StmtKind::For { target, iter, body }, span))
    }

    /// `name` or `a, b, ...`; only names are accepted as loop targets.
    fn parse_for_target(&mut self) -> Result<Expr> {
        let start = self.span();
        let mut names = Vec::new();
        let mut trailing_comma;
        loop {
            let span = self.span();
            let name = self.expect_name("loop variable")?;
            names.push(Expr::new(ExprKind::Name(name), span));
            trailing_comma = self.eat(&RawToken::Comma);
            if !trailing_comma || self.check(&RawToken::In) {
                break;
            }
        }
        if names.len() == 1 && !trailing_comma {
            return Ok(names.remove(0));
        }
        let span = Span::combine(&start, &self.prev_span());
        Ok(Expr::new(ExprKind::Tuple(names), span))
    }

    fn parse_def(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let name = self.expect_name("function name")?;
        self.expect(&RawToken::LParen, "'('")?;
        let mut params: Vec<Param> = Vec::new();
        while !self.check(&RawToken::RParen) {
            let param_span = self.span();
            let param = self.expect_name("parameter name")?;
            if params.iter().any(|p| p.name == param) {
                return Err(InvalidExpression::syntax(
                    format!("Duplicate argument '{param}' in function definition"),
                    param_span,
                ));
            }
            let default = if self.eat(&RawToken::Assign) {
                Some(self.parse_test()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(InvalidExpression::syntax(
                        "Non-default argument follows default argument",
                        param_span,
                    ));
                }
                None
            };
            params.push(Param {
                name: param,
                default,
            });
            if !self.eat(&RawToken::Comma) {
                break;
            }
        }
        self.expect(&RawToken::RParen, "')'")?;

        // `break` inside a function body never targets an enclosing loop.
        let saved_loops = core::mem::replace(&mut self.loop_depth, 0);
        let body = self.parse_suite();
        self.loop_depth = saved_loops;
        let body = body?;

        let span = Span::combine(&start, &self.prev_span());
        let def = FunctionDef {
            name,
            params,
            body,
            span: span.clone(),
        };
        Ok(Stmt::new(StmtKind::FunctionDef(Rc::new(def)), span))
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let body = self.parse_suite()?;

        let mut handlers = Vec::new();
        while self.check(&RawToken::Except) {
            self.advance();
            let mut kind = None;
            let mut name = None;
            if !self.check(&RawToken::Colon) {
                kind = Some(self.parse_test()?);
                if self.eat(&RawToken::As) {
                    name = Some(self.expect_name("exception variable name")?);
                }
            }
            let body = self.parse_suite()?;
            handlers.push(ExceptHandler { kind, name, body });
        }

        let mut orelse = Vec::new();
        if self.check(&RawToken::Else) {
            if handlers.is_empty() {
                return Err(self.unexpected("'except' or 'finally'"));
            }
            self.advance();
            orelse = self.parse_suite()?;
        }

        let mut finalbody = Vec::new();
        if self.eat(&RawToken::Finally) {
            finalbody = self.parse_suite()?;
        } else if handlers.is_empty() {
            return Err(self.unexpected("'except' or 'finally'"));
        }

        let span = Span::combine(&start, &self.prev_span());
        Ok(Stmt::new(
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            span,
        ))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// `test (',' test)* [',']`, producing a tuple when a comma is present.
    fn parse_testlist(&mut self) -> Result<Expr> {
        let first = self.parse_test()?;
        if !self.check(&RawToken::Comma) {
            return Ok(first);
        }
        let start = first.span.clone();
        let mut items = vec![first];
        while self.eat(&RawToken::Comma) {
            if !self.starts_expression() {
                break;
            }
            items.push(self.parse_test()?);
        }
        let span = Span::combine(&start, &self.prev_span());
        Ok(Expr::new(ExprKind::Tuple(items), span))
    }

    fn starts_expression(&self) -> bool {
        match self.peek() {
            TokenKind::Raw(raw) => matches!(
                raw,
                RawToken::Name(_)
                    | RawToken::Int(_)
                    | RawToken::Float(_)
                    | RawToken::Str(_)
                    | RawToken::True
                    | RawToken::False
                    | RawToken::None
                    | RawToken::LParen
                    | RawToken::LBracket
                    | RawToken::LBrace
                    | RawToken::Minus
                    | RawToken::Plus
                    | RawToken::Tilde
                    | RawToken::Not
            ),
            _ => false,
        }
    }

    fn parse_test(&mut self) -> Result<Expr> {
        self.nested(|p| {
            let body = p.parse_or()?;
            if !p.check(&RawToken::If) {
                return Ok(body);
            }
            p.advance();
            let test = p.parse_or()?;
            p.expect(&RawToken::Else, "'else' in conditional expression")?;
            let orelse = p.parse_test()?;
            let span = Span::combine(&body.span, &orelse.span);
            Ok(Expr::new(
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
                span,
            ))
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        self.parse_bool_chain(BoolOp::Or)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        self.parse_bool_chain(BoolOp::And)
    }

    fn parse_bool_chain(&mut self, op: BoolOp) -> Result<Expr> {
        let (token, next): (RawToken, fn(&mut Self) -> Result<Expr>) = match op {
            BoolOp::Or => (RawToken::Or, Self::parse_and),
            BoolOp::And => (RawToken::And, Self::parse_not),
        };
        let first = next(self)?;
        if !self.check(&token) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&token) {
            values.push(next(self)?);
        }
        let span = Span::combine(&values[0].span, &values[values.len() - 1].span);
        Ok(Expr::new(ExprKind::Boolean { op, values }, span))
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.check(&RawToken::Not) {
            let start = self.advance().span;
            let operand = self.nested(Self::parse_not)?;
            let span = Span::combine(&start, &operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<ComparisonOp> {
        let op = match self.peek() {
            TokenKind::Raw(RawToken::EqEq) => ComparisonOp::Eq,
            TokenKind::Raw(RawToken::NotEq) => ComparisonOp::Neq,
            TokenKind::Raw(RawToken::Lt) => ComparisonOp::Lt,
            TokenKind::Raw(RawToken::Le) => ComparisonOp::Le,
            TokenKind::Raw(RawToken::Gt) => ComparisonOp::Gt,
            TokenKind::Raw(RawToken::Ge) => ComparisonOp::Ge,
            TokenKind::Raw(RawToken::In) => ComparisonOp::In,
            TokenKind::Raw(RawToken::Is) => {
                if matches!(self.peek_at(1), TokenKind::Raw(RawToken::Not)) {
                    self.advance();
                    ComparisonOp::IsNot
                } else {
                    ComparisonOp::Is
                }
            }
            TokenKind::Raw(RawToken::Not)
                if matches!(self.peek_at(1), TokenKind::Raw(RawToken::In)) =>
            {
                self.advance();
                ComparisonOp::NotIn
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_bitor()?;
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_op() {
            comparators.push((op, self.parse_bitor()?));
        }
        if comparators.is_empty() {
            return Ok(left);
        }
        let span = Span::combine(&left.span, &self.prev_span());
        Ok(Expr::new(
            ExprKind::Comparison {
                left: Box::new(left),
                comparators,
            },
            span,
        ))
    }

    /// Left-associative binary level: `next (op next)*`.
    fn parse_binary_level(
        &mut self,
        ops: &[(RawToken, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        self.chain(|p| {
            let mut left = next(p)?;
            'outer: loop {
                for (token, op) in ops {
                    if p.eat(token) {
                        p.deepen()?;
                        let right = next(p)?;
                        let span = Span::combine(&left.span, &right.span);
                        left = Expr::new(
                            ExprKind::Binary {
                                op: *op,
                                left: Box::new(left),
                                right: Box::new(right),
                            },
                            span,
                        );
                        continue 'outer;
                    }
                }
                return Ok(left);
            }
        })
    }

    fn parse_bitor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(RawToken::Pipe, BinaryOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(RawToken::Caret, BinaryOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(RawToken::Amp, BinaryOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (RawToken::LShift, BinaryOp::LShift),
                (RawToken::RShift, BinaryOp::RShift),
            ],
            Self::parse_arith,
        )
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[(RawToken::Plus, BinaryOp::Add), (RawToken::Minus, BinaryOp::Sub)],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (RawToken::Star, BinaryOp::Mul),
                (RawToken::Slash, BinaryOp::Div),
                (RawToken::DoubleSlash, BinaryOp::FloorDiv),
                (RawToken::Percent, BinaryOp::Mod),
            ],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            TokenKind::Raw(RawToken::Minus) => UnaryOp::Neg,
            TokenKind::Raw(RawToken::Plus) => UnaryOp::Pos,
            TokenKind::Raw(RawToken::Tilde) => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let start = self.advance().span;
        let operand = self.nested(Self::parse_factor)?;
        let span = Span::combine(&start, &operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if !self.eat(&RawToken::DoubleStar) {
            return Ok(base);
        }
        let exponent = self.nested(Self::parse_factor)?;
        let span = Span::combine(&base.span, &exponent.span);
        Ok(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        self.chain(|p| {
            let mut expr = p.parse_atom()?;
            loop {
                match p.peek() {
                    TokenKind::Raw(RawToken::LParen) => {
                        p.advance();
                        p.deepen()?;
                        let (args, keywords) = p.parse_arguments()?;
                        let end = p.expect(&RawToken::RParen, "')'")?;
                        let span = Span::combine(&expr.span, &end);
                        expr = Expr::new(
                            ExprKind::Call {
                                func: Box::new(expr),
                                args,
                                keywords,
                            },
                            span,
                        );
                    }
                    TokenKind::Raw(RawToken::LBracket) => {
                        p.advance();
                        p.deepen()?;
                        let index = p.nested(Self::parse_subscript)?;
                        let end = p.expect(&RawToken::RBracket, "']'")?;
                        let span = Span::combine(&expr.span, &end);
                        expr = Expr::new(
                            ExprKind::Subscript {
                                value: Box::new(expr),
                                index: Box::new(index),
                            },
                            span,
                        );
                    }
                    TokenKind::Raw(RawToken::Dot) => {
                        p.advance();
                        p.deepen()?;
                        let attr = p.expect_name("attribute name")?;
                        let span = Span::combine(&expr.span, &p.prev_span());
                        expr = Expr::new(
                            ExprKind::Attribute {
                                value: Box::new(expr),
                                attr,
                            },
                            span,
                        );
                    }
                    _ => return Ok(expr),
                }
            }
        })
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<(String, Expr)> = Vec::new();
        while !self.check(&RawToken::RParen) {
            let is_keyword = matches!(self.peek(), TokenKind::Raw(RawToken::Name(_)))
                && matches!(self.peek_at(1), TokenKind::Raw(RawToken::Assign));
            if is_keyword {
                let span = self.span();
                let name = self.expect_name("keyword argument")?;
                self.advance();
                if keywords.iter().any(|(k, _)| *k == name) {
                    return Err(InvalidExpression::syntax(
                        format!("Keyword argument repeated: {name}"),
                        span,
                    ));
                }
                keywords.push((name, self.parse_test()?));
            } else {
                if !keywords.is_empty() {
                    return Err(InvalidExpression::syntax(
                        "Positional argument follows keyword argument",
                        self.span(),
                    ));
                }
                args.push(self.parse_test()?);
            }
            if !self.eat(&RawToken::Comma) {
                break;
            }
        }
        Ok((args, keywords))
    }

    /// A slice (`a:b:c`), a tuple of indices, or a single index.
    fn parse_subscript(&mut self) -> Result<Expr> {
        let start = self.span();
        let lower = if self.check(&RawToken::Colon) {
            None
        } else {
            let index = self.parse_testlist()?;
            if !self.check(&RawToken::Colon) {
                return Ok(index);
            }
            Some(Box::new(index))
        };
        self.expect(&RawToken::Colon, "':'")?;
        let upper = if self.check(&RawToken::Colon) || self.check(&RawToken::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat(&RawToken::Colon) && !self.check(&RawToken::RBracket) {
            Some(Box::new(self.parse_test()?))
        } else {
            None
        };
        let span = Span::combine(&start, &self.prev_span());
        Ok(Expr::new(ExprKind::Slice { lower, upper, step }, span))
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let span = self.span();
        let literal = match self.peek().clone() {
            TokenKind::Raw(RawToken::Int(v)) => Literal::Int(v),
            TokenKind::Raw(RawToken::Float(v)) => Literal::Float(v),
            TokenKind::Raw(RawToken::True) => Literal::Bool(true),
            TokenKind::Raw(RawToken::False) => Literal::Bool(false),
            TokenKind::Raw(RawToken::None) => Literal::None,
            TokenKind::Raw(RawToken::Str(mut s)) => {
                self.advance();
                // Adjacent string literals concatenate.
                let mut end = span.clone();
                while let TokenKind::Raw(RawToken::Str(next)) = self.peek().clone() {
                    s.push_str(&next);
                    end = self.advance().span;
                }
                return Ok(Expr::new(
                    ExprKind::Literal(Literal::Str(s)),
                    Span::combine(&span, &end),
                ));
            }
            TokenKind::Raw(RawToken::Name(name)) => {
                self.advance();
                return Ok(Expr::new(ExprKind::Name(name), span));
            }
            TokenKind::Raw(RawToken::LParen) => {
                self.advance();
                return self.nested(|p| p.parse_paren(span));
            }
            TokenKind::Raw(RawToken::LBracket) => {
                self.advance();
                return self.nested(|p| p.parse_list(span));
            }
            TokenKind::Raw(RawToken::LBrace) => {
                self.advance();
                return self.nested(|p| p.parse_brace(span));
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(Expr::new(ExprKind::Literal(literal), span))
    }

    fn parse_paren(&mut self, start: Span) -> Result<Expr> {
        if self.check(&RawToken::RParen) {
            let end = self.advance().span;
            return Ok(Expr::new(
                ExprKind::Tuple(Vec::new()),
                Span::combine(&start, &end),
            ));
        }
        let first = self.parse_test()?;
        if self.check(&RawToken::RParen) {
            self.advance();
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&RawToken::Comma) {
            if self.check(&RawToken::RParen) {
                break;
            }
            items.push(self.parse_test()?);
        }
        let end = self.expect(&RawToken::RParen, "')'")?;
        Ok(Expr::new(ExprKind::Tuple(items), Span::combine(&start, &end)))
    }

    fn parse_list(&mut self, start: Span) -> Result<Expr> {
        let mut items = Vec::new();
        while !self.check(&RawToken::RBracket) {
            items.push(self.parse_test()?);
            if !self.eat(&RawToken::Comma) {
                break;
            }
        }
        let end = self.expect(&RawToken::RBracket, "']'")?;
        Ok(Expr::new(ExprKind::List(items), Span::combine(&start, &end)))
    }

    /// `{}` and `{k: v, ...}` are dicts, `{a, b}` is a set.
    fn parse_brace(&mut self, start: Span) -> Result<Expr> {
        if self.check(&RawToken::RBrace) {
            let end = self.advance().span;
            return Ok(Expr::new(
                ExprKind::Dict(Vec::new()),
                Span::combine(&start, &end),
            ));
        }
        let first = self.parse_test()?;
        if self.eat(&RawToken::Colon) {
            let mut pairs = vec![(first, self.parse_test()?)];
            while self.eat(&RawToken::Comma) {
                if self.check(&RawToken::RBrace) {
                    break;
                }
                let key = self.parse_test()?;
                self.expect(&RawToken::Colon, "':'")?;
                pairs.push((key, self.parse_test()?));
            }
            let end = self.expect(&RawToken::RBrace, "'}'")?;
            return Ok(Expr::new(ExprKind::Dict(pairs), Span::combine(&start, &end)));
        }
        let mut items = vec![first];
        while self.eat(&RawToken::Comma) {
            if self.check(&RawToken::RBrace) {
                break;
            }
            items.push(self.parse_test()?);
        }
        let end = self.expect(&RawToken::RBrace, "'}'")?;
        Ok(Expr::new(ExprKind::Set(items), Span::combine(&start, &end)))
    }
}

fn check_assign_target(target: &Expr) -> Result<()> {
    match &target.kind {
        ExprKind::Name(_) | ExprKind::Subscript { .. } | ExprKind::Attribute { .. } => Ok(()),
        ExprKind::Literal(_) => Err(InvalidExpression::syntax(
            "Cannot assign to literal",
            target.span.clone(),
        )),
        _ => Err(InvalidExpression::syntax(
            "Unsupported assignment target",
            target.span.clone(),
        )),
    }
}

fn describe(raw: &RawToken) -> String {
    match raw {
        RawToken::Name(name) => format!("identifier '{name}'"),
        RawToken::Int(v) => format!("number {v}"),
        RawToken::Float(v) => format!("number {v}"),
        RawToken::Str(_) => "string literal".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}
