//! Core evaluation logic.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::api::{Context, ExecutionOptions, Limits, Registry};
use crate::errors::{InvalidExpression, Result};
use crate::parser::{
    BinaryOp, BoolOp, ComparisonOp, ExceptHandler, Expr, ExprKind, FunctionDef, Literal, Stmt,
    StmtKind, SyntaxTree, UnaryOp,
};
use crate::projection::{self, ProjectionCache};
use crate::values::{Dict, UserFunction, Value, ValueSet};

use super::{attribute, operators};

/// How a statement finished.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal(Value),
    Break,
    Return(Value),
}

/// Evaluator for parsed scripts.
///
/// One evaluator owns one variable table, one context bag and one
/// projection cache. It may run several trees in sequence; each
/// [`run`](Evaluator::run) restarts the clock but keeps the table, so
/// later scripts see names assigned by earlier ones until
/// [`reset_names`](Evaluator::reset_names) is called.
pub struct Evaluator {
    registry: Arc<Registry>,
    options: ExecutionOptions,
    /// Names supplied by the caller, in the order given.
    globals: Vec<(String, Value)>,
    pub(super) names: HashMap<String, Value>,
    context: Context,
    projection: ProjectionCache,
    started: Instant,
    depth: usize,
}

impl Evaluator {
    pub fn new(
        registry: Arc<Registry>,
        names: &[(&str, Value)],
        context: Context,
        options: ExecutionOptions,
    ) -> Self {
        let globals = names
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let mut evaluator = Self {
            registry,
            options,
            globals,
            names: HashMap::new(),
            context,
            projection: ProjectionCache::default(),
            started: Instant::now(),
            depth: 0,
        };
        evaluator.reset_names();
        evaluator
    }

    /// Re-seed the variable table with the built-ins and the caller's names,
    /// discarding everything scripts assigned.
    pub fn reset_names(&mut self) {
        let mut names = HashMap::with_capacity(self.registry.functions().count() + self.globals.len());
        for (name, builtin) in self.registry.functions() {
            names.insert(name.to_string(), Value::Builtin(builtin.clone()));
        }
        for (name, value) in &self.globals {
            names.insert(name.clone(), value.clone());
        }
        self.names = names;
    }

    /// Evaluate a whole script.
    ///
    /// The result is the value of the last top-level statement, or the value
    /// carried by a top-level `return`.
    pub fn run(&mut self, tree: &SyntaxTree) -> Result<Value> {
        self.started = Instant::now();
        self.depth = 0;
        debug!(statements = tree.body.len(), "Evaluating script");

        let result = match self.exec_block(&tree.body) {
            Ok(Flow::Normal(value) | Flow::Return(value)) => Ok(value),
            Ok(Flow::Break) => Ok(Value::None),
            Err(err) => Err(err),
        };

        debug!(
            ok = result.is_ok(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Evaluation finished"
        );
        result
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn limits(&self) -> &Limits {
        &self.options.limits
    }

    /// The current variable table.
    pub fn names(&self) -> &HashMap<String, Value> {
        &self.names
    }

    pub fn name(&self, name: &str) -> Option<&Value> {
        self.names.get(name)
    }

    /// The names the caller supplied, before any script ran.
    pub fn globals(&self) -> &[(String, Value)] {
        &self.globals
    }

    /// Today's date, honouring a fixed or injected clock.
    pub fn today(&self) -> NaiveDate {
        match &self.options.now {
            Some(now) => now.today(),
            None => chrono::Local::now().date_naive(),
        }
    }

    /// Fail once the wall-clock budget is spent.
    ///
    /// Called before every node, and by built-ins that loop a
    /// script-controlled number of times.
    pub fn check_time(&self) -> Result<()> {
        if !self.options.check_time {
            return Ok(());
        }
        let elapsed = self.started.elapsed();
        if elapsed >= self.options.max_time {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                max_time_ms = self.options.max_time.as_millis() as u64,
                "Evaluation aborted by time limit"
            );
            return Err(InvalidExpression::limit(format!(
                "Execution exceeded time limit of {} seconds",
                self.options.max_time.as_secs_f64()
            )));
        }
        Ok(())
    }

    /// Project a value that is about to be handed to the script.
    pub fn project(&mut self, value: Value) -> Result<Value> {
        projection::project(
            value,
            self.registry.projectors(),
            &self.context,
            &mut self.projection,
        )
    }

    fn enter(&mut self) -> Result<()> {
        self.check_time()?;
        if self.depth >= self.options.max_depth {
            warn!(max_depth = self.options.max_depth, "Evaluation aborted by depth limit");
            return Err(InvalidExpression::limit(format!(
                "Maximum evaluation depth of {} exceeded",
                self.options.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(super) fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        let mut last = Value::None;
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal(value) => last = value,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.enter().map_err(|e| e.with_span(stmt.span.clone()))?;
        let result = self.exec_stmt_inner(stmt);
        self.depth -= 1;
        result.map_err(|e| e.with_span(stmt.span.clone()))
    }

    // Every node kind is evaluated in its own non-inlined helper so that the
    // frames on the recursive path stay small and `max_depth` is reached
    // well before the native stack runs out.
    fn exec_stmt_inner(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Expr(expr) => Ok(Flow::Normal(self.eval_expr(expr)?)),
            StmtKind::Assign { targets, value } => self.exec_assign(targets, value),
            StmtKind::If { test, body, orelse } => self.exec_if(test, body, orelse),
            StmtKind::For { target, iter, body } => self.exec_for(target, iter, body),
            StmtKind::While { test, body } => self.exec_while(test, body),
            StmtKind::FunctionDef(def) => self.exec_def(def),
            StmtKind::Return(value) => self.exec_return(value.as_ref()),
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Pass => Ok(Flow::Normal(Value::None)),
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => self.exec_try(body, handlers, orelse, finalbody),
        }
    }

    #[inline(never)]
    fn exec_assign(&mut self, targets: &[Expr], value: &Expr) -> Result<Flow> {
        if !self.options.allow_assign {
            return Err(InvalidExpression::invalid("Assignment is not allowed"));
        }
        let value = self.eval_expr(value)?;
        for target in targets {
            self.assign(target, value.clone())?;
        }
        Ok(Flow::Normal(value))
    }

    #[inline(never)]
    fn exec_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<Flow> {
        if self.eval_expr(test)?.is_truthy() {
            self.exec_block(body)
        } else {
            self.exec_block(orelse)
        }
    }

    #[inline(never)]
    fn exec_for(&mut self, target: &Expr, iter: &Expr, body: &[Stmt]) -> Result<Flow> {
        let items = self.eval_expr(iter)?.iterate()?;
        let mut last = Value::None;
        for item in items {
            let item = self.project(item)?;
            self.assign(target, item)?;
            match self.exec_block(body)? {
                Flow::Normal(value) => last = value,
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    #[inline(never)]
    fn exec_while(&mut self, test: &Expr, body: &[Stmt]) -> Result<Flow> {
        let mut last = Value::None;
        while self.eval_expr(test)?.is_truthy() {
            match self.exec_block(body)? {
                Flow::Normal(value) => last = value,
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_def(&mut self, def: &Rc<FunctionDef>) -> Result<Flow> {
        let function = UserFunction { def: def.clone() };
        self.names
            .insert(def.name.clone(), Value::Function(function.into()));
        Ok(Flow::Normal(Value::None))
    }

    #[inline(never)]
    fn exec_return(&mut self, value: Option<&Expr>) -> Result<Flow> {
        let value = match value {
            Some(expr) => self.eval_expr(expr)?,
            None => Value::None,
        };
        Ok(Flow::Return(value))
    }

    #[inline(never)]
    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
    ) -> Result<Flow> {
        let mut result = match self.exec_block(body) {
            Ok(Flow::Normal(value)) if orelse.is_empty() => Ok(Flow::Normal(value)),
            Ok(Flow::Normal(_)) => self.exec_block(orelse),
            Ok(flow) => Ok(flow),
            // Only the first handler is consulted, whatever its type.
            Err(err) => match handlers.first() {
                Some(handler) => {
                    if let Some(name) = &handler.name {
                        self.names.insert(name.clone(), Value::from(err.message()));
                    }
                    self.exec_block(&handler.body)
                }
                None => Err(err),
            },
        };
        if !finalbody.is_empty() {
            match self.exec_block(finalbody)? {
                // A finally block that completes normally replaces a
                // normal result but lets errors and jumps through.
                Flow::Normal(value) => {
                    if let Ok(Flow::Normal(_)) = result {
                        result = Ok(Flow::Normal(value));
                    }
                }
                flow => result = Ok(flow),
            }
        }
        result
    }

    /// Evaluate an expression node.
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        self.enter().map_err(|e| e.with_span(expr.span.clone()))?;
        let result = self.eval_expr_inner(expr);
        self.depth -= 1;
        result.map_err(|e| e.with_span(expr.span.clone()))
    }

    fn eval_expr_inner(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(literal) => self.literal(literal),
            ExprKind::Name(name) => self.eval_name(name),
            ExprKind::List(items) => self.eval_list(items),
            ExprKind::Tuple(items) => self.eval_tuple(items),
            ExprKind::Set(items) => self.eval_set(items),
            ExprKind::Dict(pairs) => self.eval_dict(pairs),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),
            ExprKind::Boolean { op, values } => self.eval_boolean(*op, values),
            ExprKind::Comparison { left, comparators } => {
                self.eval_comparison(left, comparators)
            }
            ExprKind::IfExp { test, body, orelse } => self.eval_if_exp(test, body, orelse),
            ExprKind::Call {
                func,
                args,
                keywords,
            } => self.eval_call(func, args, keywords),
            ExprKind::Subscript { value, index } => self.eval_subscript(value, index),
            ExprKind::Slice { .. } => Err(InvalidExpression::invalid(
                "Slices are only allowed inside brackets",
            )),
            ExprKind::Attribute { value, attr } => self.eval_attribute(value, attr),
        }
    }

    #[inline(never)]
    fn eval_name(&mut self, name: &str) -> Result<Value> {
        let value = self
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| InvalidExpression::name_not_defined(name))?;
        self.project(value)
    }

    #[inline(never)]
    fn eval_list(&mut self, items: &[Expr]) -> Result<Value> {
        Ok(Value::list(self.elements(items)?))
    }

    #[inline(never)]
    fn eval_tuple(&mut self, items: &[Expr]) -> Result<Value> {
        Ok(Value::tuple(self.elements(items)?))
    }

    #[inline(never)]
    fn eval_set(&mut self, items: &[Expr]) -> Result<Value> {
        let max_len = self.options.limits.max_len;
        let mut set = ValueSet::new();
        for item in items {
            if set.len() >= max_len {
                return Err(too_many_elements(max_len));
            }
            let value = self.eval_expr(item)?;
            set.insert(value).map_err(|e| e.with_span(item.span.clone()))?;
        }
        Ok(Value::set(set))
    }

    #[inline(never)]
    fn eval_dict(&mut self, pairs: &[(Expr, Expr)]) -> Result<Value> {
        let max_len = self.options.limits.max_len;
        let mut dict = Dict::new();
        for (key, value) in pairs {
            if dict.len() >= max_len {
                return Err(too_many_elements(max_len));
            }
            let k = self.eval_expr(key)?;
            let v = self.eval_expr(value)?;
            dict.insert(k, v).map_err(|e| e.with_span(key.span.clone()))?;
        }
        Ok(Value::dict(dict))
    }

    #[inline(never)]
    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        let left = self.eval_expr(left)?;
        let right = self.eval_expr(right)?;
        operators::binary(op, &left, &right, &self.options.limits)
    }

    #[inline(never)]
    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Value> {
        let operand = self.eval_expr(operand)?;
        operators::unary(op, &operand)
    }

    #[inline(never)]
    fn eval_boolean(&mut self, op: BoolOp, values: &[Expr]) -> Result<Value> {
        let mut last = Value::None;
        for value in values {
            last = self.eval_expr(value)?;
            let settled = match op {
                BoolOp::And => !last.is_truthy(),
                BoolOp::Or => last.is_truthy(),
            };
            if settled {
                break;
            }
        }
        Ok(last)
    }

    #[inline(never)]
    fn eval_comparison(
        &mut self,
        left: &Expr,
        comparators: &[(ComparisonOp, Expr)],
    ) -> Result<Value> {
        let left = self.eval_expr(left)?;
        // Only the leftmost pair of a chain is evaluated.
        let Some((op, right)) = comparators.first() else {
            return Ok(left);
        };
        let right = self.eval_expr(right)?;
        operators::compare(*op, &left, &right).map(Value::Bool)
    }

    #[inline(never)]
    fn eval_if_exp(&mut self, test: &Expr, body: &Expr, orelse: &Expr) -> Result<Value> {
        if self.eval_expr(test)?.is_truthy() {
            self.eval_expr(body)
        } else {
            self.eval_expr(orelse)
        }
    }

    #[inline(never)]
    fn eval_subscript(&mut self, value: &Expr, index: &Expr) -> Result<Value> {
        let container = self.eval_expr(value)?;
        let found = match &index.kind {
            ExprKind::Slice { lower, upper, step } => {
                let lower = self.eval_optional(lower.as_deref())?;
                let upper = self.eval_optional(upper.as_deref())?;
                let step = self.eval_optional(step.as_deref())?;
                attribute::slice(&container, lower, upper, step)
            }
            _ => {
                let key = self.eval_expr(index)?;
                attribute::index(&container, &key)
            }
        };
        match found {
            Ok(Some(value)) => self.project(value),
            // Misses and type mismatches read as None.
            Ok(None) => Ok(Value::None),
            Err(err) if attribute::is_soft(&err) => Ok(Value::None),
            Err(err) => Err(err),
        }
    }

    #[inline(never)]
    fn eval_attribute(&mut self, value: &Expr, attr: &str) -> Result<Value> {
        let value = self.eval_expr(value)?;
        let found = attribute::get(&value, attr)?;
        self.project(found)
    }

    fn literal(&self, literal: &Literal) -> Result<Value> {
        Ok(match literal {
            Literal::None => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => {
                let max = self.options.limits.max_str_len;
                let len = s.chars().count();
                if len > max {
                    return Err(InvalidExpression::limit(format!(
                        "String length {len} exceeds maximum of {max} characters"
                    )));
                }
                Value::str(s)
            }
        })
    }

    /// Evaluate collection elements left to right, failing as soon as the
    /// collection would grow past the limit.
    fn elements(&mut self, items: &[Expr]) -> Result<Vec<Value>> {
        let max_len = self.options.limits.max_len;
        let mut values = Vec::with_capacity(items.len().min(max_len));
        for item in items {
            if values.len() >= max_len {
                return Err(too_many_elements(max_len));
            }
            values.push(self.eval_expr(item)?);
        }
        Ok(values)
    }

    fn eval_optional(&mut self, expr: Option<&Expr>) -> Result<Option<Value>> {
        expr.map(|e| self.eval_expr(e)).transpose()
    }

    /// Bind `value` to an assignment or loop target.
    fn assign(&mut self, target: &Expr, value: Value) -> Result<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.names.insert(name.clone(), value);
                Ok(())
            }
            ExprKind::Subscript { value: container, index } => {
                if matches!(index.kind, ExprKind::Slice { .. }) {
                    return Err(InvalidExpression::syntax(
                        "Slice assignment is not supported",
                        target.span.clone(),
                    ));
                }
                let container = self.eval_expr(container)?;
                let key = self.eval_expr(index)?;
                attribute::set_item(&container, key, value)
                    .map_err(|e| e.with_span(target.span.clone()))
            }
            ExprKind::Attribute { value: container, attr } => {
                let container = self.eval_expr(container)?;
                match &container {
                    Value::Dict(dict) => {
                        dict.borrow_mut().insert_str(attr, value);
                        Ok(())
                    }
                    other => Err(InvalidExpression::syntax(
                        format!("Cannot assign attribute '{attr}' on '{}'", other.type_name()),
                        target.span.clone(),
                    )),
                }
            }
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                let values = value.iterate()?;
                if values.len() != targets.len() {
                    return Err(InvalidExpression::eval(format!(
                        "cannot unpack {} values into {} targets",
                        values.len(),
                        targets.len()
                    ))
                    .with_span(target.span.clone()));
                }
                for (target, value) in targets.iter().zip(values) {
                    self.assign(target, value)?;
                }
                Ok(())
            }
            _ => Err(InvalidExpression::syntax(
                "Invalid assignment target",
                target.span.clone(),
            )),
        }
    }
}

fn too_many_elements(max_len: usize) -> InvalidExpression {
    InvalidExpression::limit(format!("Collection exceeds maximum of {max_len} elements"))
}
