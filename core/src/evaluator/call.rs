//! Function calls: built-ins, user functions and bound list methods.

use std::rc::Rc;

use tracing::trace;

use crate::errors::{InvalidExpression, Result};
use crate::parser::{Expr, ExprKind};
use crate::values::{Args, UserFunction, Value};

use super::{Evaluator, Flow};

impl Evaluator {
    pub(super) fn eval_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        keywords: &[(String, Expr)],
    ) -> Result<Value> {
        // A bare name that is missing is a missing function, not a missing
        // variable.
        let callee = match &func.kind {
            ExprKind::Name(name) => match self.names.get(name) {
                Some(value) => value.clone(),
                None => return Err(InvalidExpression::function_not_defined(name)),
            },
            _ => self.eval_expr(func)?,
        };
        if !callee.is_callable() {
            return Err(InvalidExpression::function_not_defined(callee_name(func, &callee)));
        }

        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            positional.push(self.eval_expr(arg)?);
        }
        let mut named = Vec::with_capacity(keywords.len());
        for (name, arg) in keywords {
            named.push((name.clone(), self.eval_expr(arg)?));
        }
        self.call(&callee, Args::new(positional, named))
    }

    /// Call any callable value with already-evaluated arguments.
    pub fn call(&mut self, callee: &Value, args: Args) -> Result<Value> {
        match callee {
            Value::Builtin(builtin) => {
                trace!(
                    function = builtin.name(),
                    args = args.positional.len() + args.keywords.len(),
                    "Calling built-in"
                );
                builtin.call(self, args)
            }
            Value::Function(function) => self.call_user(function, args),
            Value::Method(method) => {
                trace!(method = method.method.name(), "Calling list method");
                method.call(args)
            }
            other => Err(InvalidExpression::function_not_defined(other.type_name())),
        }
    }

    fn call_user(&mut self, function: &Rc<UserFunction>, args: Args) -> Result<Value> {
        let def = function.def.clone();
        let fname = def.name.as_str();
        trace!(function = fname, "Calling user function");

        let params = &def.params;
        if args.positional.len() > params.len() {
            return Err(InvalidExpression::type_error(format!(
                "{fname}() takes {} positional arguments but {} were given",
                params.len(),
                args.positional.len()
            )));
        }
        let mut slots: Vec<Option<Value>> = vec![None; params.len()];
        for (slot, value) in slots.iter_mut().zip(args.positional) {
            *slot = Some(value);
        }
        for (name, value) in args.keywords {
            let Some(i) = params.iter().position(|p| p.name == name) else {
                return Err(InvalidExpression::type_error(format!(
                    "{fname}() got an unexpected keyword argument '{name}'"
                )));
            };
            if slots[i].is_some() {
                return Err(InvalidExpression::type_error(format!(
                    "{fname}() got multiple values for argument '{name}'"
                )));
            }
            slots[i] = Some(value);
        }

        // Defaults are evaluated now, against the caller's table.
        let mut bound = Vec::with_capacity(params.len());
        for (param, slot) in params.iter().zip(slots) {
            let value = match (slot, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval_expr(default)?,
                (None, None) => {
                    return Err(InvalidExpression::type_error(format!(
                        "{fname}() missing required argument: '{}'",
                        param.name
                    )));
                }
            };
            bound.push((param.name.clone(), value));
        }

        let mut scope = self.names.clone();
        scope.extend(bound);
        let caller = core::mem::replace(&mut self.names, scope);
        let result = self.exec_block(&def.body);
        self.names = caller;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(_) | Flow::Break => Ok(Value::None),
        }
    }
}

fn callee_name(func: &Expr, callee: &Value) -> String {
    match &func.kind {
        ExprKind::Name(name) => name.clone(),
        ExprKind::Attribute { attr, .. } => attr.clone(),
        _ => callee.type_name().to_string(),
    }
}
