//! Callable values: native built-ins, user-defined functions and bound
//! list methods.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::{InvalidExpression, Result};
use crate::evaluator::Evaluator;
use crate::parser::FunctionDef;
use crate::values::{Items, Value};

/// Arguments passed to a built-in, evaluated left to right.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    pub fn positional(positional: Vec<Value>) -> Self {
        Self::new(positional, Vec::new())
    }

    /// Match arguments against a parameter list, Python style.
    ///
    /// Positional arguments fill parameters in order, then keywords fill
    /// slots by name. Unfilled slots are `None`.
    ///
    /// ```ignore
    /// let [text, sep] = args.bind("split", ["text", "sep"])?;
    /// ```
    pub fn bind<const N: usize>(
        self,
        function: &str,
        params: [&str; N],
    ) -> Result<[Option<Value>; N]> {
        if self.positional.len() > N {
            return Err(InvalidExpression::type_error(format!(
                "{function}() takes at most {N} arguments ({} given)",
                self.positional.len()
            )));
        }
        let mut slots: [Option<Value>; N] = core::array::from_fn(|_| None);
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        for (name, value) in self.keywords {
            let Some(i) = params.iter().position(|p| *p == name) else {
                return Err(InvalidExpression::type_error(format!(
                    "{function}() got an unexpected keyword argument '{name}'"
                )));
            };
            if slots[i].is_some() {
                return Err(InvalidExpression::type_error(format!(
                    "{function}() got multiple values for argument '{name}'"
                )));
            }
            slots[i] = Some(value);
        }
        Ok(slots)
    }
}

type PlainFn = dyn Fn(Args) -> Result<Value> + Send + Sync;
type ContextFn = dyn Fn(&mut Evaluator, Args) -> Result<Value> + Send + Sync;

enum Native {
    Plain(Box<PlainFn>),
    WithContext(Box<ContextFn>),
}

/// A native function callable from scripts.
///
/// Built-ins created with [`Builtin::with_context`] receive the running
/// [`Evaluator`] as their first argument, which gives them the context bag,
/// the variable table, the clock and the time budget.
pub struct Builtin {
    name: String,
    native: Native,
}

impl Builtin {
    pub fn new(f: impl Fn(Args) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            name: String::new(),
            native: Native::Plain(Box::new(f)),
        }
    }

    pub fn with_context(
        f: impl Fn(&mut Evaluator, Args) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: String::new(),
            native: Native::WithContext(Box::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn wants_context(&self) -> bool {
        matches!(self.native, Native::WithContext(_))
    }

    pub fn call(&self, evaluator: &mut Evaluator, args: Args) -> Result<Value> {
        match &self.native {
            Native::Plain(f) => f(args),
            Native::WithContext(f) => f(evaluator, args),
        }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("wants_context", &self.wants_context())
            .finish()
    }
}

/// A function defined in a script with `def`.
#[derive(Debug)]
pub struct UserFunction {
    pub def: Rc<FunctionDef>,
}

impl UserFunction {
    pub fn name(&self) -> &str {
        &self.def.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMethod {
    Append,
    Pop,
    Remove,
}

impl ListMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "append" => Some(ListMethod::Append),
            "pop" => Some(ListMethod::Pop),
            "remove" => Some(ListMethod::Remove),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ListMethod::Append => "append",
            ListMethod::Pop => "pop",
            ListMethod::Remove => "remove",
        }
    }
}

/// `xs.append` and friends: a list method bound to its receiver.
pub struct BoundMethod {
    pub receiver: Rc<RefCell<Items>>,
    pub method: ListMethod,
}

impl BoundMethod {
    pub fn call(&self, args: Args) -> Result<Value> {
        match self.method {
            ListMethod::Append => {
                let [value] = args.bind("append", ["value"])?;
                let value = value.ok_or_else(|| missing("append", "value"))?;
                self.receiver.borrow_mut().push(value);
                Ok(Value::None)
            }
            ListMethod::Pop => {
                let [index] = args.bind("pop", ["index"])?;
                let mut items = self.receiver.borrow_mut();
                if items.is_empty() {
                    return Err(InvalidExpression::eval("pop from empty list"));
                }
                let len = items.len() as i64;
                let index = match index {
                    None => len - 1,
                    Some(v) => {
                        let i = v.as_int().ok_or_else(|| {
                            InvalidExpression::type_error(format!(
                                "'{}' object cannot be interpreted as an integer",
                                v.type_name()
                            ))
                        })?;
                        if i < 0 { i + len } else { i }
                    }
                };
                if !(0..len).contains(&index) {
                    return Err(InvalidExpression::eval("pop index out of range"));
                }
                Ok(items.remove(index as usize))
            }
            ListMethod::Remove => {
                let [value] = args.bind("remove", ["value"])?;
                let value = value.ok_or_else(|| missing("remove", "value"))?;
                // Equality may need to borrow the receiver itself.
                let mut position = None;
                for (i, item) in self.receiver.borrow().iter().enumerate() {
                    if item.try_eq(&value)? {
                        position = Some(i);
                        break;
                    }
                }
                let Some(i) = position else {
                    return Err(InvalidExpression::eval("list.remove(x): x not in list"));
                };
                self.receiver.borrow_mut().remove(i);
                Ok(Value::None)
            }
        }
    }
}

fn missing(function: &str, param: &str) -> InvalidExpression {
    InvalidExpression::type_error(format!(
        "{function}() missing required argument: '{param}'"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: Vec<Value>) -> Rc<RefCell<Items>> {
        Rc::new(RefCell::new(Items::from(items)))
    }

    #[test]
    fn test_bind_positional_then_keywords() {
        let args = Args::new(
            vec![Value::Int(1)],
            vec![("c".to_string(), Value::Int(3))],
        );
        let [a, b, c] = args.bind("f", ["a", "b", "c"]).unwrap();
        assert_eq!(a, Some(Value::Int(1)));
        assert_eq!(b, None);
        assert_eq!(c, Some(Value::Int(3)));
    }

    #[test]
    fn test_bind_errors() {
        let too_many = Args::positional(vec![Value::Int(1), Value::Int(2)]);
        assert!(too_many.bind("f", ["a"]).is_err());

        let unknown = Args::new(vec![], vec![("z".to_string(), Value::None)]);
        let err = unknown.bind("f", ["a"]).unwrap_err();
        assert_eq!(err.message(), "f() got an unexpected keyword argument 'z'");

        let twice = Args::new(vec![Value::Int(1)], vec![("a".to_string(), Value::Int(2))]);
        assert!(twice.bind("f", ["a"]).is_err());
    }

    #[test]
    fn test_list_methods() {
        let items = list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let pop = BoundMethod {
            receiver: items.clone(),
            method: ListMethod::Pop,
        };
        assert_eq!(pop.call(Args::default()).unwrap(), Value::Int(3));
        assert_eq!(
            pop.call(Args::positional(vec![Value::Int(0)])).unwrap(),
            Value::Int(1)
        );

        let append = BoundMethod {
            receiver: items.clone(),
            method: ListMethod::Append,
        };
        append.call(Args::positional(vec![Value::str("x")])).unwrap();

        let remove = BoundMethod {
            receiver: items.clone(),
            method: ListMethod::Remove,
        };
        remove.call(Args::positional(vec![Value::Int(2)])).unwrap();
        assert_eq!(**items.borrow(), vec![Value::str("x")]);
        assert!(remove.call(Args::positional(vec![Value::Int(2)])).is_err());
    }

    #[test]
    fn test_pop_empty() {
        let pop = BoundMethod {
            receiver: list(vec![]),
            method: ListMethod::Pop,
        };
        assert_eq!(pop.call(Args::default()).unwrap_err().message(), "pop from empty list");
    }
}
