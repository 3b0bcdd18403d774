//! The dynamic value model.
//!
//! Scalars are stored inline. Containers are reference counted so that
//! assigning a list to a second name aliases it, and in-place mutation
//! (`xs.append(1)`, `m['k'] = v`) is visible through every alias.

use core::cmp::Ordering;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::errors::{InvalidExpression, Result};
use crate::values::{
    BoundMethod, Builtin, CalendarDelta, Dict, DomainObject, Items, UserFunction, ValueSet,
};

/// How far equality, ordering, hashing and rendering descend into nested
/// containers. Comparisons past this depth fail with a limit error and
/// renderings abbreviate to `[...]`.
pub const MAX_VALUE_DEPTH: usize = 200;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Items>>),
    Tuple(Rc<Items>),
    Set(Rc<RefCell<ValueSet>>),
    Dict(Rc<RefCell<Dict>>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// A fixed-length duration (`days(3)`, `date - date`).
    Duration(TimeDelta),
    /// A calendar-aware relative delta (`months(1)`, `timedelta(day=31)`).
    Delta(CalendarDelta),
    Builtin(Arc<Builtin>),
    Function(Rc<UserFunction>),
    Method(Rc<BoundMethod>),
    /// A host object that has not been projected into a mapping yet.
    Object(Rc<dyn DomainObject>),
}

/// A numeric view of a value, used by arithmetic and ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(Items::from(items))))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(Items::from(items)))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn set(set: ValueSet) -> Self {
        Value::Set(Rc::new(RefCell::new(set)))
    }

    pub fn object(object: impl DomainObject) -> Self {
        Value::Object(Rc::new(object))
    }

    /// The Python-style type name, used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Duration(_) => "timedelta",
            Value::Delta(_) => "relativedelta",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Function(_) => "function",
            Value::Method(_) => "method",
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Builtin(_) | Value::Function(_) | Value::Method(_)
        )
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Set(set) => !set.borrow().is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            Value::Duration(d) => !d.is_zero(),
            Value::Delta(d) => !d.is_zero(),
            Value::Date(_)
            | Value::DateTime(_)
            | Value::Builtin(_)
            | Value::Function(_)
            | Value::Method(_)
            | Value::Object(_) => true,
        }
    }

    /// Booleans count as numbers, matching Python.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Elements of a list or tuple, copied out of the container.
    pub fn as_sequence(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.borrow().to_vec()),
            Value::Tuple(items) => Some(items.to_vec()),
            _ => None,
        }
    }

    /// The elements a `for` loop visits. Mutating the container while
    /// iterating does not affect the sequence already produced.
    pub fn iterate(&self) -> Result<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items.borrow().to_vec()),
            Value::Tuple(items) => Ok(items.to_vec()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Dict(dict) => Ok(dict.borrow().keys().cloned().collect()),
            Value::Set(set) => Ok(set.borrow().iter().cloned().collect()),
            other => Err(InvalidExpression::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Python ordering. Incomparable types are a type error; NaN yields
    /// `Ok(None)`.
    pub fn try_cmp(&self, other: &Value) -> Result<Option<Ordering>> {
        self.cmp_within(other, 0)
    }

    fn cmp_within(&self, other: &Value, depth: usize) -> Result<Option<Ordering>> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.partial_cmp(&b));
        }
        let ordering = match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Duration(a), Value::Duration(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                let depth = descend(depth, "comparison")?;
                return compare_sequences(&a.borrow(), &b.borrow(), depth);
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                let depth = descend(depth, "comparison")?;
                return compare_sequences(a, b, depth);
            }
            _ => {
                return Err(InvalidExpression::type_error(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    self.type_name(),
                    other.type_name()
                )));
            }
        };
        Ok(Some(ordering))
    }

    /// Python `is`: identity for containers and callables, value equality
    /// for immutable scalars.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => {
                core::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }

    /// Address of the shared allocation behind a reference value.
    pub(crate) fn identity(&self) -> Option<usize> {
        let ptr = match self {
            Value::List(v) => Rc::as_ptr(v) as *const () as usize,
            Value::Tuple(v) => Rc::as_ptr(v) as *const () as usize,
            Value::Set(v) => Rc::as_ptr(v) as *const () as usize,
            Value::Dict(v) => Rc::as_ptr(v) as *const () as usize,
            Value::Builtin(v) => Arc::as_ptr(v) as *const () as usize,
            Value::Function(v) => Rc::as_ptr(v) as *const () as usize,
            Value::Method(v) => Rc::as_ptr(v) as *const () as usize,
            Value::Object(v) => Rc::as_ptr(v) as *const () as usize,
            _ => return None,
        };
        Some(ptr)
    }
}

fn compare_sequences(a: &[Value], b: &[Value], depth: usize) -> Result<Option<Ordering>> {
    for (x, y) in a.iter().zip(b) {
        if x.eq_within(y, depth)? {
            continue;
        }
        return x.cmp_within(y, depth);
    }
    Ok(Some(a.len().cmp(&b.len())))
}

fn sequences_eq(a: &[Value], b: &[Value], depth: usize) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.eq_within(y, depth)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The depth for the elements of a container found at `depth`.
pub(crate) fn descend(depth: usize, what: &str) -> Result<usize> {
    if depth >= MAX_VALUE_DEPTH {
        return Err(InvalidExpression::limit(format!(
            "Maximum nesting depth of {MAX_VALUE_DEPTH} exceeded in {what}"
        )));
    }
    Ok(depth + 1)
}

impl Value {
    /// Python `==`. Containers nested past [`MAX_VALUE_DEPTH`], including
    /// ones that contain themselves, are a limit error.
    pub fn try_eq(&self, other: &Value) -> Result<bool> {
        self.eq_within(other, 0)
    }

    pub(crate) fn eq_within(&self, other: &Value, depth: usize) -> Result<bool> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.partial_cmp(&b) == Some(Ordering::Equal));
        }
        Ok(match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let depth = descend(depth, "comparison")?;
                return sequences_eq(&a.borrow(), &b.borrow(), depth);
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let depth = descend(depth, "comparison")?;
                return sequences_eq(a, b, depth);
            }
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let depth = descend(depth, "comparison")?;
                return a.borrow().eq_within(&b.borrow(), depth);
            }
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Delta(a), Value::Delta(b)) => a == b,
            _ => self.is_same(other),
        })
    }
}

/// Structural equality for host code and tests. Comparisons that hit the
/// nesting limit report unequal; scripts go through [`Value::try_eq`].
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.try_eq(other).unwrap_or(false)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<TimeDelta> for Value {
    fn from(d: TimeDelta) -> Self {
        Value::Duration(d)
    }
}

impl From<CalendarDelta> for Value {
    fn from(d: CalendarDelta) -> Self {
        Value::Delta(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<Dict> for Value {
    fn from(dict: Dict) -> Self {
        Value::dict(dict)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}
