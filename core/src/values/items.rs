//! Element storage for lists and tuples, and non-recursive teardown.

use core::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::values::Value;

/// The elements of a list or tuple.
///
/// Scripts can nest containers far deeper than the native stack allows a
/// recursive drop to go (`a = [a]` in a loop), so dropping `Items` moves
/// nested containers onto a work list instead of recursing into them.
#[derive(Clone, Default, PartialEq)]
pub struct Items(Vec<Value>);

impl From<Vec<Value>> for Items {
    fn from(items: Vec<Value>) -> Self {
        Items(items)
    }
}

impl Deref for Items {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl DerefMut for Items {
    fn deref_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }
}

impl Drop for Items {
    fn drop(&mut self) {
        release(core::mem::take(&mut self.0));
    }
}

/// Drop `pending` with constant stack use.
///
/// A container held only by the value being dropped hands its elements to
/// the work list first, so it is empty by the time it is freed.
pub(crate) fn release(mut pending: Vec<Value>) {
    while let Some(mut value) = pending.pop() {
        match &mut value {
            Value::List(items) => {
                if let Some(items) = Rc::get_mut(items) {
                    pending.append(&mut items.get_mut().0);
                }
            }
            Value::Tuple(items) => {
                if let Some(items) = Rc::get_mut(items) {
                    pending.append(&mut items.0);
                }
            }
            Value::Dict(dict) => {
                if let Some(dict) = Rc::get_mut(dict) {
                    dict.get_mut().drain_into(&mut pending);
                }
            }
            Value::Set(set) => {
                if let Some(set) = Rc::get_mut(set) {
                    set.get_mut().drain_into(&mut pending);
                }
            }
            Value::Method(method) => {
                if let Some(method) = Rc::get_mut(method) {
                    if let Some(receiver) = Rc::get_mut(&mut method.receiver) {
                        pending.append(&mut receiver.get_mut().0);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Dict;

    #[test]
    fn test_deep_lists_drop_without_recursion() {
        let mut value = Value::list(vec![]);
        for _ in 0..200_000 {
            value = Value::list(vec![value]);
        }
        drop(value);
    }

    #[test]
    fn test_deep_mixed_containers_drop_without_recursion() {
        let mut value = Value::None;
        for i in 0..100_000 {
            value = match i % 3 {
                0 => Value::tuple(vec![value]),
                1 => {
                    let mut dict = Dict::new();
                    dict.insert_str("next", value);
                    Value::dict(dict)
                }
                _ => Value::list(vec![Value::Int(i), value]),
            };
        }
        drop(value);
    }

    #[test]
    fn test_shared_children_survive() {
        let shared = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![shared.clone(), shared.clone()]);
        drop(outer);
        assert_eq!(shared, Value::list(vec![Value::Int(1)]));
    }
}
