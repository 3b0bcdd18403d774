//! Insertion-ordered mappings and sets keyed by Python-style hashes.

use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use hashbrown::HashMap;

use crate::errors::{InvalidExpression, Result};
use crate::values::items::release;
use crate::values::value::descend;
use crate::values::{CalendarDelta, Value};

/// Normalised hash key. Values that compare equal (`1`, `1.0`, `True`)
/// produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
    Delta(CalendarDelta),
    /// Callables and host objects hash by address.
    Identity(usize),
}

impl Value {
    /// Lists, dicts and sets are unhashable.
    pub fn hash_key(&self) -> Result<HashKey> {
        self.hash_key_within(0)
    }

    fn hash_key_within(&self, depth: usize) -> Result<HashKey> {
        Ok(match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(*b as i64),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => float_key(*f),
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => {
                let depth = descend(depth, "hashing")?;
                HashKey::Tuple(
                    items
                        .iter()
                        .map(|item| item.hash_key_within(depth))
                        .collect::<Result<_>>()?,
                )
            }
            Value::Date(d) => HashKey::Date(*d),
            Value::DateTime(dt) => HashKey::DateTime(*dt),
            Value::Duration(d) => HashKey::Duration(*d),
            Value::Delta(d) => HashKey::Delta(*d),
            Value::List(_) | Value::Dict(_) | Value::Set(_) => {
                return Err(InvalidExpression::type_error(format!(
                    "unhashable type: '{}'",
                    self.type_name()
                )));
            }
            Value::Builtin(_) | Value::Function(_) | Value::Method(_) | Value::Object(_) => {
                HashKey::Identity(self.identity().unwrap_or_default())
            }
        })
    }
}

fn float_key(f: f64) -> HashKey {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        HashKey::Int(f as i64)
    } else {
        HashKey::Float(f.to_bits())
    }
}

/// An insertion-ordered mapping from values to values.
///
/// Overwriting an existing key keeps its original position.
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    index: HashMap<HashKey, usize>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<&Value>> {
        let key = key.hash_key()?;
        Ok(self.index.get(&key).map(|&i| &self.entries[i].1))
    }

    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.index
            .get(&HashKey::Str(Rc::from(key)))
            .map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool> {
        Ok(self.index.contains_key(&key.hash_key()?))
    }

    /// Insert or overwrite, returning the previous value.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<Option<Value>> {
        let hash = key.hash_key()?;
        Ok(self.insert_hashed(hash, key, value))
    }

    pub fn insert_str(&mut self, key: &str, value: Value) -> Option<Value> {
        let key: Rc<str> = Rc::from(key);
        self.insert_hashed(HashKey::Str(key.clone()), Value::Str(key), value)
    }

    fn insert_hashed(&mut self, hash: HashKey, key: Value, value: Value) -> Option<Value> {
        match self.index.get(&hash) {
            Some(&i) => Some(core::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(hash, self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>> {
        let hash = key.hash_key()?;
        Ok(self.remove_hashed(&hash))
    }

    pub fn remove_str(&mut self, key: &str) -> Option<Value> {
        self.remove_hashed(&HashKey::Str(Rc::from(key)))
    }

    fn remove_hashed(&mut self, hash: &HashKey) -> Option<Value> {
        let i = self.index.remove(hash)?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Equality of entries regardless of insertion order.
    pub(crate) fn eq_within(&self, other: &Self, depth: usize) -> Result<bool> {
        if self.len() != other.len() {
            return Ok(false);
        }
        for (hash, &i) in &self.index {
            let Some(&j) = other.index.get(hash) else {
                return Ok(false);
            };
            if !self.entries[i].1.eq_within(&other.entries[j].1, depth)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn drain_into(&mut self, pending: &mut Vec<Value>) {
        self.index.clear();
        for (key, value) in self.entries.drain(..) {
            pending.push(key);
            pending.push(value);
        }
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.eq_within(other, 0).unwrap_or(false)
    }
}

impl Drop for Dict {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.drain_into(&mut pending);
        release(pending);
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut dict = Dict::new();
        for (key, value) in iter {
            dict.insert_str(&key.into(), value);
        }
        dict
    }
}

/// An insertion-ordered set of hashable values.
#[derive(Clone, Default, PartialEq)]
pub struct ValueSet {
    items: Dict,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns false when the value was already present.
    pub fn insert(&mut self, value: Value) -> Result<bool> {
        Ok(self.items.insert(value, Value::None)?.is_none())
    }

    pub fn contains(&self, value: &Value) -> Result<bool> {
        self.items.contains_key(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.keys()
    }

    pub(crate) fn drain_into(&mut self, pending: &mut Vec<Value>) {
        self.items.drain_into(pending);
    }

    pub fn union(&self, other: &ValueSet) -> ValueSet {
        let mut out = self.clone();
        for value in other.iter() {
            // Every member is hashable already.
            let _ = out.insert(value.clone());
        }
        out
    }

    pub fn intersection(&self, other: &ValueSet) -> ValueSet {
        self.filtered(|v| other.contains(v).unwrap_or(false))
    }

    pub fn difference(&self, other: &ValueSet) -> ValueSet {
        self.filtered(|v| !other.contains(v).unwrap_or(false))
    }

    pub fn symmetric_difference(&self, other: &ValueSet) -> ValueSet {
        self.difference(other).union(&other.difference(self))
    }

    fn filtered(&self, keep: impl Fn(&Value) -> bool) -> ValueSet {
        let mut out = ValueSet::new();
        for value in self.iter().filter(|v| keep(v)) {
            let _ = out.insert(value.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_survives_overwrite() {
        let mut dict = Dict::new();
        dict.insert_str("b", Value::Int(1));
        dict.insert_str("a", Value::Int(2));
        dict.insert_str("b", Value::Int(3));
        let keys: Vec<_> = dict.keys().map(|k| k.as_str().unwrap().to_string()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(dict.get_str("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_numeric_keys_are_normalised() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("one")).unwrap();
        assert_eq!(dict.get(&Value::Float(1.0)).unwrap(), Some(&Value::str("one")));
        assert_eq!(dict.get(&Value::Bool(true)).unwrap(), Some(&Value::str("one")));
        assert_eq!(dict.get(&Value::Float(1.5)).unwrap(), None);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut dict: Dict = [("a", Value::Int(1)), ("b", Value::Int(2)), ("c", Value::Int(3))]
            .into_iter()
            .collect();
        assert_eq!(dict.remove_str("a"), Some(Value::Int(1)));
        assert_eq!(dict.get_str("c"), Some(&Value::Int(3)));
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_unhashable_keys() {
        let mut dict = Dict::new();
        let err = dict.insert(Value::list(vec![]), Value::None).unwrap_err();
        assert_eq!(err.message(), "unhashable type: 'list'");
        assert!(dict.get(&Value::dict(Dict::new())).is_err());
        assert!(
            dict.insert(Value::tuple(vec![Value::Int(1), Value::str("x")]), Value::None)
                .is_ok()
        );
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: Dict = [("x", Value::Int(1)), ("y", Value::Int(2))].into_iter().collect();
        let b: Dict = [("y", Value::Int(2)), ("x", Value::Float(1.0))].into_iter().collect();
        assert!(a == b);
    }

    #[test]
    fn test_set_operations() {
        let mut a = ValueSet::new();
        let mut b = ValueSet::new();
        for i in 1..=3 {
            a.insert(Value::Int(i)).unwrap();
        }
        for i in 2..=4 {
            b.insert(Value::Int(i)).unwrap();
        }
        assert!(!a.insert(Value::Int(1)).unwrap());
        assert_eq!(a.union(&b).len(), 4);
        assert_eq!(a.intersection(&b).len(), 2);
        assert_eq!(a.difference(&b).len(), 1);
        assert_eq!(a.symmetric_difference(&b).len(), 2);
    }
}
