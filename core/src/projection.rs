//! Projection of host domain objects into plain mappings.
//!
//! Scripts never see a [`DomainObject`] directly. The first time one is
//! handed to a script, the projector registered for its concrete type turns
//! it into a [`Dict`], which is then post-processed:
//!
//! - permission keys are dropped,
//! - an `attributes` list of typed records is flattened to `{user_code: value}`,
//! - `foo_object` keys replace `foo` with the recursively projected value,
//! - dates and date-times nested anywhere are rendered as strings.
//!
//! Results are memoized per evaluator under `(TypeId, identity)`, so the same
//! backing object always projects to the same shared mapping within one run.

use core::any::TypeId;
use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use tracing::debug;

use crate::api::Context;
use crate::errors::{InvalidExpression, Result};
use crate::values::{Dict, DomainObject, HashKey, Value};

const PERMISSION_KEYS: &[&str] = &[
    "object_permissions",
    "user_object_permissions",
    "group_object_permissions",
];

const EXPANDED_SUFFIX: &str = "_object";

/// Declared kinds of a flattened attribute record.
const VALUE_TYPE_STRING: i64 = 10;
const VALUE_TYPE_NUMBER: i64 = 20;
const VALUE_TYPE_CLASSIFIER: i64 = 30;
const VALUE_TYPE_DATE: i64 = 40;

type ProjectorFn = dyn Fn(&dyn DomainObject, &Context) -> Result<Dict> + Send + Sync;

/// Projectors keyed by the concrete Rust type they accept.
#[derive(Default)]
pub struct Projectors {
    by_type: HashMap<TypeId, Box<ProjectorFn>>,
}

impl Projectors {
    pub fn register<T: DomainObject>(
        &mut self,
        projector: impl Fn(&T, &Context) -> Result<Dict> + Send + Sync + 'static,
    ) {
        let erased = move |object: &dyn DomainObject, context: &Context| {
            match object.as_any().downcast_ref::<T>() {
                Some(object) => projector(object, context),
                None => Err(cannot_serialize(object)),
            }
        };
        self.by_type.insert(TypeId::of::<T>(), Box::new(erased));
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    type_id: TypeId,
    identity: HashKey,
}

/// Per-evaluator memo of projected objects.
///
/// Each entry keeps its source object alive, so an address used as a
/// fallback identity cannot be reused by another object while cached.
#[derive(Default)]
pub struct ProjectionCache {
    memo: HashMap<MemoKey, (Value, Rc<dyn DomainObject>)>,
}

impl ProjectionCache {
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

/// Project `value` if it is a domain object; any other value is returned
/// unchanged.
pub fn project(
    value: Value,
    projectors: &Projectors,
    context: &Context,
    cache: &mut ProjectionCache,
) -> Result<Value> {
    match value {
        Value::Object(object) => Projection {
            projectors,
            context,
            cache,
        }
        .object(&object),
        other => Ok(other),
    }
}

struct Projection<'a> {
    projectors: &'a Projectors,
    context: &'a Context,
    cache: &'a mut ProjectionCache,
}

impl Projection<'_> {
    fn object(&mut self, object: &Rc<dyn DomainObject>) -> Result<Value> {
        let key = memo_key(object);
        if let Some((hit, _)) = self.cache.memo.get(&key) {
            return Ok(hit.clone());
        }
        debug!(type_name = object.type_name(), "Projecting domain object");

        let projector = self
            .projectors
            .by_type
            .get(&key.type_id)
            .ok_or_else(|| cannot_serialize(object.as_ref()))?;
        let raw = projector(object.as_ref(), self.context)?;

        // Memoize the shared mapping before filling it so that cycles
        // resolve to the mapping under construction.
        let shared = Rc::new(RefCell::new(Dict::new()));
        self.cache
            .memo
            .insert(key.clone(), (Value::Dict(shared.clone()), object.clone()));
        match self.mapping(&raw) {
            Ok(processed) => {
                *shared.borrow_mut() = processed;
                Ok(Value::Dict(shared))
            }
            Err(err) => {
                self.cache.memo.remove(&key);
                Err(err)
            }
        }
    }

    fn mapping(&mut self, raw: &Dict) -> Result<Dict> {
        let mut out = Dict::new();
        for (key, value) in raw.iter() {
            let Some(name) = key.as_str() else {
                out.insert(key.clone(), self.nested(value)?)?;
                continue;
            };
            if PERMISSION_KEYS.contains(&name) {
                continue;
            }
            if name == "attributes" {
                if let Some(records) = value.as_sequence() {
                    let flat = self.attributes(&records)?;
                    out.insert_str(name, Value::dict(flat));
                    continue;
                }
            }
            match name.strip_suffix(EXPANDED_SUFFIX) {
                Some(base) if !base.is_empty() => {
                    out.insert_str(base, self.nested(value)?);
                }
                _ => {
                    out.insert(key.clone(), self.nested(value)?)?;
                }
            }
        }
        Ok(out)
    }

    fn nested(&mut self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::Object(object) => self.object(object)?,
            Value::Date(date) => Value::from(date.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => Value::from(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Value::Dict(dict) => {
                let dict = dict.borrow().clone();
                Value::dict(self.mapping(&dict)?)
            }
            Value::List(items) => {
                let items = items.borrow().to_vec();
                Value::list(self.all(&items)?)
            }
            Value::Tuple(items) => Value::tuple(self.all(items)?),
            other => other.clone(),
        })
    }

    fn all(&mut self, items: &[Value]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.nested(item)).collect()
    }

    fn attributes(&mut self, records: &[Value]) -> Result<Dict> {
        let mut flat = Dict::new();
        for record in records {
            let Value::Dict(record) = self.nested(record)? else {
                continue;
            };
            let record = record.borrow();
            let Some(Value::Dict(attribute_type)) = record.get_str("attribute_type") else {
                continue;
            };
            let attribute_type = attribute_type.borrow();
            let Some(code) = attribute_type.get_str("user_code").and_then(Value::as_str) else {
                continue;
            };
            let value = match attribute_type.get_str("value_type").and_then(Value::as_int) {
                Some(VALUE_TYPE_STRING) => field(&record, "value_string"),
                Some(VALUE_TYPE_NUMBER) => field(&record, "value_float"),
                Some(VALUE_TYPE_DATE) => field(&record, "value_date"),
                Some(VALUE_TYPE_CLASSIFIER) => match record.get_str("classifier") {
                    Some(Value::Dict(classifier)) => field(&classifier.borrow(), "name"),
                    _ => Value::None,
                },
                _ => Value::None,
            };
            flat.insert_str(code, value);
        }
        Ok(flat)
    }
}

fn field(record: &Dict, name: &str) -> Value {
    record.get_str(name).cloned().unwrap_or(Value::None)
}

fn memo_key(object: &Rc<dyn DomainObject>) -> MemoKey {
    let type_id = object.as_any().type_id();
    let identity = object
        .identity()
        .and_then(|id| id.hash_key().ok())
        .unwrap_or_else(|| HashKey::Identity(Rc::as_ptr(object) as *const () as usize));
    MemoKey { type_id, identity }
}

fn cannot_serialize(object: &dyn DomainObject) -> InvalidExpression {
    InvalidExpression::invalid(format!("{} can't serialize", object.type_name()))
}
