//! The caller-supplied context bag.

use hashbrown::HashMap;

use crate::values::Value;

/// Key under which `print_message` accumulates output.
pub const LOG_KEY: &str = "log";

/// Opaque key/value state handed to built-ins and projectors.
///
/// The engine itself reads only a handful of keys (`log`,
/// `date_group_with_dates`); everything else is for host-registered
/// functions.
#[derive(Debug, Clone, Default)]
pub struct Context {
    entries: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context pre-seeded with an empty log.
    pub fn with_log() -> Self {
        let mut context = Self::new();
        context.insert(LOG_KEY, "");
        context
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// True when `key` is present and truthy.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    pub fn log(&self) -> Option<&str> {
        self.get(LOG_KEY).and_then(Value::as_str)
    }

    pub fn append_log(&mut self, line: &str) {
        let mut log = self.log().unwrap_or_default().to_string();
        log.push_str(line);
        self.insert(LOG_KEY, log);
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_appends() {
        let mut context = Context::new();
        assert_eq!(context.log(), None);
        context.append_log("a\n");
        context.append_log("b\n");
        assert_eq!(context.log(), Some("a\nb\n"));
    }

    #[test]
    fn test_flag() {
        let context: Context = [("on", Value::Bool(true)), ("off", Value::Int(0))]
            .into_iter()
            .collect();
        assert!(context.flag("on"));
        assert!(!context.flag("off"));
        assert!(!context.flag("missing"));
    }
}
