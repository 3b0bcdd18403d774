//! The function and projector registry shared by every evaluation.

use std::sync::Arc;

use thiserror::Error;

use crate::errors::Result;
use crate::projection::Projectors;
use crate::values::{Builtin, Dict, DomainObject};

use super::Context;

/// Why a registration was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{0}' is not a valid function name")]
    InvalidName(String),

    #[error("function '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Named built-ins plus the projectors for host domain types.
///
/// Immutable once an [`Engine`](super::Engine) is built. Every evaluator
/// seeds its variable table from the functions here, in registration order,
/// so scripts may shadow a built-in within their own scope.
#[derive(Default)]
pub struct Registry {
    functions: Vec<(String, Arc<Builtin>)>,
    projectors: Projectors,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host function. Refuses keywords, non-identifiers and taken names.
    pub fn register_function(&mut self, name: &str, builtin: Builtin) -> Result<(), RegistryError> {
        if !is_identifier(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.get(name).is_some() {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        self.define(name, builtin);
        Ok(())
    }

    /// Add or replace a function without validation. Used for the standard
    /// library, whose names are known to be valid.
    pub(crate) fn define(&mut self, name: &str, builtin: Builtin) {
        let builtin = Arc::new(builtin.named(name));
        match self.functions.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = builtin,
            None => self.functions.push((name.to_string(), builtin)),
        }
    }

    pub fn register_projector<T: DomainObject>(
        &mut self,
        projector: impl Fn(&T, &Context) -> Result<Dict> + Send + Sync + 'static,
    ) {
        self.projectors.register(projector);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Builtin>> {
        self.functions
            .iter()
            .find_map(|(n, builtin)| (n == name).then_some(builtin))
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &Arc<Builtin>)> {
        self.functions.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn projectors(&self) -> &Projectors {
        &self.projectors
    }
}

const KEYWORDS: &[&str] = &[
    "and", "as", "break", "def", "elif", "else", "except", "finally", "for", "if", "in", "is",
    "not", "or", "pass", "return", "try", "while", "True", "False", "None",
];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic());
    starts_ok
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !KEYWORDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Value;

    fn constant() -> Builtin {
        Builtin::new(|_| Ok(Value::Int(1)))
    }

    #[test]
    fn test_register_function() {
        let mut registry = Registry::new();
        registry.register_function("price", constant()).unwrap();
        assert_eq!(registry.get("price").unwrap().name(), "price");
        assert_eq!(
            registry.register_function("price", constant()),
            Err(RegistryError::AlreadyRegistered("price".to_string()))
        );
    }

    #[test]
    fn test_invalid_names() {
        let mut registry = Registry::new();
        for name in ["", "1abc", "a-b", "if", "None", "a b"] {
            assert_eq!(
                registry.register_function(name, constant()),
                Err(RegistryError::InvalidName(name.to_string())),
                "{name:?}"
            );
        }
    }

    #[test]
    fn test_define_replaces_in_place() {
        let mut registry = Registry::new();
        registry.define("a", constant());
        registry.define("b", constant());
        registry.define("a", Builtin::new(|_| Ok(Value::Int(2))));
        let names: Vec<_> = registry.functions().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
