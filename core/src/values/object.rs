use core::any::Any;

use crate::values::Value;

/// A host value that scripts can only see through a registered projector.
///
/// The evaluator never inspects a domain object directly. When a script
/// touches one, the projection layer looks up the projector registered for
/// its concrete type and replaces it with a plain mapping.
pub trait DomainObject: Any {
    /// Name used in error messages, e.g. `"Instrument"`.
    fn type_name(&self) -> &str;

    /// A primary-key-like identity. Two objects of the same type with the
    /// same identity project to the same mapping within one evaluation.
    fn identity(&self) -> Option<Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
