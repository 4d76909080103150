//! Embedded interpreter seam
//!
//! The interpreter itself is an external collaborator. Backends implement
//! `ForeignRuntime` (creates global states) and `ForeignState` (the handful
//! of primitives the bridge needs: resolve a symbol, call a callable,
//! convert a value). Everything else in the crate is written against these
//! two traits.
//!
//! Components:
//! - `registry.rs` - lazily created, cached interpreter states
//! - `resolver.rs` - module/class resolution through the importer
//! - `instantiate.rs` - constructor calls and direct coercion

pub mod instantiate;
pub mod registry;
pub mod resolver;

pub use instantiate::ForeignInstantiator;
pub use registry::{RuntimeState, RuntimeStateRegistry, StateKey};
pub use resolver::{ResolvedClass, SymbolResolver};

use crate::core::value::{ForeignObject, Value};
use crate::errors::ForeignError;
use std::path::PathBuf;

/// Factory of interpreter global states.
pub trait ForeignRuntime: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Create a fresh global execution context.
    fn create_state(&self) -> Result<Box<dyn ForeignState>, ForeignError>;
}

/// One interpreter global execution context (symbol tables, search path).
///
/// Implementations need not be reentrant: `RuntimeState` serializes every
/// call into a state.
pub trait ForeignState: Send + Sync {
    /// Append entries to the module search path.
    fn extend_search_path(&self, entries: &[PathBuf]) -> Result<(), ForeignError>;

    /// Current module search path.
    fn search_path(&self) -> Result<Vec<PathBuf>, ForeignError>;

    /// Look up a builtin by name (for example the import function).
    fn builtin(&self, name: &str) -> Result<ForeignObject, ForeignError>;

    /// Call `callable` with positional and keyword arguments.
    fn call(
        &self,
        callable: &ForeignObject,
        args: &[ForeignObject],
        keywords: &[(String, ForeignObject)],
    ) -> Result<ForeignObject, ForeignError>;

    /// Read an attribute.
    fn get_attr(&self, object: &ForeignObject, name: &str) -> Result<ForeignObject, ForeignError>;

    /// Invoke a method; a call may produce several result values.
    fn call_method(
        &self,
        object: &ForeignObject,
        name: &str,
        args: &[ForeignObject],
    ) -> Result<Vec<ForeignObject>, ForeignError>;

    /// Native value to foreign value.
    fn to_foreign(&self, value: &Value) -> Result<ForeignObject, ForeignError>;

    /// Foreign value to native value. Objects without a primitive form come
    /// back as `Value::Object`.
    fn to_native(&self, object: &ForeignObject) -> Result<Value, ForeignError>;

    /// Structural native form of an object, used for direct coercion.
    fn coerce(&self, object: &ForeignObject) -> Result<Value, ForeignError>;
}
