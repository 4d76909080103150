//! Core data model
//!
//! Values crossing the bridge and the declarative metadata binding native
//! interfaces to foreign classes.

pub mod binding;
pub mod value;

pub use binding::{Binding, BindingResolver, ForeignInterface, InterfaceKey, InterfaceSpec, OperationSpec};
pub use value::{ForeignObject, FromValue, IntoValue, Value, ValueKind};
