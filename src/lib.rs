//! pyproxy: call objects living in an embedded interpreter through native
//! Rust traits.
//!
//! Organized by functionality:
//! - `core` - value model and binding metadata
//! - `errors` - error taxonomy
//! - `runtime` - interpreter seam, state registry, resolution, instantiation
//! - `interop` - marshalling, proxy types, dispatch
//! - `frontend` - the `Bridge` factory and its configuration
//! - `infrastructure` - logging setup and counters
//! - `testing` - in-process object host for tests (feature `testing`)
//! - `python` - CPython backend (feature `python`)

// Lets `#[foreign_interface]` expansions inside this crate use `::pyproxy` paths.
extern crate self as pyproxy;

pub mod core;
pub mod errors;
pub mod frontend;
pub mod infrastructure;
pub mod interop;
pub mod runtime;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(feature = "python")]
pub mod python;

pub use crate::core::{
    Binding, BindingResolver, ForeignInterface, ForeignObject, FromValue, InterfaceKey,
    InterfaceSpec, IntoValue, OperationSpec, Value, ValueKind,
};
pub use errors::{BridgeError, ForeignError, Result};
pub use frontend::{Bridge, BridgeConfig, StateMode};
pub use infrastructure::{BridgeStats, StatsSnapshot};
pub use interop::{MarshalledArgs, ProxyInstance, ValueMarshaller};
pub use runtime::{ForeignRuntime, ForeignState, RuntimeState, RuntimeStateRegistry, StateKey};
pub use pyproxy_macros::{foreign_interface, forward};

#[cfg(feature = "python")]
pub use python::PythonRuntime;
