//! Module and class resolution
//!
//! Classes are located the way the interpreter itself would: the state's
//! import function is called with the module name, then the class is read
//! as an attribute of the module. Dotted module names import the top-level
//! package and walk the remaining segments as attributes.

use super::registry::RuntimeState;
use crate::core::binding::Binding;
use crate::core::value::{ForeignObject, Value};
use crate::errors::{BridgeError, Result};

/// Callable foreign class together with its `module.Class` name.
#[derive(Debug, Clone)]
pub struct ResolvedClass {
    pub qualified_name: String,
    pub callable: ForeignObject,
}

pub struct SymbolResolver;

impl SymbolResolver {
    /// Name of the interpreter's import builtin.
    pub const IMPORTER: &'static str = "__import__";

    /// Fetch the import function from the state's builtins.
    pub fn resolve_importer(state: &RuntimeState) -> Result<ForeignObject> {
        state
            .with(|f| f.builtin(Self::IMPORTER))
            .map_err(|e| BridgeError::lookup(Self::IMPORTER, &e))
    }

    /// Import `module_name` through `importer` and return the innermost module.
    pub fn resolve_module(
        state: &RuntimeState,
        importer: &ForeignObject,
        module_name: &str,
    ) -> Result<ForeignObject> {
        let mut segments = module_name.split('.');
        let root = segments.next().unwrap_or(module_name);

        state.with(|f| {
            let name = f
                .to_foreign(&Value::Str(module_name.to_string()))
                .map_err(|e| BridgeError::lookup(module_name, &e))?;
            let mut module = f
                .call(importer, &[name], &[])
                .map_err(|e| BridgeError::lookup(module_name, &e))?;

            let mut path = root.to_string();
            for segment in segments {
                path.push('.');
                path.push_str(segment);
                module = f
                    .get_attr(&module, segment)
                    .map_err(|e| BridgeError::lookup(&path, &e))?;
            }
            tracing::trace!(state = state.id(), module = module_name, "module resolved");
            Ok(module)
        })
    }

    /// Import `module_name` and read `class_name` from it.
    pub fn resolve_class(
        state: &RuntimeState,
        importer: &ForeignObject,
        module_name: &str,
        class_name: &str,
    ) -> Result<ResolvedClass> {
        let module = Self::resolve_module(state, importer, module_name)?;
        let qualified_name = format!("{}.{}", module_name, class_name);
        let callable = state
            .with(|f| f.get_attr(&module, class_name))
            .map_err(|e| BridgeError::lookup(&qualified_name, &e))?;

        tracing::debug!(state = state.id(), class = %qualified_name, "class resolved");
        Ok(ResolvedClass {
            qualified_name,
            callable,
        })
    }

    /// Resolve the class named by `binding` with the state's cached importer.
    pub fn resolve_binding(state: &RuntimeState, binding: &Binding) -> Result<ResolvedClass> {
        let importer = state.importer()?;
        Self::resolve_class(state, &importer, binding.module_name(), binding.class_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::config::PathsConfig;
    use crate::infrastructure::metrics::BridgeStats;
    use crate::runtime::{RuntimeStateRegistry, StateKey};
    use crate::testing::{fixtures, HostClass, ScriptedRuntime};
    use std::sync::Arc;

    fn state(runtime: &ScriptedRuntime) -> Arc<RuntimeState> {
        let registry = RuntimeStateRegistry::new(
            Arc::new(runtime.clone()),
            PathsConfig::isolated(),
            Arc::new(BridgeStats::default()),
        );
        registry.get(StateKey::Global).unwrap()
    }

    #[test]
    fn test_resolve_class() {
        let runtime = fixtures::runtime();
        let state = state(&runtime);

        let class = SymbolResolver::resolve_binding(&state, &Binding::new("Car", "Car")).unwrap();
        assert_eq!(class.qualified_name, "Car.Car");
        assert_eq!(class.callable.type_name(), "type");
    }

    #[test]
    fn test_resolve_dotted_module() {
        let runtime = ScriptedRuntime::new();
        runtime.define_module("vehicles.cars", vec![HostClass::new("Sedan")]);
        let state = state(&runtime);

        let class =
            SymbolResolver::resolve_binding(&state, &Binding::new("vehicles.cars", "Sedan")).unwrap();
        assert_eq!(class.qualified_name, "vehicles.cars.Sedan");
    }

    #[test]
    fn test_resolve_with_explicit_importer() {
        let runtime = fixtures::runtime();
        let state = state(&runtime);
        let importer = SymbolResolver::resolve_importer(&state).unwrap();

        let class = SymbolResolver::resolve_class(&state, &importer, "Building", "Building").unwrap();
        assert_eq!(class.qualified_name, "Building.Building");
    }

    #[test]
    fn test_missing_module_is_lookup_error() {
        let runtime = fixtures::runtime();
        let state = state(&runtime);

        let err = SymbolResolver::resolve_binding(&state, &Binding::new("Garage", "Garage")).unwrap_err();
        match err {
            BridgeError::Lookup { target, message } => {
                assert_eq!(target, "Garage");
                assert!(message.contains("ImportError"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_class_is_lookup_error() {
        let runtime = fixtures::runtime();
        let state = state(&runtime);

        let err = SymbolResolver::resolve_binding(&state, &Binding::new("Car", "Truck")).unwrap_err();
        match err {
            BridgeError::Lookup { target, message } => {
                assert_eq!(target, "Car.Truck");
                assert!(message.contains("AttributeError"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
