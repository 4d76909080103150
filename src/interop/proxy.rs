//! Proxy types and instances
//!
//! A `ProxyType` is the dispatch table of one interface: forwarded operation
//! name -> foreign method name and arity. It is built once per interface and
//! shared by every instance; instances differ only in the foreign object
//! they wrap. The statically typed face of a proxy (the struct implementing
//! the native trait) is emitted by `#[foreign_interface]` and holds a
//! `ProxyInstance`.

use super::dispatch::MethodInterceptor;
use crate::core::binding::{InterfaceKey, InterfaceSpec, OperationSpec};
use crate::core::value::{ForeignObject, FromValue, Value};
use crate::errors::{BridgeError, Result};
use crate::infrastructure::metrics::BridgeStats;
use crate::runtime::RuntimeState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Routing of one forwarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    foreign_name: String,
    arity: usize,
}

impl DispatchEntry {
    pub fn foreign_name(&self) -> &str {
        &self.foreign_name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// Generated dispatch table of one interface. Immutable once built.
#[derive(Debug)]
pub struct ProxyType {
    key: InterfaceKey,
    spec: Arc<InterfaceSpec>,
    dispatch: HashMap<String, DispatchEntry>,
}

impl ProxyType {
    fn build(key: InterfaceKey, spec: Arc<InterfaceSpec>) -> Result<Self> {
        let interface = spec.name().to_string();
        let mut seen: HashMap<&str, &OperationSpec> = HashMap::new();
        let mut arity_by_foreign: HashMap<&str, (&str, usize)> = HashMap::new();
        let mut dispatch = HashMap::new();

        for op in spec.operations() {
            if let Some(previous) = seen.insert(op.name(), op) {
                if previous != op {
                    return Err(BridgeError::proxy_generation(
                        &interface,
                        format!("conflicting declarations of operation '{}'", op.name()),
                    ));
                }
                continue;
            }
            if !op.is_forwarded() {
                continue;
            }

            let foreign = op.foreign_name();
            if !is_identifier(foreign) {
                return Err(BridgeError::proxy_generation(
                    &interface,
                    format!(
                        "operation '{}' maps to invalid foreign name '{}'",
                        op.name(),
                        foreign
                    ),
                ));
            }
            if let Some((other, arity)) = arity_by_foreign.insert(foreign, (op.name(), op.arity())) {
                if arity != op.arity() {
                    return Err(BridgeError::proxy_generation(
                        &interface,
                        format!(
                            "operations '{}' and '{}' forward to '{}' with different arity",
                            other,
                            op.name(),
                            foreign
                        ),
                    ));
                }
            }

            dispatch.insert(
                op.name().to_string(),
                DispatchEntry {
                    foreign_name: foreign.to_string(),
                    arity: op.arity(),
                },
            );
        }

        Ok(Self {
            key,
            spec,
            dispatch,
        })
    }

    pub fn key(&self) -> &InterfaceKey {
        &self.key
    }

    pub fn interface(&self) -> &str {
        self.spec.name()
    }

    pub fn spec(&self) -> &Arc<InterfaceSpec> {
        &self.spec
    }

    /// Routing of a forwarded operation; `None` for native or unknown ones.
    pub fn lookup(&self, operation: &str) -> Option<&DispatchEntry> {
        self.dispatch.get(operation)
    }

    pub fn forwards(&self, operation: &str) -> bool {
        self.dispatch.contains_key(operation)
    }

    /// Forwarded operation names, sorted.
    pub fn forwarded_operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dispatch.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Builds and caches one `ProxyType` per interface.
pub struct ProxyGenerator {
    types: DashMap<InterfaceKey, Arc<ProxyType>>,
    stats: Arc<BridgeStats>,
}

impl ProxyGenerator {
    pub fn new(stats: Arc<BridgeStats>) -> Self {
        Self {
            types: DashMap::new(),
            stats,
        }
    }

    /// Cached proxy type for `key`, generated from `spec` on first request.
    pub fn generate(&self, key: InterfaceKey, spec: &Arc<InterfaceSpec>) -> Result<Arc<ProxyType>> {
        if let Some(existing) = self.types.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.types.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let proxy_type = ProxyType::build(entry.key().clone(), Arc::clone(spec))
                    .map_err(|e| {
                        tracing::warn!(interface = spec.name(), error = %e, "proxy generation failed");
                        e
                    })?;
                let proxy_type = Arc::new(proxy_type);

                self.stats.record_proxy_type();
                tracing::debug!(
                    interface = spec.name(),
                    forwarded = ?proxy_type.forwarded_operations(),
                    "generated proxy type"
                );
                entry.insert(Arc::clone(&proxy_type));
                Ok(proxy_type)
            }
        }
    }

    pub fn get(&self, key: &InterfaceKey) -> Option<Arc<ProxyType>> {
        self.types.get(key).map(|t| Arc::clone(t.value()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// One foreign object seen through a native interface.
///
/// Dropping the instance releases the native references only; the foreign
/// object lives on as long as the interpreter keeps it.
pub struct ProxyInstance {
    proxy_type: Arc<ProxyType>,
    object: ForeignObject,
    state: Arc<RuntimeState>,
    stats: Arc<BridgeStats>,
}

impl ProxyInstance {
    pub fn new(
        proxy_type: Arc<ProxyType>,
        object: ForeignObject,
        state: Arc<RuntimeState>,
        stats: Arc<BridgeStats>,
    ) -> Self {
        Self {
            proxy_type,
            object,
            state,
            stats,
        }
    }

    pub fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.proxy_type
    }

    pub fn interface(&self) -> &str {
        self.proxy_type.interface()
    }

    /// The wrapped foreign object.
    pub fn object(&self) -> &ForeignObject {
        &self.object
    }

    /// The interpreter state the object lives in.
    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    pub(crate) fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Invoke a forwarded operation of the interface.
    pub fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
        MethodInterceptor::intercept(self, operation, args)
    }

    /// Invoke a forwarded operation and convert the result into `T`.
    pub fn invoke_as<T: FromValue>(&self, operation: &str, args: &[Value]) -> Result<T> {
        let value = self.invoke(operation, args)?;
        T::from_value(value)
    }

    /// Call any method of the wrapped object by its foreign name, bypassing
    /// the interface's dispatch table.
    pub fn invoke_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        MethodInterceptor::forward(self, name, name, args)
    }
}

impl fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("interface", &self.interface())
            .field("object", &self.object)
            .field("state", &self.state.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binding::Binding;

    fn generator() -> ProxyGenerator {
        ProxyGenerator::new(Arc::new(BridgeStats::default()))
    }

    fn car_spec() -> Arc<InterfaceSpec> {
        Arc::new(
            InterfaceSpec::new("Car")
                .with_binding(Binding::new("Car", "Car"))
                .with_operation(OperationSpec::forward("get_number_plate", 0).renamed("getNumberPlate"))
                .with_operation(OperationSpec::forward("set_number_plate", 1).renamed("setNumberPlate"))
                .with_operation(OperationSpec::native("describe", 0)),
        )
    }

    #[test]
    fn test_dispatch_table() {
        let proxy_type = generator()
            .generate(InterfaceKey::Named("Car".into()), &car_spec())
            .unwrap();

        assert_eq!(proxy_type.interface(), "Car");
        assert_eq!(
            proxy_type.forwarded_operations(),
            vec!["get_number_plate", "set_number_plate"]
        );
        let entry = proxy_type.lookup("set_number_plate").unwrap();
        assert_eq!(entry.foreign_name(), "setNumberPlate");
        assert_eq!(entry.arity(), 1);
        assert!(!proxy_type.forwards("describe"));
        assert!(proxy_type.lookup("drive").is_none());
    }

    #[test]
    fn test_generated_once_per_interface() {
        let generator = generator();
        let key = InterfaceKey::Named("Car".into());
        let first = generator.generate(key.clone(), &car_spec()).unwrap();
        let second = generator.generate(key, &car_spec()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(generator.len(), 1);
        assert_eq!(generator.stats.snapshot().proxy_types_generated, 1);
    }

    #[test]
    fn test_conflicting_operations_rejected() {
        let spec = Arc::new(
            InterfaceSpec::new("Car")
                .with_operation(OperationSpec::forward("plate", 0))
                .with_operation(OperationSpec::forward("plate", 1)),
        );
        let err = generator()
            .generate(InterfaceKey::Named("Car".into()), &spec)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProxyGeneration { .. }));
    }

    #[test]
    fn test_identical_duplicates_tolerated() {
        let spec = Arc::new(
            InterfaceSpec::new("Car")
                .with_operation(OperationSpec::forward("plate", 0))
                .with_operation(OperationSpec::forward("plate", 0)),
        );
        let proxy_type = generator()
            .generate(InterfaceKey::Named("Car".into()), &spec)
            .unwrap();
        assert_eq!(proxy_type.forwarded_operations(), vec!["plate"]);
    }

    #[test]
    fn test_invalid_foreign_name_rejected() {
        let spec = Arc::new(
            InterfaceSpec::new("Car")
                .with_operation(OperationSpec::forward("plate", 0).renamed("get-plate")),
        );
        let generator = generator();
        let err = generator
            .generate(InterfaceKey::Named("Car".into()), &spec)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProxyGeneration { .. }));
        assert!(generator.is_empty());
    }

    #[test]
    fn test_shared_foreign_name_needs_same_arity() {
        let spec = Arc::new(
            InterfaceSpec::new("Car")
                .with_operation(OperationSpec::forward("plate", 0).renamed("plate"))
                .with_operation(OperationSpec::forward("plate_with", 1).renamed("plate")),
        );
        let err = generator()
            .generate(InterfaceKey::Named("Car".into()), &spec)
            .unwrap_err();
        assert!(err.to_string().contains("different arity"));
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("getNumberPlate"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("x1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("get plate"));
    }
}
