//! Declarative binding metadata attached to native interfaces
//!
//! A `Binding` names the foreign module and class backing an interface.
//! `InterfaceSpec` adds the per-operation forwarding metadata. Specs are
//! produced by `#[foreign_interface]` (or built by hand for interfaces only
//! known at run time) and validated once, on first use, by `BindingResolver`.

use crate::core::value::ValueKind;
use crate::errors::{BridgeError, Result};
use crate::interop::ProxyInstance;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Module/class pair plus declared constructor argument types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    module_name: String,
    class_name: String,
    constructor_arg_types: Vec<ValueKind>,
}

impl Binding {
    pub fn new(module_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            class_name: class_name.into(),
            constructor_arg_types: Vec::new(),
        }
    }

    pub fn with_constructor_args(mut self, kinds: impl IntoIterator<Item = ValueKind>) -> Self {
        self.constructor_arg_types = kinds.into_iter().collect();
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn constructor_arg_types(&self) -> &[ValueKind] {
        &self.constructor_arg_types
    }

    /// `module.Class`, used in logs and error messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_name, self.class_name)
    }

    /// Both names must be present; a binding is never partially populated.
    pub fn validate(&self, interface: &str) -> Result<()> {
        if self.module_name.trim().is_empty() {
            return Err(BridgeError::configuration(interface, "binding has an empty module name"));
        }
        if self.module_name.split('.').any(|segment| segment.trim().is_empty()) {
            return Err(BridgeError::configuration(
                interface,
                format!("malformed module name '{}'", self.module_name),
            ));
        }
        if self.class_name.trim().is_empty() {
            return Err(BridgeError::configuration(interface, "binding has an empty class name"));
        }
        Ok(())
    }

    /// Declared constructor arity is only enforced when types were declared.
    pub fn check_arity(&self, supplied: usize) -> Result<()> {
        let declared = self.constructor_arg_types.len();
        if declared == 0 || declared == supplied {
            return Ok(());
        }
        Err(BridgeError::instantiation(
            self.qualified_name(),
            format!("expected {} constructor arguments, got {}", declared, supplied),
        ))
    }
}

/// Metadata of one operation of an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    name: String,
    foreign_name: Option<String>,
    arity: usize,
    forward: bool,
}

impl OperationSpec {
    /// Operation routed to the foreign object.
    pub fn forward(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            foreign_name: None,
            arity,
            forward: true,
        }
    }

    /// Operation implemented natively; never dispatched.
    pub fn native(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            foreign_name: None,
            arity,
            forward: false,
        }
    }

    /// Override the foreign method name.
    pub fn renamed(mut self, foreign_name: impl Into<String>) -> Self {
        self.foreign_name = Some(foreign_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Foreign method name; defaults to the operation's own name.
    pub fn foreign_name(&self) -> &str {
        self.foreign_name.as_deref().unwrap_or(&self.name)
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_forwarded(&self) -> bool {
        self.forward
    }
}

/// Full description of a native interface backed by a foreign class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    name: String,
    binding: Option<Binding>,
    operations: Vec<OperationSpec>,
}

impl InterfaceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: None,
            operations: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_operation(mut self, operation: OperationSpec) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// Binding needed to create instances.
    pub fn require_binding(&self) -> Result<&Binding> {
        self.binding.as_ref().ok_or_else(|| {
            BridgeError::configuration(
                &self.name,
                "interface carries no module/class binding",
            )
        })
    }

    pub fn operations(&self) -> &[OperationSpec] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn forwarded(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.iter().filter(|op| op.forward)
    }
}

/// Implemented (for `dyn Trait`) by `#[foreign_interface]`.
///
/// `Proxy` is the generated type implementing the trait by delegation.
pub trait ForeignInterface: 'static {
    type Proxy;

    fn spec() -> InterfaceSpec;

    fn wrap(instance: ProxyInstance) -> Self::Proxy;
}

/// Cache key of an interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InterfaceKey {
    Type(TypeId),
    /// Interfaces described at run time, keyed by their name.
    Named(String),
}

impl InterfaceKey {
    pub fn of<I: ForeignInterface + ?Sized>() -> Self {
        InterfaceKey::Type(TypeId::of::<I>())
    }
}

impl fmt::Display for InterfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceKey::Type(id) => write!(f, "{:?}", id),
            InterfaceKey::Named(name) => f.write_str(name),
        }
    }
}

/// Reads and caches interface metadata, one validated spec per interface.
#[derive(Default)]
pub struct BindingResolver {
    specs: DashMap<InterfaceKey, Arc<InterfaceSpec>>,
}

impl BindingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec of a compile-time interface.
    pub fn spec<I: ForeignInterface + ?Sized>(&self) -> Result<Arc<InterfaceSpec>> {
        self.resolve(InterfaceKey::of::<I>(), I::spec)
    }

    /// Register (or fetch the already registered) spec of a run-time interface.
    pub fn register(&self, spec: InterfaceSpec) -> Result<Arc<InterfaceSpec>> {
        let key = InterfaceKey::Named(spec.name().to_string());
        self.resolve(key, move || spec)
    }

    pub fn get(&self, key: &InterfaceKey) -> Option<Arc<InterfaceSpec>> {
        self.specs.get(key).map(|spec| Arc::clone(spec.value()))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    fn resolve(
        &self,
        key: InterfaceKey,
        read: impl FnOnce() -> InterfaceSpec,
    ) -> Result<Arc<InterfaceSpec>> {
        if let Some(spec) = self.specs.get(&key) {
            return Ok(Arc::clone(spec.value()));
        }

        match self.specs.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let spec = read();
                if let Some(binding) = spec.binding() {
                    binding.validate(spec.name())?;
                }
                let binding = spec.binding().map(Binding::qualified_name);
                tracing::debug!(
                    interface = spec.name(),
                    binding = ?binding,
                    operations = spec.operations().len(),
                    "resolved interface binding"
                );
                let spec = Arc::new(spec);
                entry.insert(Arc::clone(&spec));
                Ok(spec)
            }
        }
    }
}
