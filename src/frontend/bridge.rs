//! Top-level factory
//!
//! `Bridge` ties the components together and is the entry point callers
//! hold on to. Two creation modes are offered:
//!
//! - Mode A, `create_instance`: instantiate a foreign class and coerce the
//!   object straight into a native value. No proxy is involved.
//! - Mode B, `create_proxy_instance`: instantiate the class bound to an
//!   interface and hand back the generated proxy implementing it.

use super::config::{BridgeConfig, StateMode};
use crate::core::binding::{Binding, BindingResolver, ForeignInterface, InterfaceKey, InterfaceSpec};
use crate::core::value::{ForeignObject, Value};
use crate::errors::Result;
use crate::infrastructure::metrics::{BridgeStats, StatsSnapshot};
use crate::interop::marshal::ValueMarshaller;
use crate::interop::proxy::{ProxyGenerator, ProxyInstance};
use crate::runtime::{
    ForeignInstantiator, ForeignRuntime, RuntimeState, RuntimeStateRegistry, StateKey, SymbolResolver,
};
use serde::de::DeserializeOwned;
use std::any::{type_name, TypeId};
use std::sync::Arc;

pub struct Bridge {
    config: BridgeConfig,
    bindings: BindingResolver,
    proxies: ProxyGenerator,
    registry: RuntimeStateRegistry,
    stats: Arc<BridgeStats>,
}

impl Bridge {
    pub fn new(runtime: Arc<dyn ForeignRuntime>, config: BridgeConfig) -> Self {
        let stats = Arc::new(BridgeStats::new());
        tracing::debug!(runtime = runtime.name(), mode = ?config.state.mode, "bridge created");
        Self {
            registry: RuntimeStateRegistry::new(runtime, config.paths.clone(), Arc::clone(&stats)),
            proxies: ProxyGenerator::new(Arc::clone(&stats)),
            bindings: BindingResolver::new(),
            config,
            stats,
        }
    }

    /// Bridge configured from the nearest `pyproxy.toml`, if any.
    pub fn discover(runtime: Arc<dyn ForeignRuntime>) -> Self {
        Self::new(runtime, BridgeConfig::discover())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuntimeStateRegistry {
        &self.registry
    }

    pub fn bindings(&self) -> &BindingResolver {
        &self.bindings
    }

    pub fn proxies(&self) -> &ProxyGenerator {
        &self.proxies
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Release every cached interpreter state.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    /// Mode A: instantiate `module.class` and coerce the object into `T`.
    pub fn create_instance<T>(&self, module_name: &str, class_name: &str, args: &[Value]) -> Result<T>
    where
        T: DeserializeOwned + 'static,
    {
        let target = type_name::<T>();
        let result = (|| -> Result<T> {
            let binding = Binding::new(module_name, class_name);
            binding.validate(target)?;

            let state = self.registry.get(self.state_key(StateKey::Type(TypeId::of::<T>())))?;
            let class = SymbolResolver::resolve_binding(&state, &binding)?;
            let marshalled = state.with(|f| ValueMarshaller::to_foreign(f, args))?;
            let object = ForeignInstantiator::instantiate(&state, &class, &marshalled)?;
            let value = ForeignInstantiator::coerce_to_native::<T>(&state, &object)?;

            self.stats.record_instance();
            tracing::debug!(class = %class.qualified_name, target, "created native instance");
            Ok(value)
        })();
        self.observe("create_instance", target, result)
    }

    /// Mode B: instantiate the class bound to `I` and return its proxy.
    pub fn create_proxy_instance<I>(&self, args: &[Value]) -> Result<I::Proxy>
    where
        I: ForeignInterface + ?Sized,
    {
        self.create_proxy_instance_with_keywords::<I>(args, &[])
    }

    /// Mode B with keyword constructor arguments.
    pub fn create_proxy_instance_with_keywords<I>(
        &self,
        args: &[Value],
        keywords: &[(String, Value)],
    ) -> Result<I::Proxy>
    where
        I: ForeignInterface + ?Sized,
    {
        let result = self.bindings.spec::<I>().and_then(|spec| {
            self.instantiate_proxy(
                InterfaceKey::of::<I>(),
                StateKey::Type(TypeId::of::<I>()),
                &spec,
                args,
                keywords,
            )
        });
        self.observe("create_proxy_instance", type_name::<I>(), result)
            .map(I::wrap)
    }

    /// Mode B for an interface described at run time.
    ///
    /// The first spec registered under a name wins; later specs with the
    /// same name reuse it.
    pub fn create_dynamic_proxy(&self, spec: InterfaceSpec, args: &[Value]) -> Result<ProxyInstance> {
        let name = spec.name().to_string();
        let result = self.bindings.register(spec).and_then(|spec| {
            self.instantiate_proxy(
                InterfaceKey::Named(name.clone()),
                StateKey::Named(name.clone()),
                &spec,
                args,
                &[],
            )
        });
        self.observe("create_dynamic_proxy", &name, result)
    }

    /// View an existing foreign object (for example one returned by a
    /// forwarded call) through interface `I`. No binding is required.
    pub fn wrap<I>(&self, object: ForeignObject, state: Arc<RuntimeState>) -> Result<I::Proxy>
    where
        I: ForeignInterface + ?Sized,
    {
        let result = self.bindings.spec::<I>().and_then(|spec| {
            let proxy_type = self.proxies.generate(InterfaceKey::of::<I>(), &spec)?;
            Ok(ProxyInstance::new(proxy_type, object, state, Arc::clone(&self.stats)))
        });
        self.observe("wrap", type_name::<I>(), result).map(I::wrap)
    }

    fn instantiate_proxy(
        &self,
        key: InterfaceKey,
        state_key: StateKey,
        spec: &Arc<InterfaceSpec>,
        args: &[Value],
        keywords: &[(String, Value)],
    ) -> Result<ProxyInstance> {
        // Everything that can fail without the interpreter is checked first.
        let binding = spec.require_binding()?;
        if self.config.instantiation.check_arity {
            binding.check_arity(args.len() + keywords.len())?;
        }
        let proxy_type = self.proxies.generate(key, spec)?;

        let state = self.registry.get(self.state_key(state_key))?;
        let class = SymbolResolver::resolve_binding(&state, binding)?;
        let marshalled =
            state.with(|f| ValueMarshaller::to_foreign_with_keywords(f, args, keywords))?;
        let object = ForeignInstantiator::instantiate(&state, &class, &marshalled)?;

        self.stats.record_instance();
        tracing::debug!(
            interface = spec.name(),
            class = %class.qualified_name,
            state = state.id(),
            "created proxy instance"
        );
        Ok(ProxyInstance::new(proxy_type, object, state, Arc::clone(&self.stats)))
    }

    fn state_key(&self, per_interface: StateKey) -> StateKey {
        match self.config.state.mode {
            StateMode::Shared => StateKey::Global,
            StateMode::PerInterface => per_interface,
        }
    }

    fn observe<T>(&self, operation: &'static str, subject: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.stats.record_failure();
            tracing::warn!(operation, subject, kind = e.kind(), error = %e, "bridge operation failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binding::OperationSpec;
    use crate::errors::BridgeError;
    use crate::testing::fixtures::{self, Building, Car};
    use crate::testing::ScriptedRuntime;

    fn bridge(runtime: &ScriptedRuntime) -> Bridge {
        Bridge::new(Arc::new(runtime.clone()), BridgeConfig::isolated())
    }

    #[test]
    fn test_create_instance_coerces() {
        let runtime = fixtures::runtime();
        let bridge = bridge(&runtime);

        let building: Building = bridge
            .create_instance("Building", "Building", &crate::args![1, "name", "address"])
            .unwrap();
        assert_eq!(building.id, 1);
        assert_eq!(building.name, "name");
        assert_eq!(building.address, "address");
        assert_eq!(bridge.stats().instances_created, 1);
    }

    #[test]
    fn test_create_instance_rejects_empty_names() {
        let runtime = fixtures::runtime();
        let bridge = bridge(&runtime);

        let err = bridge.create_instance::<Building>("", "Building", &[]).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration { .. }));
        assert_eq!(runtime.interactions(), 0);
    }

    #[test]
    fn test_state_per_interface() {
        let runtime = fixtures::runtime();
        let bridge = bridge(&runtime);

        let car = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();
        let other = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();
        let _: Building = bridge
            .create_instance("Building", "Building", &crate::args![1, "a", "b"])
            .unwrap();

        assert_eq!(car.instance().state().id(), other.instance().state().id());
        assert_eq!(bridge.registry().len(), 2);
        assert_eq!(runtime.states_created(), 2);
    }

    #[test]
    fn test_shared_state_mode() {
        let runtime = fixtures::runtime();
        let mut config = BridgeConfig::isolated();
        config.state.mode = StateMode::Shared;
        let bridge = Bridge::new(Arc::new(runtime.clone()), config);

        let _ = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();
        let _: Building = bridge
            .create_instance("Building", "Building", &crate::args![1, "a", "b"])
            .unwrap();

        assert_eq!(bridge.registry().len(), 1);
        assert!(bridge.registry().contains(&StateKey::Global));
    }

    #[test]
    fn test_declared_arity_checked_before_interpreter() {
        let runtime = fixtures::runtime();
        let bridge = bridge(&runtime);
        let spec = InterfaceSpec::new("TypedBuilding").with_binding(
            Binding::new("Building", "Building").with_constructor_args([
                crate::ValueKind::Int,
                crate::ValueKind::Str,
                crate::ValueKind::Str,
            ]),
        );

        let err = bridge.create_dynamic_proxy(spec, &crate::args![1]).unwrap_err();
        assert!(matches!(err, BridgeError::Instantiation { .. }));
        assert_eq!(runtime.interactions(), 0);
    }

    #[test]
    fn test_arity_check_can_be_disabled() {
        let runtime = fixtures::runtime();
        let mut config = BridgeConfig::isolated();
        config.instantiation.check_arity = false;
        let bridge = Bridge::new(Arc::new(runtime.clone()), config);
        let spec = InterfaceSpec::new("TypedCar").with_binding(
            Binding::new("Car", "Car").with_constructor_args([crate::ValueKind::Str]),
        );

        // Car's plate is optional on the foreign side.
        assert!(bridge.create_dynamic_proxy(spec, &[]).is_ok());
    }

    #[test]
    fn test_dynamic_proxy() {
        let runtime = fixtures::runtime();
        let bridge = bridge(&runtime);
        let spec = InterfaceSpec::new("Plated")
            .with_binding(Binding::new("Car", "Car"))
            .with_operation(OperationSpec::forward("plate", 0).renamed("getNumberPlate"));

        let proxy = bridge
            .create_dynamic_proxy(spec, &crate::args!["DYN-1"])
            .unwrap();
        assert_eq!(proxy.invoke("plate", &[]).unwrap(), Value::Str("DYN-1".into()));
        assert_eq!(bridge.proxies().len(), 1);
    }

    #[test]
    fn test_failures_are_counted() {
        let runtime = fixtures::runtime();
        let bridge = bridge(&runtime);
        let spec = InterfaceSpec::new("Missing").with_binding(Binding::new("Garage", "Garage"));

        let err = bridge.create_dynamic_proxy(spec, &[]).unwrap_err();
        assert!(matches!(err, BridgeError::Lookup { .. }));
        assert_eq!(bridge.stats().failures, 1);
        assert_eq!(bridge.stats().instances_created, 0);
    }

    #[test]
    fn test_shutdown_releases_states() {
        let runtime = fixtures::runtime();
        let bridge = bridge(&runtime);
        let car = bridge.create_proxy_instance::<dyn Car>(&crate::args!["KEEP"]).unwrap();

        bridge.shutdown();
        assert!(bridge.registry().is_empty());
        // Live proxies keep their own state alive.
        assert_eq!(car.get_number_plate().unwrap().as_deref(), Some("KEEP"));
    }
}
