//! In-process object host
//!
//! `ScriptedRuntime` implements the interpreter seam without an interpreter:
//! modules and classes are defined with Rust closures, instances keep their
//! attributes in a map. It follows the same protocol as a real backend (an
//! import builtin returning the top-level module, attribute lookup, method
//! calls returning one or more values), so every bridge component can be
//! exercised without libpython. Each call into a state is counted, which lets
//! tests assert that a code path never reached the interpreter.

pub mod fixtures;

use crate::core::value::{ForeignObject, Value};
use crate::errors::ForeignError;
use crate::runtime::{ForeignRuntime, ForeignState};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

type InitFn = dyn Fn(&HostInstance, &[Value], &[(String, Value)]) -> Result<(), ForeignError>
    + Send
    + Sync;
type MethodFn = dyn Fn(&HostInstance, &[Value]) -> Result<Vec<Value>, ForeignError> + Send + Sync;

/// Class definition: constructor plus methods.
pub struct HostClass {
    name: String,
    init: Option<Box<InitFn>>,
    methods: HashMap<String, Box<MethodFn>>,
}

impl HostClass {
    /// Class whose constructor accepts no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init: None,
            methods: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&HostInstance, &[Value], &[(String, Value)]) -> Result<(), ForeignError>
            + Send
            + Sync
            + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&HostInstance, &[Value]) -> Result<Vec<Value>, ForeignError> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Box::new(method));
        self
    }

    /// Zero-argument method returning an attribute (`None` when unset).
    pub fn with_getter(self, name: impl Into<String>, attribute: &'static str) -> Self {
        self.with_method(name, move |instance, _| Ok(vec![instance.get(attribute)]))
    }

    /// One-argument method assigning an attribute; returns nothing.
    pub fn with_setter(self, name: impl Into<String>, attribute: &'static str) -> Self {
        let name = name.into();
        let method = name.clone();
        self.with_method(name, move |instance, args| match args {
            [value] => {
                instance.set(attribute, value.clone());
                Ok(Vec::new())
            }
            _ => Err(ForeignError::type_error(format!(
                "{}() takes 1 argument ({} given)",
                method,
                args.len()
            ))),
        })
    }

    fn construct(self: &Arc<Self>, args: &[Value], keywords: &[(String, Value)]) -> Result<HostInstance, ForeignError> {
        let instance = HostInstance {
            class: Arc::clone(self),
            attrs: Arc::new(Mutex::new(BTreeMap::new())),
        };
        match &self.init {
            Some(init) => init(&instance, args, keywords)?,
            None if args.is_empty() && keywords.is_empty() => {}
            None => {
                return Err(ForeignError::type_error(format!(
                    "{}() takes no arguments",
                    self.name
                )))
            }
        }
        Ok(instance)
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("methods", &methods)
            .finish()
    }
}

/// Live instance of a `HostClass`. Clones share attributes.
#[derive(Clone)]
pub struct HostInstance {
    class: Arc<HostClass>,
    attrs: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl HostInstance {
    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Attribute value; `Value::None` when never assigned.
    pub fn get(&self, name: &str) -> Value {
        self.attrs.lock().get(name).cloned().unwrap_or(Value::None)
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.attrs.lock().insert(name.into(), value);
    }

    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.attrs.lock().clone()
    }
}

impl fmt::Debug for HostInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostInstance")
            .field("class", &self.class.name)
            .field("attrs", &*self.attrs.lock())
            .finish()
    }
}

/// What a `ForeignObject` created by this host refers to.
#[derive(Debug, Clone)]
enum HostObject {
    Data(Value),
    Class(Arc<HostClass>),
    Instance(HostInstance),
    Module(String),
    Importer,
}

impl HostObject {
    fn into_foreign(self) -> ForeignObject {
        let type_name = match &self {
            HostObject::Data(value) => value.type_name().to_string(),
            HostObject::Class(_) => "type".to_string(),
            HostObject::Instance(instance) => instance.class_name().to_string(),
            HostObject::Module(_) => "module".to_string(),
            HostObject::Importer => "builtin_function_or_method".to_string(),
        };
        ForeignObject::new(self, type_name)
    }
}

#[derive(Default)]
struct Host {
    modules: RwLock<HashMap<String, HashMap<String, Arc<HostClass>>>>,
    states_created: AtomicUsize,
    interactions: AtomicUsize,
    path_extensions: AtomicUsize,
    refuse_states: AtomicBool,
}

impl Host {
    fn touch(&self) {
        self.interactions.fetch_add(1, Ordering::Relaxed);
    }

    /// A name is importable if it is a module or a package prefix of one.
    fn is_module(&self, name: &str) -> bool {
        let modules = self.modules.read();
        modules.contains_key(name)
            || modules
                .keys()
                .any(|m| m.len() > name.len() && m.starts_with(name) && m[name.len()..].starts_with('.'))
    }

    fn class(&self, module: &str, class: &str) -> Option<Arc<HostClass>> {
        self.modules.read().get(module)?.get(class).cloned()
    }
}

/// Scripted object host. Clones share modules and counters.
#[derive(Clone, Default)]
pub struct ScriptedRuntime {
    host: Arc<Host>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or extend) a module with the given classes.
    pub fn define_module(&self, name: impl Into<String>, classes: Vec<HostClass>) {
        let mut modules = self.host.modules.write();
        let module = modules.entry(name.into()).or_default();
        for class in classes {
            module.insert(class.name.clone(), Arc::new(class));
        }
    }

    /// Make every subsequent `create_state` call fail.
    pub fn refuse_states(&self, refuse: bool) {
        self.host.refuse_states.store(refuse, Ordering::Relaxed);
    }

    pub fn states_created(&self) -> usize {
        self.host.states_created.load(Ordering::Relaxed)
    }

    /// Number of calls made into any state of this host, plus state creations.
    pub fn interactions(&self) -> usize {
        self.host.interactions.load(Ordering::Relaxed)
    }

    /// Number of `extend_search_path` calls across all states.
    pub fn path_extensions(&self) -> usize {
        self.host.path_extensions.load(Ordering::Relaxed)
    }

    /// Borrow the instance behind a foreign object created by this host.
    pub fn instance(object: &ForeignObject) -> Option<&HostInstance> {
        match object.downcast_ref::<HostObject>()? {
            HostObject::Instance(instance) => Some(instance),
            _ => None,
        }
    }
}

impl ForeignRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create_state(&self) -> Result<Box<dyn ForeignState>, ForeignError> {
        self.host.touch();
        if self.host.refuse_states.load(Ordering::Relaxed) {
            return Err(ForeignError::new("SystemError", "state creation refused"));
        }
        self.host.states_created.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(ScriptedState {
            host: Arc::clone(&self.host),
            search_path: Mutex::new(Vec::new()),
        }))
    }
}

struct ScriptedState {
    host: Arc<Host>,
    search_path: Mutex<Vec<PathBuf>>,
}

impl ScriptedState {
    fn object<'a>(&self, object: &'a ForeignObject) -> Result<&'a HostObject, ForeignError> {
        object.downcast_ref::<HostObject>().ok_or_else(|| {
            ForeignError::type_error(format!(
                "object of type '{}' does not belong to this host",
                object.type_name()
            ))
        })
    }

    fn value_of(&self, object: &ForeignObject) -> Result<Value, ForeignError> {
        Ok(match self.object(object)? {
            HostObject::Data(value) => value.clone(),
            _ => Value::Object(object.clone()),
        })
    }

    fn values_of(&self, objects: &[ForeignObject]) -> Result<Vec<Value>, ForeignError> {
        objects.iter().map(|o| self.value_of(o)).collect()
    }

    fn import(&self, args: &[ForeignObject]) -> Result<ForeignObject, ForeignError> {
        let name = match args.first().map(|a| self.value_of(a)).transpose()? {
            Some(Value::Str(name)) => name,
            _ => return Err(ForeignError::type_error("__import__() argument 1 must be str")),
        };
        if !self.host.is_module(&name) {
            return Err(ForeignError::import_error(&name));
        }
        let root = name.split('.').next().unwrap_or(&name).to_string();
        Ok(HostObject::Module(root).into_foreign())
    }
}

impl ForeignState for ScriptedState {
    fn extend_search_path(&self, entries: &[PathBuf]) -> Result<(), ForeignError> {
        self.host.touch();
        self.host.path_extensions.fetch_add(1, Ordering::Relaxed);
        let mut path = self.search_path.lock();
        for entry in entries {
            if !path.contains(entry) {
                path.push(entry.clone());
            }
        }
        Ok(())
    }

    fn search_path(&self) -> Result<Vec<PathBuf>, ForeignError> {
        self.host.touch();
        Ok(self.search_path.lock().clone())
    }

    fn builtin(&self, name: &str) -> Result<ForeignObject, ForeignError> {
        self.host.touch();
        match name {
            "__import__" => Ok(HostObject::Importer.into_foreign()),
            _ => Err(ForeignError::new(
                "NameError",
                format!("name '{}' is not defined", name),
            )),
        }
    }

    fn call(
        &self,
        callable: &ForeignObject,
        args: &[ForeignObject],
        keywords: &[(String, ForeignObject)],
    ) -> Result<ForeignObject, ForeignError> {
        self.host.touch();
        match self.object(callable)? {
            HostObject::Importer => self.import(args),
            HostObject::Class(class) => {
                let args = self.values_of(args)?;
                let keywords = keywords
                    .iter()
                    .map(|(k, v)| self.value_of(v).map(|v| (k.clone(), v)))
                    .collect::<Result<Vec<_>, _>>()?;
                let instance = class.construct(&args, &keywords)?;
                Ok(HostObject::Instance(instance).into_foreign())
            }
            _ => Err(ForeignError::type_error(format!(
                "'{}' object is not callable",
                callable.type_name()
            ))),
        }
    }

    fn get_attr(&self, object: &ForeignObject, name: &str) -> Result<ForeignObject, ForeignError> {
        self.host.touch();
        match self.object(object)? {
            HostObject::Module(module) => {
                if let Some(class) = self.host.class(module, name) {
                    return Ok(HostObject::Class(class).into_foreign());
                }
                let submodule = format!("{}.{}", module, name);
                if self.host.is_module(&submodule) {
                    return Ok(HostObject::Module(submodule).into_foreign());
                }
                Err(ForeignError::new(
                    "AttributeError",
                    format!("module '{}' has no attribute '{}'", module, name),
                ))
            }
            HostObject::Instance(instance) => match instance.attrs.lock().get(name) {
                Some(Value::Object(inner)) => Ok(inner.clone()),
                Some(value) => Ok(HostObject::Data(value.clone()).into_foreign()),
                None => Err(ForeignError::attribute_error(instance.class_name(), name)),
            },
            _ => Err(ForeignError::attribute_error(object.type_name(), name)),
        }
    }

    fn call_method(
        &self,
        object: &ForeignObject,
        name: &str,
        args: &[ForeignObject],
    ) -> Result<Vec<ForeignObject>, ForeignError> {
        self.host.touch();
        let instance = match self.object(object)? {
            HostObject::Instance(instance) => instance,
            _ => return Err(ForeignError::attribute_error(object.type_name(), name)),
        };
        let method = instance
            .class
            .methods
            .get(name)
            .ok_or_else(|| ForeignError::attribute_error(instance.class_name(), name))?;

        let args = self.values_of(args)?;
        let results = method(instance, &args)?;
        results.iter().map(|v| self.to_foreign(v)).collect()
    }

    fn to_foreign(&self, value: &Value) -> Result<ForeignObject, ForeignError> {
        self.host.touch();
        match value {
            Value::Object(object) => Ok(object.clone()),
            Value::Float(f) if !f.is_finite() => Err(ForeignError::new(
                "ValueError",
                format!("cannot store non-finite float {}", f),
            )),
            other => Ok(HostObject::Data(other.clone()).into_foreign()),
        }
    }

    fn to_native(&self, object: &ForeignObject) -> Result<Value, ForeignError> {
        self.host.touch();
        self.value_of(object)
    }

    fn coerce(&self, object: &ForeignObject) -> Result<Value, ForeignError> {
        self.host.touch();
        match self.object(object)? {
            HostObject::Data(value) => Ok(value.clone()),
            HostObject::Instance(instance) => Ok(Value::Map(instance.attributes())),
            _ => Err(ForeignError::type_error(format!(
                "'{}' object has no native form",
                object.type_name()
            ))),
        }
    }
}
