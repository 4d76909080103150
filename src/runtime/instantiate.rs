//! Constructor invocation and direct coercion

use super::registry::RuntimeState;
use super::resolver::ResolvedClass;
use crate::core::value::ForeignObject;
use crate::errors::{BridgeError, Result};
use crate::interop::marshal::MarshalledArgs;
use serde::de::DeserializeOwned;

pub struct ForeignInstantiator;

impl ForeignInstantiator {
    /// Call the foreign class with already marshalled arguments.
    ///
    /// A raising constructor surfaces as `BridgeError::Instantiation`; nothing
    /// is retried since the constructor may have mutated interpreter state.
    pub fn instantiate(
        state: &RuntimeState,
        class: &ResolvedClass,
        args: &MarshalledArgs,
    ) -> Result<ForeignObject> {
        let object = state
            .with(|f| f.call(&class.callable, args.positional(), args.keywords()))
            .map_err(|e| BridgeError::instantiation(&class.qualified_name, e.to_string()))?;

        tracing::debug!(
            state = state.id(),
            class = %class.qualified_name,
            args = args.len(),
            "instantiated foreign object"
        );
        Ok(object)
    }

    /// Coerce a foreign object directly into a native type.
    ///
    /// The object's structural form (attributes or primitive value) is read
    /// from the interpreter and deserialized into `T`.
    pub fn coerce_to_native<T: DeserializeOwned>(
        state: &RuntimeState,
        object: &ForeignObject,
    ) -> Result<T> {
        let target = std::any::type_name::<T>();
        let coercion_error =
            |message: String| BridgeError::coercion(object.type_name(), target, message);

        let native = state
            .with(|f| f.coerce(object))
            .map_err(|e| coercion_error(e.to_string()))?;
        let json = native.to_json().map_err(|e| coercion_error(e.to_string()))?;
        serde_json::from_value(json).map_err(|e| coercion_error(e.to_string()))
    }
}
