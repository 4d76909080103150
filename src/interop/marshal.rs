//! Value marshalling - native <-> foreign conversions
//!
//! Arguments are converted element-wise into a small inline buffer; most
//! calls carry fewer than four arguments. Results follow the collapse rule:
//! no value maps to `Value::None`, a single value is unwrapped, and several
//! values come back as a `Value::List`.

use crate::core::value::{ForeignObject, Value};
use crate::errors::{BridgeError, Result};
use crate::runtime::ForeignState;
use smallvec::SmallVec;

/// Positional and keyword arguments in the interpreter's representation.
#[derive(Debug, Clone, Default)]
pub struct MarshalledArgs {
    positional: SmallVec<[ForeignObject; 4]>,
    keywords: Vec<(String, ForeignObject)>,
}

impl MarshalledArgs {
    pub fn positional(&self) -> &[ForeignObject] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, ForeignObject)] {
        &self.keywords
    }

    /// Total number of arguments, positional and keyword.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ValueMarshaller;

impl ValueMarshaller {
    /// Convert positional arguments, preserving order.
    pub fn to_foreign(state: &dyn ForeignState, args: &[Value]) -> Result<MarshalledArgs> {
        Self::to_foreign_with_keywords(state, args, &[])
    }

    /// Convert positional and keyword arguments.
    pub fn to_foreign_with_keywords(
        state: &dyn ForeignState,
        args: &[Value],
        keywords: &[(String, Value)],
    ) -> Result<MarshalledArgs> {
        let mut marshalled = MarshalledArgs {
            positional: SmallVec::with_capacity(args.len()),
            keywords: Vec::with_capacity(keywords.len()),
        };

        for value in args {
            marshalled.positional.push(Self::one_to_foreign(state, value)?);
        }
        for (name, value) in keywords {
            marshalled
                .keywords
                .push((name.clone(), Self::one_to_foreign(state, value)?));
        }
        Ok(marshalled)
    }

    /// Convert call results back, applying the collapse rule.
    pub fn to_native(state: &dyn ForeignState, results: &[ForeignObject]) -> Result<Value> {
        match results {
            [] => Ok(Value::None),
            [single] => Self::one_to_native(state, single),
            many => Self::to_native_each(state, many).map(Value::List),
        }
    }

    /// Convert every result without collapsing.
    pub fn to_native_each(state: &dyn ForeignState, results: &[ForeignObject]) -> Result<Vec<Value>> {
        results
            .iter()
            .map(|object| Self::one_to_native(state, object))
            .collect()
    }

    fn one_to_foreign(state: &dyn ForeignState, value: &Value) -> Result<ForeignObject> {
        // Foreign objects pass through untouched.
        if let Value::Object(object) = value {
            return Ok(object.clone());
        }
        state
            .to_foreign(value)
            .map_err(|e| BridgeError::conversion(value.type_name(), e.to_string()))
    }

    fn one_to_native(state: &dyn ForeignState, object: &ForeignObject) -> Result<Value> {
        state
            .to_native(object)
            .map_err(|e| BridgeError::conversion(object.type_name(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ForeignRuntime;
    use crate::testing::ScriptedRuntime;

    fn state() -> Box<dyn ForeignState> {
        ScriptedRuntime::new().create_state().unwrap()
    }

    #[test]
    fn test_empty_args() {
        let state = state();
        let args = ValueMarshaller::to_foreign(state.as_ref(), &[]).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let state = state();
        let values = vec![
            Value::Int(1),
            Value::Str("A".into()),
            Value::Bool(true),
            Value::None,
            Value::Float(2.5),
        ];
        let args = ValueMarshaller::to_foreign(state.as_ref(), &values).unwrap();
        assert_eq!(args.positional().len(), 5);

        let back = ValueMarshaller::to_native_each(state.as_ref(), args.positional()).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_keywords() {
        let state = state();
        let args = ValueMarshaller::to_foreign_with_keywords(
            state.as_ref(),
            &[Value::Int(1)],
            &[("name".to_string(), Value::Str("A".into()))],
        )
        .unwrap();

        assert_eq!(args.len(), 2);
        assert_eq!(args.keywords()[0].0, "name");
    }

    #[test]
    fn test_collapse_rule() {
        let state = state();
        let state = state.as_ref();
        let foreign = |v: Value| state.to_foreign(&v).unwrap();

        assert_eq!(ValueMarshaller::to_native(state, &[]).unwrap(), Value::None);
        assert_eq!(
            ValueMarshaller::to_native(state, &[foreign(Value::Str("ABC".into()))]).unwrap(),
            Value::Str("ABC".into())
        );
        assert_eq!(
            ValueMarshaller::to_native(
                state,
                &[foreign(Value::Int(1)), foreign(Value::Int(2))]
            )
            .unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_foreign_objects_pass_through() {
        let state = state();
        let object = ForeignObject::new(7u8, "opaque");
        let args =
            ValueMarshaller::to_foreign(state.as_ref(), &[Value::Object(object.clone())]).unwrap();
        assert!(args.positional()[0].ptr_eq(&object));
    }

    #[test]
    fn test_unconvertible_value_is_conversion_error() {
        let state = state();
        let err = ValueMarshaller::to_foreign(state.as_ref(), &[Value::Float(f64::NAN)]).unwrap_err();
        assert!(matches!(err, BridgeError::Conversion { .. }));
    }
}
