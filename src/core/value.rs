//! Native value model shared by every component of the bridge
//!
//! `Value` is what native code sees; `ForeignObject` is an opaque reference
//! to something living inside the interpreter. Conversions between Rust
//! types and `Value` go through `IntoValue` / `FromValue`.

use crate::errors::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a living object inside the interpreter.
///
/// The native side only holds a reference sufficient to issue further calls;
/// dropping the handle never finalizes the foreign object.
#[derive(Clone)]
pub struct ForeignObject {
    handle: Arc<dyn Any + Send + Sync>,
    type_name: Arc<str>,
}

impl ForeignObject {
    /// Wrap a backend-specific handle.
    pub fn new<T: Any + Send + Sync>(handle: T, type_name: impl Into<Arc<str>>) -> Self {
        Self {
            handle: Arc::new(handle),
            type_name: type_name.into(),
        }
    }

    /// Type name reported by the interpreter.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the backend handle, if it was created by that backend.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.handle).downcast_ref::<T>()
    }

    /// Whether both handles refer to the same wrapped reference.
    pub fn ptr_eq(&self, other: &ForeignObject) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }
}

impl fmt::Debug for ForeignObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ForeignObject({} @ {:p})",
            self.type_name,
            Arc::as_ptr(&self.handle) as *const ()
        )
    }
}

/// Native representation of a value crossing the bridge.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Foreign object without a primitive native form.
    Object(ForeignObject),
}

impl Value {
    /// Type name used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::None => ValueKind::None,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ForeignObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Structural JSON form of the value.
    ///
    /// Foreign objects and non-finite floats have no JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| BridgeError::conversion("float", format!("{} is not finite", f)))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(entries) => {
                let mut object = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    object.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(object)
            }
            Value::Object(object) => {
                return Err(BridgeError::conversion(
                    object.type_name(),
                    "foreign object has no structural native form",
                ))
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::None
    }
}

/// Declared type of a value, used for constructor argument metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Any,
    None,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Object,
}

impl ValueKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::None => "none",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Map => "map",
            Self::Object => "object",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "any" => Self::Any,
            "none" => Self::None,
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "str" => Self::Str,
            "list" => Self::List,
            "map" => Self::Map,
            "object" => Self::Object,
            _ => return None,
        })
    }

    /// Whether `value` is acceptable where this kind is declared.
    pub fn accepts(self, value: &Value) -> bool {
        self == Self::Any || value.kind() == self
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert a Rust value into a bridge `Value`.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Convert a bridge `Value` back into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(value: &Value, expected: &str) -> BridgeError {
    BridgeError::conversion(value.type_name(), format!("expected {}", expected))
}

/// Build a `Vec<Value>` from heterogeneous Rust values.
///
/// ```ignore
/// let args = pyproxy::args![1, "name", "address"];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::IntoValue::into_value($arg)),+]
    };
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for &Value {
    fn into_value(self) -> Value {
        self.clone()
    }
}

impl IntoValue for ForeignObject {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl IntoValue for &ForeignObject {
    fn into_value(self) -> Value {
        Value::Object(self.clone())
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::None
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

macro_rules! int_into_value {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::Int(self as i64)
                }
            }
        )*
    };
}

int_into_value!(i8, i16, i32, i64, isize, u8, u16, u32);

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(self as f64)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Str(self.clone())
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::None,
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue + Clone> IntoValue for &[T] {
    fn into_value(self) -> Value {
        Value::List(self.iter().cloned().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for ForeignObject {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(object),
            other => Err(mismatch(&other, "foreign object")),
        }
    }
}

// Results of calls whose return value is ignored.
impl FromValue for () {
    fn from_value(_value: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(&other, "bool")),
        }
    }
}

macro_rules! int_from_value {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(i) => <$t>::try_from(i).map_err(|_| {
                            BridgeError::conversion(
                                "int",
                                format!("{} is out of range for {}", i, stringify!($t)),
                            )
                        }),
                        other => Err(mismatch(&other, stringify!($t))),
                    }
                }
            }
        )*
    };
}

int_from_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch(&other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(&other, "str")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch(&other, "list")),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch(&other, "map")),
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch(&other, "map")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_macro() {
        let args = crate::args![1, "name", 2.5, true, None::<i32>];
        assert_eq!(
            args,
            vec![
                Value::Int(1),
                Value::Str("name".to_string()),
                Value::Float(2.5),
                Value::Bool(true),
                Value::None,
            ]
        );
        assert!(crate::args![].is_empty());
    }

    #[test]
    fn test_int_range_checked() {
        assert_eq!(i32::from_value(Value::Int(42)).unwrap(), 42);

        let err = u8::from_value(Value::Int(300)).unwrap_err();
        assert!(matches!(err, BridgeError::Conversion { .. }));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_mismatch_names_offending_type() {
        let err = String::from_value(Value::Int(7)).unwrap_err();
        match err {
            BridgeError::Conversion { type_name, .. } => assert_eq!(type_name, "int"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_option_maps_none() {
        assert_eq!(Option::<String>::from_value(Value::None).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::Str("PLATE-1".into())).unwrap(),
            Some("PLATE-1".to_string())
        );
    }

    #[test]
    fn test_float_accepts_int() {
        assert_eq!(f64::from_value(Value::Int(3)).unwrap(), 3.0);
        assert!(i64::from_value(Value::Float(3.0)).is_err());
    }

    #[test]
    fn test_nested_collections() {
        let value = vec![vec![1i64, 2], vec![3]].into_value();
        let back: Vec<Vec<i64>> = FromValue::from_value(value).unwrap();
        assert_eq!(back, vec![vec![1, 2], vec![3]]);

        let mut map = BTreeMap::new();
        map.insert("id".to_string(), 1);
        let back: HashMap<String, i32> = FromValue::from_value(map.into_value()).unwrap();
        assert_eq!(back.get("id"), Some(&1));
    }

    #[test]
    fn test_foreign_object_identity() {
        let a = ForeignObject::new(5u32, "int");
        let b = a.clone();
        let c = ForeignObject::new(5u32, "int");

        assert_eq!(Value::Object(a.clone()), Value::Object(b));
        assert_ne!(Value::Object(a.clone()), Value::Object(c));
        assert_eq!(a.downcast_ref::<u32>(), Some(&5));
        assert!(a.downcast_ref::<String>().is_none());
        assert_eq!(Value::Object(a).type_name(), "int");
    }

    #[test]
    fn test_to_json() {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::Int(1));
        map.insert("name".to_string(), Value::None);
        let json = Value::Map(map).to_json().unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": null}));

        let object = Value::Object(ForeignObject::new((), "Car"));
        assert!(object.to_json().is_err());
        assert!(Value::Float(f64::NAN).to_json().is_err());
    }

    #[test]
    fn test_value_kind_accepts() {
        assert!(ValueKind::Any.accepts(&Value::Int(1)));
        assert!(ValueKind::Str.accepts(&Value::Str("x".into())));
        assert!(!ValueKind::Str.accepts(&Value::Int(1)));
        assert_eq!(ValueKind::parse("float"), Some(ValueKind::Float));
        assert_eq!(ValueKind::parse("decimal"), None);
    }
}
