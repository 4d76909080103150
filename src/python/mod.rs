//! CPython backend
//!
//! Embeds CPython through pyo3. CPython runs one interpreter per process,
//! so every `PythonState` shares `sys.path` and `sys.modules`; a state is a
//! handle on that interpreter with its own builtins reference. All calls
//! acquire the GIL.

use crate::core::value::{ForeignObject, Value};
use crate::errors::ForeignError;
use crate::runtime::{ForeignRuntime, ForeignState};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyList, PyLong, PyString, PyTuple};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Python object reference stored inside a `ForeignObject`.
struct PyHandle(Py<PyAny>);

fn foreign_error(py: Python<'_>, err: PyErr) -> ForeignError {
    let kind = err
        .get_type_bound(py)
        .getattr("__name__")
        .and_then(|name| name.extract::<String>())
        .unwrap_or_else(|_| "Exception".to_string());
    ForeignError::new(kind, err.value_bound(py).to_string())
}

fn type_name(object: &Bound<'_, PyAny>) -> String {
    object
        .get_type()
        .getattr("__name__")
        .and_then(|name| name.extract::<String>())
        .unwrap_or_else(|_| "object".to_string())
}

fn wrap(object: Bound<'_, PyAny>) -> ForeignObject {
    let name = type_name(&object);
    ForeignObject::new(PyHandle(object.unbind()), name)
}

fn unwrap<'py>(py: Python<'py>, object: &ForeignObject) -> Result<Bound<'py, PyAny>, ForeignError> {
    object
        .downcast_ref::<PyHandle>()
        .map(|handle| handle.0.bind(py).clone())
        .ok_or_else(|| {
            ForeignError::type_error(format!(
                "object of type '{}' was not created by the Python backend",
                object.type_name()
            ))
        })
}

/// Embedded CPython.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonRuntime;

impl PythonRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl ForeignRuntime for PythonRuntime {
    fn name(&self) -> &str {
        "cpython"
    }

    fn create_state(&self) -> Result<Box<dyn ForeignState>, ForeignError> {
        Python::with_gil(|py| {
            let builtins = PyModule::import_bound(py, "builtins").map_err(|e| foreign_error(py, e))?;
            Ok(Box::new(PythonState {
                builtins: builtins.into_any().unbind(),
            }) as Box<dyn ForeignState>)
        })
    }
}

pub struct PythonState {
    builtins: Py<PyAny>,
}

impl PythonState {
    fn sys_path<'py>(py: Python<'py>) -> PyResult<Bound<'py, PyList>> {
        let sys = PyModule::import_bound(py, "sys")?;
        Ok(sys.getattr("path")?.downcast_into::<PyList>()?)
    }

    fn value_to_py(py: Python<'_>, value: &Value) -> Result<PyObject, ForeignError> {
        Ok(match value {
            Value::None => py.None(),
            Value::Bool(b) => b.to_object(py),
            Value::Int(i) => i.to_object(py),
            Value::Float(f) => f.to_object(py),
            Value::Str(s) => s.to_object(py),
            Value::List(items) => {
                let items = items
                    .iter()
                    .map(|item| Self::value_to_py(py, item))
                    .collect::<Result<Vec<_>, _>>()?;
                PyList::new_bound(py, items).into_any().unbind()
            }
            Value::Map(entries) => {
                let dict = PyDict::new_bound(py);
                for (key, item) in entries {
                    dict.set_item(key, Self::value_to_py(py, item)?)
                        .map_err(|e| foreign_error(py, e))?;
                }
                dict.into_any().unbind()
            }
            Value::Object(object) => unwrap(py, object)?.unbind(),
        })
    }

    fn py_to_value(py: Python<'_>, object: &Bound<'_, PyAny>) -> Result<Value, ForeignError> {
        let extract_err = |e: PyErr| foreign_error(py, e);

        if object.is_none() {
            return Ok(Value::None);
        }
        // bool is a subclass of int in Python
        if object.is_instance_of::<PyBool>() {
            return object.extract::<bool>().map(Value::Bool).map_err(extract_err);
        }
        if object.is_instance_of::<PyLong>() {
            return object.extract::<i64>().map(Value::Int).map_err(extract_err);
        }
        if object.is_instance_of::<PyFloat>() {
            return object.extract::<f64>().map(Value::Float).map_err(extract_err);
        }
        if object.is_instance_of::<PyString>() {
            return object.extract::<String>().map(Value::Str).map_err(extract_err);
        }
        if let Ok(list) = object.downcast::<PyList>() {
            return list
                .iter()
                .map(|item| Self::py_to_value(py, &item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List);
        }
        if let Ok(tuple) = object.downcast::<PyTuple>() {
            return tuple
                .iter()
                .map(|item| Self::py_to_value(py, &item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List);
        }
        if let Ok(dict) = object.downcast::<PyDict>() {
            let mut entries = BTreeMap::new();
            for (key, item) in dict.iter() {
                let key = key.extract::<String>().map_err(|_| {
                    ForeignError::type_error(format!(
                        "dict key of type '{}' is not a string",
                        type_name(&key)
                    ))
                })?;
                entries.insert(key, Self::py_to_value(py, &item)?);
            }
            return Ok(Value::Map(entries));
        }
        Ok(Value::Object(wrap(object.clone())))
    }

    /// Public, non-callable instance attributes.
    fn attributes(py: Python<'_>, object: &Bound<'_, PyAny>) -> Result<Value, ForeignError> {
        let dict = object
            .getattr("__dict__")
            .and_then(|d| Ok(d.downcast_into::<PyDict>()?))
            .map_err(|e| foreign_error(py, e))?;

        let mut entries = BTreeMap::new();
        for (key, item) in dict.iter() {
            let key = match key.extract::<String>() {
                Ok(key) if !key.starts_with('_') => key,
                _ => continue,
            };
            if item.is_callable() {
                continue;
            }
            entries.insert(key, Self::py_to_value(py, &item)?);
        }
        Ok(Value::Map(entries))
    }
}

impl ForeignState for PythonState {
    fn extend_search_path(&self, entries: &[PathBuf]) -> Result<(), ForeignError> {
        Python::with_gil(|py| {
            let path = Self::sys_path(py).map_err(|e| foreign_error(py, e))?;
            for entry in entries {
                let entry = entry.to_string_lossy().into_owned();
                let present = path.contains(&entry).map_err(|e| foreign_error(py, e))?;
                if !present {
                    path.append(&entry).map_err(|e| foreign_error(py, e))?;
                }
            }
            Ok(())
        })
    }

    fn search_path(&self) -> Result<Vec<PathBuf>, ForeignError> {
        Python::with_gil(|py| {
            let path = Self::sys_path(py).map_err(|e| foreign_error(py, e))?;
            path.iter()
                .map(|entry| entry.extract::<String>().map(PathBuf::from))
                .collect::<PyResult<Vec<_>>>()
                .map_err(|e| foreign_error(py, e))
        })
    }

    fn builtin(&self, name: &str) -> Result<ForeignObject, ForeignError> {
        Python::with_gil(|py| {
            self.builtins
                .bind(py)
                .getattr(name)
                .map(wrap)
                .map_err(|e| foreign_error(py, e))
        })
    }

    fn call(
        &self,
        callable: &ForeignObject,
        args: &[ForeignObject],
        keywords: &[(String, ForeignObject)],
    ) -> Result<ForeignObject, ForeignError> {
        Python::with_gil(|py| {
            let callable = unwrap(py, callable)?;
            let args = args
                .iter()
                .map(|arg| unwrap(py, arg))
                .collect::<Result<Vec<_>, _>>()?;
            let args = PyTuple::new_bound(py, args);

            let kwargs = if keywords.is_empty() {
                None
            } else {
                let dict = PyDict::new_bound(py);
                for (name, value) in keywords {
                    dict.set_item(name, unwrap(py, value)?)
                        .map_err(|e| foreign_error(py, e))?;
                }
                Some(dict)
            };

            callable
                .call(args, kwargs.as_ref())
                .map(wrap)
                .map_err(|e| foreign_error(py, e))
        })
    }

    fn get_attr(&self, object: &ForeignObject, name: &str) -> Result<ForeignObject, ForeignError> {
        Python::with_gil(|py| {
            unwrap(py, object)?
                .getattr(name)
                .map(wrap)
                .map_err(|e| foreign_error(py, e))
        })
    }

    fn call_method(
        &self,
        object: &ForeignObject,
        name: &str,
        args: &[ForeignObject],
    ) -> Result<Vec<ForeignObject>, ForeignError> {
        Python::with_gil(|py| {
            let object = unwrap(py, object)?;
            let args = args
                .iter()
                .map(|arg| unwrap(py, arg))
                .collect::<Result<Vec<_>, _>>()?;
            let result = object
                .call_method1(name, PyTuple::new_bound(py, args))
                .map_err(|e| foreign_error(py, e))?;

            // A returned tuple is a multi-value result.
            if let Ok(tuple) = result.downcast::<PyTuple>() {
                return Ok(tuple.iter().map(wrap).collect());
            }
            Ok(vec![wrap(result)])
        })
    }

    fn to_foreign(&self, value: &Value) -> Result<ForeignObject, ForeignError> {
        Python::with_gil(|py| {
            let object = Self::value_to_py(py, value)?;
            Ok(wrap(object.into_bound(py)))
        })
    }

    fn to_native(&self, object: &ForeignObject) -> Result<Value, ForeignError> {
        Python::with_gil(|py| Self::py_to_value(py, &unwrap(py, object)?))
    }

    fn coerce(&self, object: &ForeignObject) -> Result<Value, ForeignError> {
        Python::with_gil(|py| {
            let object = unwrap(py, object)?;

            let has_native = object.hasattr("__native__").map_err(|e| foreign_error(py, e))?;
            if has_native {
                let native = object
                    .call_method0("__native__")
                    .map_err(|e| foreign_error(py, e))?;
                return Self::py_to_value(py, &native);
            }

            match Self::py_to_value(py, &object)? {
                Value::Object(_) if object.hasattr("__dict__").unwrap_or(false) => {
                    Self::attributes(py, &object)
                }
                Value::Object(_) => Err(ForeignError::type_error(format!(
                    "'{}' object has no native form",
                    type_name(&object)
                ))),
                primitive => Ok(primitive),
            }
        })
    }
}
