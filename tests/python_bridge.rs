//! End-to-end tests against embedded CPython (feature `python`).

use pyproxy::testing::fixtures::{Building, Car};
use pyproxy::{args, Bridge, BridgeConfig, BridgeError, PythonRuntime, Value};
use pyo3::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("python")
}

fn bridge() -> Bridge {
    let mut config = BridgeConfig::isolated();
    config.paths.extra.push(fixture_dir());
    Bridge::new(Arc::new(PythonRuntime::new()), config)
}

#[test]
fn test_building_direct_coercion() {
    let bridge = bridge();

    let building: Building = bridge
        .create_instance("Building", "Building", &args![1, "name", "address"])
        .unwrap();
    assert_eq!(
        building,
        Building {
            id: 1,
            name: "name".to_string(),
            address: "address".to_string(),
        }
    );
}

#[test]
fn test_car_plate() {
    let bridge = bridge();

    let car = bridge.create_proxy_instance::<dyn Car>(&args!["PLATE-1"]).unwrap();
    assert_eq!(car.get_number_plate().unwrap().as_deref(), Some("PLATE-1"));

    car.set_number_plate("PLATE-2").unwrap();
    assert_eq!(car.get_number_plate().unwrap().as_deref(), Some("PLATE-2"));
}

#[test]
fn test_car_without_plate() {
    let bridge = bridge();

    let car = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();
    assert_eq!(car.get_number_plate().unwrap(), None);
}

#[test]
fn test_tuple_result_is_multi_value() {
    let bridge = bridge();

    let car = bridge.create_proxy_instance::<dyn Car>(&args!["T"]).unwrap();
    assert_eq!(car.specs().unwrap(), vec![Value::Int(4), Value::Str("T".into())]);
}

#[test]
fn test_python_exception_is_invocation_error() {
    let bridge = bridge();

    let car = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();
    match car.honk().unwrap_err() {
        BridgeError::Invocation { message, .. } => {
            assert!(message.contains("RuntimeError"));
            assert!(message.contains("horn is broken"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_native_hook_used_for_coercion() {
    let bridge = bridge();

    let plate: String = bridge
        .create_instance("Car", "Registration", &args!["R-7"])
        .unwrap();
    assert_eq!(plate, "R-7");
}

#[test]
fn test_missing_module() {
    let bridge = bridge();

    match bridge.create_instance::<Building>("NoSuchModule", "Building", &[]) {
        Err(BridgeError::Lookup { message, .. }) => {
            assert!(message.contains("ModuleNotFoundError") || message.contains("ImportError"))
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_search_path_injected_once() {
    let marker = std::env::temp_dir().join("pyproxy-injected-once");
    let mut config = BridgeConfig::isolated();
    config.paths.extra.push(fixture_dir());
    config.paths.extra.push(marker.clone());
    let bridge = Bridge::new(Arc::new(PythonRuntime::new()), config);

    let _ = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();
    let marker = marker.to_string_lossy().into_owned();
    Python::with_gil(|py| {
        let path = py.import_bound("sys").unwrap().getattr("path").unwrap();
        path.call_method1("remove", (marker.as_str(),)).unwrap();
    });

    let _ = bridge.create_proxy_instance::<dyn Car>(&[]).unwrap();
    let path = Python::with_gil(|py| {
        py.import_bound("sys")
            .unwrap()
            .getattr("path")
            .unwrap()
            .extract::<Vec<String>>()
            .unwrap()
    });
    assert!(!path.contains(&marker));
}
