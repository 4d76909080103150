//! `Car` and `Building` test modules
//!
//! `Car` holds an optional number plate and is used through a generated
//! proxy. `Building` has three constructor fields and is coerced directly
//! into a native struct.

use super::{HostClass, ScriptedRuntime};
use crate::core::value::Value;
use crate::errors::{ForeignError, Result};
use crate::foreign_interface;
use crate::runtime::ForeignRuntime;
use serde::Deserialize;
use std::sync::Arc;

#[foreign_interface(module = "Car", class = "Car")]
pub trait Car: Send + Sync {
    #[forward(name = "getNumberPlate")]
    fn get_number_plate(&self) -> Result<Option<String>>;

    #[forward(name = "setNumberPlate")]
    fn set_number_plate(&self, plate: &str) -> Result<()>;

    /// Returns the wheel count and the plate as two values.
    #[forward(name = "getSpecs")]
    fn specs(&self) -> Result<Vec<Value>>;

    /// Always raises on the foreign side.
    #[forward]
    fn honk(&self) -> Result<()>;

    fn describe(&self) -> String {
        match self.get_number_plate() {
            Ok(Some(plate)) => format!("car {}", plate),
            _ => "unregistered car".to_string(),
        }
    }
}

/// Native form of a foreign `Building`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Building {
    pub id: i64,
    pub name: String,
    pub address: String,
}

pub fn car_class() -> HostClass {
    HostClass::new("Car")
        .with_init(|car, args, keywords| {
            let plate = match (args, keywords) {
                ([], []) => Value::None,
                ([plate], []) => plate.clone(),
                ([], [(name, plate)]) if name == "number_plate" => plate.clone(),
                _ => {
                    return Err(ForeignError::type_error(format!(
                        "__init__() takes from 1 to 2 positional arguments but {} were given",
                        args.len() + keywords.len() + 1
                    )))
                }
            };
            car.set("numberPlate", plate);
            car.set("wheels", Value::Int(4));
            Ok(())
        })
        .with_getter("getNumberPlate", "numberPlate")
        .with_setter("setNumberPlate", "numberPlate")
        .with_method("getSpecs", |car, _| Ok(vec![car.get("wheels"), car.get("numberPlate")]))
        .with_method("honk", |_, _| Err(ForeignError::new("RuntimeError", "horn is broken")))
}

pub fn building_class() -> HostClass {
    HostClass::new("Building")
        .with_init(|building, args, _| match args {
            [id, name, address] => {
                building.set("id", id.clone());
                building.set("name", name.clone());
                building.set("address", address.clone());
                Ok(())
            }
            _ => Err(ForeignError::type_error(format!(
                "__init__() takes 4 positional arguments but {} were given",
                args.len() + 1
            ))),
        })
        .with_getter("getBuildingId", "id")
        .with_setter("setBuildingId", "id")
        .with_getter("getBuildingName", "name")
        .with_setter("setBuildingName", "name")
        .with_getter("getBuildingAddress", "address")
        .with_setter("setBuildingAddress", "address")
}

/// Host with the `Car` and `Building` modules defined.
pub fn runtime() -> ScriptedRuntime {
    let runtime = ScriptedRuntime::new();
    runtime.define_module("Car", vec![car_class()]);
    runtime.define_module("Building", vec![building_class()]);
    runtime
}

pub fn shared_runtime() -> Arc<dyn ForeignRuntime> {
    Arc::new(runtime())
}
