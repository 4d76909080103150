//! Frontend components
//!
//! The factory callers hold on to, and its configuration.

pub mod bridge;
pub mod config;

pub use bridge::Bridge;
pub use config::{BridgeConfig, InstantiationConfig, PathsConfig, StateConfig, StateMode};
