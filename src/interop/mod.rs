//! Interoperability - native values and calls crossing into the interpreter
//!
//! Architecture:
//! - `marshal.rs` - native <-> foreign value conversion for arguments and results
//! - `proxy.rs` - proxy types and instances implementing native interfaces
//! - `dispatch.rs` - call interception and forwarding to foreign methods

pub mod dispatch;
pub mod marshal;
pub mod proxy;

pub use dispatch::MethodInterceptor;
pub use marshal::{MarshalledArgs, ValueMarshaller};
pub use proxy::{DispatchEntry, ProxyGenerator, ProxyInstance, ProxyType};
