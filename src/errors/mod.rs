//! Error taxonomy of the bridge
//!
//! Every failure is surfaced to the immediate caller as a distinct, named
//! variant. Interpreter-side messages are kept verbatim as context. Nothing
//! here is retried: foreign state may already have been mutated.

/// Convenience alias used throughout the crate.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Failure raised inside the embedded interpreter.
///
/// `kind` is the interpreter-side exception type (for example `ImportError`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ForeignError {
    pub kind: String,
    pub message: String,
}

impl ForeignError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn import_error(module: &str) -> Self {
        Self::new("ImportError", format!("No module named '{}'", module))
    }

    pub fn attribute_error(owner: &str, name: &str) -> Self {
        Self::new(
            "AttributeError",
            format!("'{}' object has no attribute '{}'", owner, name),
        )
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }
}

/// Errors surfaced by bridge operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Interface lacks binding metadata, or the metadata/config is malformed.
    #[error("configuration error for {subject}: {message}")]
    Configuration { subject: String, message: String },

    /// Module import or class attribute resolution failed.
    #[error("cannot resolve '{target}': {message}")]
    Lookup { target: String, message: String },

    /// The foreign constructor raised.
    #[error("cannot instantiate '{class}': {message}")]
    Instantiation { class: String, message: String },

    /// A value has no representation in the target type system.
    #[error("cannot convert value of type '{type_name}': {message}")]
    Conversion { type_name: String, message: String },

    /// Direct coercion of a foreign object into a native type failed.
    #[error("cannot coerce '{type_name}' into {target}: {message}")]
    Coercion {
        type_name: String,
        target: String,
        message: String,
    },

    /// A forwarded call raised inside the interpreter.
    #[error("call to {interface}.{operation} failed: {message}")]
    Invocation {
        interface: String,
        operation: String,
        message: String,
    },

    /// Building the proxy type for an interface failed.
    #[error("cannot generate proxy for {interface}: {message}")]
    ProxyGeneration { interface: String, message: String },

    /// The interpreter refused to create a new global state.
    #[error("cannot create interpreter state {key}: {message}")]
    State { key: String, message: String },
}

impl BridgeError {
    pub fn configuration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn lookup(target: impl Into<String>, cause: &ForeignError) -> Self {
        Self::Lookup {
            target: target.into(),
            message: cause.to_string(),
        }
    }

    pub fn instantiation(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Instantiation {
            class: class.into(),
            message: message.into(),
        }
    }

    pub fn conversion(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn coercion(
        type_name: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Coercion {
            type_name: type_name.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn invocation(
        interface: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Invocation {
            interface: interface.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn proxy_generation(interface: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProxyGeneration {
            interface: interface.into(),
            message: message.into(),
        }
    }

    /// Short, stable name of the error kind (used as a log field).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Lookup { .. } => "lookup",
            Self::Instantiation { .. } => "instantiation",
            Self::Conversion { .. } => "conversion",
            Self::Coercion { .. } => "coercion",
            Self::Invocation { .. } => "invocation",
            Self::ProxyGeneration { .. } => "proxy_generation",
            Self::State { .. } => "state",
        }
    }
}
