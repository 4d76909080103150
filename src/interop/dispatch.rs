//! Call interception - the single handler behind every forwarded operation

use super::marshal::ValueMarshaller;
use super::proxy::ProxyInstance;
use crate::core::value::Value;
use crate::errors::{BridgeError, Result};
use std::time::Instant;

pub struct MethodInterceptor;

impl MethodInterceptor {
    /// Dispatch `operation` through the instance's dispatch table.
    ///
    /// Operations outside the forwarding set, and calls with the wrong
    /// number of arguments, fail without touching the interpreter.
    pub fn intercept(instance: &ProxyInstance, operation: &str, args: &[Value]) -> Result<Value> {
        let interface = instance.interface();
        let entry = instance.proxy_type().lookup(operation).ok_or_else(|| {
            BridgeError::invocation(interface, operation, "operation is not forwarded")
        })?;

        if args.len() != entry.arity() {
            return Err(BridgeError::invocation(
                interface,
                operation,
                format!("expected {} arguments, got {}", entry.arity(), args.len()),
            ));
        }

        Self::forward(instance, operation, entry.foreign_name(), args)
    }

    /// Marshal `args`, call `foreign_name` on the wrapped object under the
    /// state lock, and marshal the result back.
    pub(crate) fn forward(
        instance: &ProxyInstance,
        operation: &str,
        foreign_name: &str,
        args: &[Value],
    ) -> Result<Value> {
        let interface = instance.interface();
        let state = instance.state();
        let _span = tracing::trace_span!(
            "dispatch",
            interface,
            operation,
            foreign = foreign_name,
            state = state.id()
        )
        .entered();

        let started = Instant::now();
        let result = state.with(|f| {
            let marshalled = ValueMarshaller::to_foreign(f, args)?;
            let results = f
                .call_method(instance.object(), foreign_name, marshalled.positional())
                .map_err(|e| {
                    BridgeError::invocation(
                        interface,
                        operation,
                        format!("{} (foreign method '{}')", e, foreign_name),
                    )
                })?;
            ValueMarshaller::to_native(f, &results)
        });

        let stats = instance.stats();
        stats.record_call(started.elapsed());
        match &result {
            Ok(_) => tracing::trace!("forwarded call returned"),
            Err(e) => {
                stats.record_failure();
                tracing::warn!(interface, operation, error = %e, "forwarded call failed");
            }
        }
        result
    }
}
