//! Business Invoker (§6, §9). The core never reaches inside a business
//! service's inheritance chain or uses reflection to call it — it calls
//! through this trait, implemented at service-host startup as a
//! dispatch table keyed by `(className, operation)` (§9).

use crate::types::{ReturnValue, SequenceId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub value: ReturnValue,
    pub declared_type: &'static str,
}

/// `process(sequenceId, className, operation, args[], returnAttr, version)
/// -> {value, declaredType}` (§9).
pub trait BusinessInvoker: Send + Sync {
    fn invoke(
        &self,
        sequence_id: SequenceId,
        class_name: &str,
        operation: &str,
        args: &[String],
        return_attr: &str,
        version: &str,
    ) -> Option<InvocationResult>;
}

type HandlerFn = Box<
    dyn Fn(SequenceId, &[String], &str, &str) -> Option<InvocationResult> + Send + Sync,
>;

/// Dispatch-table implementation — the registered-function replacement
/// for the source's reflection-based dispatch (§9). Handlers are
/// registered once at service-host startup, keyed by `(className,
/// operation)`.
#[derive(Default)]
pub struct InMemoryBusinessInvoker {
    handlers: HashMap<(String, String), HandlerFn>,
}

impl InMemoryBusinessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, class_name: &str, operation: &str, handler: F)
    where
        F: Fn(SequenceId, &[String], &str, &str) -> Option<InvocationResult> + Send + Sync + 'static,
    {
        self.handlers
            .insert((class_name.to_string(), operation.to_string()), Box::new(handler));
    }
}

impl BusinessInvoker for InMemoryBusinessInvoker {
    fn invoke(
        &self,
        sequence_id: SequenceId,
        class_name: &str,
        operation: &str,
        args: &[String],
        return_attr: &str,
        version: &str,
    ) -> Option<InvocationResult> {
        let handler = self.handlers.get(&(class_name.to_string(), operation.to_string()))?;
        handler(sequence_id, args, return_attr, version)
    }
}
