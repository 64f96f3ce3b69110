//! Context adapters: where a context keeps its stack.
//!
//! An adapter answers one question for a given [`ExecutionContext`]: which
//! [`SharedStack`] belongs to it. `Ok(None)` means the context has no binding
//! for this adapter, which is an expected outcome and drives registry
//! fallback. Errors are reserved for storage that exists but is unusable.

use scopekeeper_types::RegistryError;

use crate::context::{ContextItems, ExecutionContext};
use crate::stack::SharedStack;

/// Side-table key under which stacks are stored by default.
pub const DEFAULT_STACK_SLOT: &str = "scopekeeper.unit_of_work_stack";

pub trait ContextAdapter: Send + Sync {
    /// Stable name, used in diagnostics.
    fn name(&self) -> &str;

    /// Identifies the storage this adapter binds stacks in. Two links with
    /// the same key bind the same stack, so the second could never be
    /// reached and a chain may not contain both.
    fn binding_key(&self) -> String {
        self.name().to_string()
    }

    /// The stack bound to `cx`, created on first access.
    fn stack(&self, cx: &ExecutionContext) -> Result<Option<SharedStack>, RegistryError>;
}

fn bound_stack(
    adapter: &str,
    items: &ContextItems,
    slot: &str,
) -> Result<SharedStack, RegistryError> {
    items
        .get_or_insert_with(slot, SharedStack::new)
        .map(|stack| SharedStack::clone(&stack))
        .map_err(|e| RegistryError::storage(adapter, e.to_string()))
}

/// Binds the stack to the active request.
#[derive(Debug, Clone)]
pub struct RequestScopedAdapter {
    slot: String,
}

impl RequestScopedAdapter {
    pub const NAME: &'static str = "request";

    #[must_use]
    pub fn new() -> Self {
        Self::with_slot(DEFAULT_STACK_SLOT)
    }

    #[must_use]
    pub fn with_slot(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }

    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl Default for RequestScopedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextAdapter for RequestScopedAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn binding_key(&self) -> String {
        format!("{}:{}", Self::NAME, self.slot)
    }

    fn stack(&self, cx: &ExecutionContext) -> Result<Option<SharedStack>, RegistryError> {
        match cx.request() {
            Some(request) => bound_stack(Self::NAME, request.items(), &self.slot).map(Some),
            None => Ok(None),
        }
    }
}

/// Binds the stack to the calling worker thread.
#[derive(Debug, Clone)]
pub struct ThreadLocalAdapter {
    slot: String,
}

impl ThreadLocalAdapter {
    pub const NAME: &'static str = "thread";

    #[must_use]
    pub fn new() -> Self {
        Self::with_slot(DEFAULT_STACK_SLOT)
    }

    #[must_use]
    pub fn with_slot(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }

    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl Default for ThreadLocalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextAdapter for ThreadLocalAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn binding_key(&self) -> String {
        format!("{}:{}", Self::NAME, self.slot)
    }

    fn stack(&self, cx: &ExecutionContext) -> Result<Option<SharedStack>, RegistryError> {
        match cx.worker() {
            Some(worker) => bound_stack(Self::NAME, worker.items(), &self.slot).map(Some),
            None => Ok(None),
        }
    }
}

/// One process-wide stack, bound for every context.
///
/// This is the only adapter that shares a stack between unrelated callers.
/// Use it as the last link of a chain for work that has no request or
/// tracked thread, never as a primary.
#[derive(Debug, Clone, Default)]
pub struct AmbientAdapter {
    stack: SharedStack,
}

impl AmbientAdapter {
    pub const NAME: &'static str = "ambient";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextAdapter for AmbientAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stack(&self, _cx: &ExecutionContext) -> Result<Option<SharedStack>, RegistryError> {
        Ok(Some(self.stack.clone()))
    }
}
