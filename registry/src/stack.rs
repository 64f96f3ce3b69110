//! LIFO stacks of active units of work.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scopekeeper_types::{RegistryError, UnitOfWorkId};

use crate::handle::UnitOfWorkHandle;

/// Ordered sequence of active units of work. The top is the current one.
#[derive(Debug, Default)]
pub struct ScopeStack {
    entries: Vec<UnitOfWorkHandle>,
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: UnitOfWorkHandle) {
        self.entries.push(handle);
    }

    pub fn pop(&mut self) -> Option<UnitOfWorkHandle> {
        self.entries.pop()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&UnitOfWorkHandle> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`ScopeStack`] stored in a context's side-table.
///
/// Clones refer to the same stack. Each operation holds the lock only for a
/// single `Vec` operation, so a panic cannot leave the stack half-updated and
/// a poisoned lock is recovered rather than reported.
#[derive(Debug, Clone, Default)]
pub struct SharedStack {
    inner: Arc<Mutex<ScopeStack>>,
}

impl SharedStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScopeStack> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, handle: UnitOfWorkHandle) {
        self.lock().push(handle);
    }

    pub fn pop(&self) -> Option<UnitOfWorkHandle> {
        self.lock().pop()
    }

    /// Pop the top only if it is `expected`.
    ///
    /// The check and the pop happen under one lock, so a mismatched exit
    /// leaves the stack untouched.
    pub fn pop_expected(&self, expected: UnitOfWorkId) -> Result<UnitOfWorkHandle, RegistryError> {
        let mut stack = self.lock();
        let found = stack.peek().map(UnitOfWorkHandle::id);
        match found {
            None => Err(RegistryError::EmptyStackPop),
            Some(found) if found != expected => {
                Err(RegistryError::UnbalancedScope { expected, found })
            }
            Some(_) => stack.pop().ok_or(RegistryError::EmptyStackPop),
        }
    }

    #[must_use]
    pub fn peek(&self) -> Option<UnitOfWorkHandle> {
        self.lock().peek().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether both values refer to the same underlying stack.
    #[must_use]
    pub fn same_stack(&self, other: &SharedStack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
