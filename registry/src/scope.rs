//! Scoped ownership of a unit of work.
//!
//! A scope either owns its unit of work (it pushed it) or joined one that an
//! outer scope owns. Only owners pop, commit and dispose, so nested business
//! operations share the outermost transaction and commits run innermost
//! first.

use scopekeeper_types::RegistryError;

use crate::context::ExecutionContext;
use crate::handle::UnitOfWorkHandle;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRole {
    /// Pushed by this scope; popped and finished when it ends.
    Owner,
    /// Reused from an enclosing scope; ending it does nothing.
    Joined,
}

#[must_use = "dropping an owning scope without `complete` disposes its unit of work"]
#[derive(Debug)]
pub struct UnitOfWorkScope<'a> {
    registry: &'a Registry,
    cx: &'a ExecutionContext,
    handle: UnitOfWorkHandle,
    role: ScopeRole,
    finished: bool,
}

impl<'a> UnitOfWorkScope<'a> {
    pub(crate) fn owned(
        registry: &'a Registry,
        cx: &'a ExecutionContext,
        handle: UnitOfWorkHandle,
    ) -> Self {
        Self {
            registry,
            cx,
            handle,
            role: ScopeRole::Owner,
            finished: false,
        }
    }

    pub(crate) fn joined(
        registry: &'a Registry,
        cx: &'a ExecutionContext,
        handle: UnitOfWorkHandle,
    ) -> Self {
        Self {
            registry,
            cx,
            handle,
            role: ScopeRole::Joined,
            finished: false,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &UnitOfWorkHandle {
        &self.handle
    }

    #[must_use]
    pub fn role(&self) -> ScopeRole {
        self.role
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.role == ScopeRole::Owner
    }

    /// End the scope successfully. Owners pop and commit.
    ///
    /// A unit of work that fails to commit is disposed before `Commit` is
    /// returned.
    ///
    /// If the top of the stack is not this scope's unit of work the stack is
    /// left as it is and `UnbalancedScope` is returned. The unit of work stays
    /// on the stack and is released by whoever pops it.
    pub fn complete(mut self) -> Result<(), RegistryError> {
        if self.role == ScopeRole::Joined {
            self.finished = true;
            return Ok(());
        }
        let handle = self.registry.pop_expected(self.cx, self.handle.id())?;
        self.finished = true;
        handle.commit().map_err(|source| {
            tracing::warn!(
                registry = self.registry.name(),
                unit_of_work = %handle.id(),
                error = %source,
                "Unit of work failed to commit"
            );
            handle.dispose();
            RegistryError::Commit {
                id: handle.id(),
                source,
            }
        })
    }

    /// End the scope without committing. Owners pop and dispose.
    pub fn abandon(mut self) -> Result<(), RegistryError> {
        if self.role == ScopeRole::Joined {
            self.finished = true;
            return Ok(());
        }
        let handle = self.registry.pop_expected(self.cx, self.handle.id())?;
        self.finished = true;
        handle.dispose();
        Ok(())
    }
}

impl Drop for UnitOfWorkScope<'_> {
    fn drop(&mut self) {
        if self.finished || self.role == ScopeRole::Joined {
            return;
        }
        match self.registry.pop_expected(self.cx, self.handle.id()) {
            Ok(handle) => {
                tracing::debug!(
                    registry = self.registry.name(),
                    unit_of_work = %handle.id(),
                    "Scope dropped without completing; disposing"
                );
                handle.dispose();
            }
            Err(err) => {
                // Still on the stack; released by whoever pops it.
                tracing::warn!(
                    registry = self.registry.name(),
                    unit_of_work = %self.handle.id(),
                    error = %err,
                    "Could not exit dropped scope"
                );
            }
        }
    }
}
