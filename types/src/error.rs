//! Error taxonomy for the registry and the units of work it manages.

use thiserror::Error;

use crate::UnitOfWorkId;

/// Failure reported by a unit of work while committing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnitOfWorkError {
    message: String,
}

impl UnitOfWorkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by registry operations.
///
/// None of these are retried or recovered inside the registry: each one means
/// the caller broke scope discipline or the context storage is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// `push` found no stack to live in, neither contextual nor fallback.
    #[error("no context available to hold a unit of work")]
    NoContextAvailable,
    /// `pop` was called with no active scope (unbalanced enter/exit).
    #[error("pop called with no active unit of work")]
    EmptyStackPop,
    /// The storage behind a context is unusable.
    #[error("context storage failed in adapter '{adapter}': {reason}")]
    ContextStorage { adapter: String, reason: String },
    /// An adapter appears twice along a fallback chain.
    #[error("fallback chain visits adapter '{adapter}' more than once")]
    FallbackCycle { adapter: String },
    /// A scope popped a unit of work that it did not push.
    #[error("scope exited out of order: expected {expected}, popped {found}")]
    UnbalancedScope {
        expected: UnitOfWorkId,
        found: UnitOfWorkId,
    },
    #[error("unit of work {id} failed to commit: {source}")]
    Commit {
        id: UnitOfWorkId,
        #[source]
        source: UnitOfWorkError,
    },
}

impl RegistryError {
    pub fn storage(adapter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContextStorage {
            adapter: adapter.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error reports a broken push/pop pairing rather than a
    /// storage or configuration problem.
    #[must_use]
    pub fn is_scope_violation(&self) -> bool {
        matches!(
            self,
            Self::EmptyStackPop | Self::UnbalancedScope { .. } | Self::NoContextAvailable
        )
    }
}
