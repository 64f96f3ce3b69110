//! The registry: stack discipline on top of a chain of context adapters.
//!
//! A registry owns one adapter and optionally names an alternate registry.
//! At construction the alternate's chain is flattened behind the registry's
//! own adapter, so every operation walks a finite list instead of following
//! references. The walk is repeated on every call; nothing about which link
//! resolved is remembered between calls.

use std::fmt;
use std::sync::Arc;

use scopekeeper_types::{RegistryError, UnitOfWorkId};

use crate::adapter::ContextAdapter;
use crate::context::ExecutionContext;
use crate::handle::UnitOfWorkHandle;
use crate::scope::UnitOfWorkScope;
use crate::stack::SharedStack;

#[derive(Clone)]
struct Link {
    registry: Arc<str>,
    adapter: Arc<dyn ContextAdapter>,
}

/// A stack resolved for a context, with the registry whose adapter bound it.
#[derive(Debug, Clone)]
pub struct ResolvedStack {
    registry: Arc<str>,
    adapter: String,
    stack: SharedStack,
}

impl ResolvedStack {
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    #[must_use]
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    #[must_use]
    pub fn stack(&self) -> &SharedStack {
        &self.stack
    }

    #[must_use]
    pub fn into_stack(self) -> SharedStack {
        self.stack
    }
}

pub struct RegistryBuilder {
    name: Arc<str>,
    adapter: Arc<dyn ContextAdapter>,
    alternate: Option<Arc<Registry>>,
}

impl RegistryBuilder {
    /// Fall back to `alternate` when this registry's adapter has no binding.
    #[must_use]
    pub fn alternate(mut self, alternate: Arc<Registry>) -> Self {
        self.alternate = Some(alternate);
        self
    }

    /// Flatten the chain and reject it if two links bind the same storage.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut chain = vec![Link {
            registry: Arc::clone(&self.name),
            adapter: Arc::clone(&self.adapter),
        }];
        if let Some(alternate) = &self.alternate {
            chain.extend(alternate.chain.iter().cloned());
        }

        let keys: Vec<String> = chain.iter().map(|link| link.adapter.binding_key()).collect();
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(RegistryError::FallbackCycle {
                    adapter: chain[i].adapter.name().to_string(),
                });
            }
        }

        tracing::debug!(
            registry = %self.name,
            chain = %describe(&chain),
            "Registry built"
        );

        Ok(Registry {
            name: self.name,
            adapter: self.adapter,
            alternate: self.alternate,
            chain,
        })
    }
}

fn describe(chain: &[Link]) -> String {
    chain
        .iter()
        .map(|link| format!("{}:{}", link.registry, link.adapter.name()))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Tracks the stack of active units of work for whatever context is running.
pub struct Registry {
    name: Arc<str>,
    adapter: Arc<dyn ContextAdapter>,
    alternate: Option<Arc<Registry>>,
    chain: Vec<Link>,
}

impl Registry {
    /// A registry with no alternate. A single-link chain cannot repeat, so
    /// this cannot fail.
    pub fn new(name: &str, adapter: impl ContextAdapter + 'static) -> Self {
        let adapter: Arc<dyn ContextAdapter> = Arc::new(adapter);
        let name: Arc<str> = Arc::from(name);
        Self {
            chain: vec![Link {
                registry: Arc::clone(&name),
                adapter: Arc::clone(&adapter),
            }],
            name,
            adapter,
            alternate: None,
        }
    }

    pub fn builder(name: &str, adapter: impl ContextAdapter + 'static) -> RegistryBuilder {
        RegistryBuilder {
            name: Arc::from(name),
            adapter: Arc::new(adapter),
            alternate: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    #[must_use]
    pub fn alternate(&self) -> Option<&Arc<Registry>> {
        self.alternate.as_ref()
    }

    /// `(registry, adapter)` names in the order they are consulted.
    #[must_use]
    pub fn chain(&self) -> Vec<(&str, &str)> {
        self.chain
            .iter()
            .map(|link| (&*link.registry, link.adapter.name()))
            .collect()
    }

    /// The stack this registry's own adapter binds to `cx`, without fallback.
    pub fn stack(&self, cx: &ExecutionContext) -> Result<Option<SharedStack>, RegistryError> {
        self.adapter.stack(cx)
    }

    /// The first stack bound to `cx` along the chain.
    pub fn resolve(&self, cx: &ExecutionContext) -> Result<Option<ResolvedStack>, RegistryError> {
        for (depth, link) in self.chain.iter().enumerate() {
            let Some(stack) = link.adapter.stack(cx)? else {
                continue;
            };
            if depth > 0 {
                tracing::debug!(
                    registry = %self.name,
                    fallback = %link.registry,
                    adapter = link.adapter.name(),
                    context = %cx,
                    "No context bound; using fallback registry"
                );
            }
            return Ok(Some(ResolvedStack {
                registry: Arc::clone(&link.registry),
                adapter: link.adapter.name().to_string(),
                stack,
            }));
        }
        Ok(None)
    }

    /// The innermost active unit of work, or `None` if no scope is active.
    ///
    /// A link whose stack is unbound or empty defers to the next link.
    pub fn current(&self, cx: &ExecutionContext) -> Result<Option<UnitOfWorkHandle>, RegistryError> {
        for link in &self.chain {
            if let Some(top) = link.adapter.stack(cx)?.and_then(|stack| stack.peek()) {
                return Ok(Some(top));
            }
        }
        Ok(None)
    }

    pub fn push(&self, cx: &ExecutionContext, handle: UnitOfWorkHandle) -> Result<(), RegistryError> {
        let Some(resolved) = self.resolve(cx)? else {
            tracing::warn!(
                registry = %self.name,
                context = %cx,
                unit_of_work = %handle.id(),
                "No context available for unit of work"
            );
            return Err(RegistryError::NoContextAvailable);
        };
        tracing::trace!(
            registry = %resolved.registry,
            unit_of_work = %handle.id(),
            depth = resolved.stack.len() + 1,
            "Pushed unit of work"
        );
        resolved.stack.push(handle);
        Ok(())
    }

    pub fn pop(&self, cx: &ExecutionContext) -> Result<UnitOfWorkHandle, RegistryError> {
        let handle = self
            .resolve(cx)?
            .and_then(|resolved| resolved.stack.pop())
            .ok_or(RegistryError::EmptyStackPop)?;
        tracing::trace!(
            registry = %self.name,
            unit_of_work = %handle.id(),
            "Popped unit of work"
        );
        Ok(handle)
    }

    /// Pop `expected`, refusing if something else is on top.
    pub(crate) fn pop_expected(
        &self,
        cx: &ExecutionContext,
        expected: UnitOfWorkId,
    ) -> Result<UnitOfWorkHandle, RegistryError> {
        match self.resolve(cx)? {
            Some(resolved) => resolved.stack.pop_expected(expected),
            None => Err(RegistryError::EmptyStackPop),
        }
    }

    /// Number of active scopes in the resolved stack.
    pub fn depth(&self, cx: &ExecutionContext) -> Result<usize, RegistryError> {
        Ok(self
            .resolve(cx)?
            .map_or(0, |resolved| resolved.stack.len()))
    }

    /// Join the current unit of work, or start and own a new one.
    ///
    /// `begin` runs only when no unit of work is active.
    pub fn enter<'a, F>(
        &'a self,
        cx: &'a ExecutionContext,
        begin: F,
    ) -> Result<UnitOfWorkScope<'a>, RegistryError>
    where
        F: FnOnce() -> UnitOfWorkHandle,
    {
        if let Some(current) = self.current(cx)? {
            return Ok(UnitOfWorkScope::joined(self, cx, current));
        }
        self.begin(cx, begin())
    }

    /// Push `handle` as a new innermost scope, even if one is already active.
    pub fn begin<'a>(
        &'a self,
        cx: &'a ExecutionContext,
        handle: UnitOfWorkHandle,
    ) -> Result<UnitOfWorkScope<'a>, RegistryError> {
        self.push(cx, handle.clone())?;
        Ok(UnitOfWorkScope::owned(self, cx, handle))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("chain", &describe(&self.chain))
            .finish()
    }
}
