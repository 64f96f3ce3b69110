use std::sync::Arc;

use serde::Deserialize;

use scopekeeper_registry::{
    AmbientAdapter, DEFAULT_STACK_SLOT, Registry, RegistryBuilder, RegistryError,
    RequestScopedAdapter, ThreadLocalAdapter,
};

/// A link of the registry chain, named after the context it binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Request,
    Thread,
    Ambient,
}

impl AdapterKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Thread => "thread",
            Self::Ambient => "ambient",
        }
    }

    fn builder(self, slot: &str) -> RegistryBuilder {
        match self {
            Self::Request => {
                Registry::builder(self.as_str(), RequestScopedAdapter::with_slot(slot))
            }
            Self::Thread => Registry::builder(self.as_str(), ThreadLocalAdapter::with_slot(slot)),
            Self::Ambient => Registry::builder(self.as_str(), AmbientAdapter::new()),
        }
    }
}

/// Registry chain configuration.
///
/// ```toml
/// [registry]
/// chain = ["request", "thread", "ambient"]
/// slot = "scopekeeper.unit_of_work_stack"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Adapters consulted in order. Default: `["request", "thread"]`.
    #[serde(default)]
    pub chain: Vec<AdapterKind>,
    /// Side-table key for request and thread stacks.
    pub slot: Option<String>,
}

impl RegistryConfig {
    pub const DEFAULT_CHAIN: [AdapterKind; 2] = [AdapterKind::Request, AdapterKind::Thread];

    #[must_use]
    pub fn chain(&self) -> &[AdapterKind] {
        if self.chain.is_empty() {
            &Self::DEFAULT_CHAIN
        } else {
            &self.chain
        }
    }

    #[must_use]
    pub fn slot(&self) -> &str {
        self.slot.as_deref().unwrap_or(DEFAULT_STACK_SLOT)
    }

    /// Build the chain back to front, each registry naming the next one as
    /// its alternate. Returns the head of the chain.
    ///
    /// A kind listed twice is rejected with `FallbackCycle`.
    pub fn build(&self) -> Result<Arc<Registry>, RegistryError> {
        let slot = self.slot();
        let (tail, rest) = match self.chain().split_last() {
            Some(split) => split,
            None => return Err(RegistryError::NoContextAvailable),
        };
        let mut head = Arc::new(tail.builder(slot).build()?);
        for kind in rest.iter().rev() {
            head = Arc::new(kind.builder(slot).alternate(head).build()?);
        }
        Ok(head)
    }
}
