//! Context-keyed registry of active units of work.
//!
//! # Architecture
//!
//! ```text
//! Registry ("web")
//! ├── adapter: RequestScopedAdapter   -> RequestContext side-table
//! └── alternate: Registry ("background")
//!     ├── adapter: ThreadLocalAdapter -> WorkerContext side-table
//!     └── alternate: Registry ("global")
//!         └── adapter: AmbientAdapter -> one process-wide stack
//! ```
//!
//! Every operation takes an explicit [`ExecutionContext`]. The registry walks
//! its flattened chain and uses the first adapter that binds a stack:
//!
//! - [`Registry::current`]: top of the first bound, non-empty stack, or `None`
//! - [`Registry::push`]: onto the first bound stack, or `NoContextAvailable`
//! - [`Registry::pop`]: off the first bound stack, or `EmptyStackPop`
//! - [`Registry::enter`]: join the current unit of work or start a new one

mod adapter;
mod context;
mod handle;
mod registry;
mod scope;
mod stack;

pub use adapter::{
    AmbientAdapter, ContextAdapter, DEFAULT_STACK_SLOT, RequestScopedAdapter, ThreadLocalAdapter,
};
pub use context::{ContextItems, ExecutionContext, ItemError, RequestContext, WorkerContext};
pub use handle::{UnitOfWork, UnitOfWorkHandle};
pub use registry::{Registry, RegistryBuilder, ResolvedStack};
pub use scope::{ScopeRole, UnitOfWorkScope};
pub use stack::{ScopeStack, SharedStack};

pub use scopekeeper_types::{RegistryError, RequestId, UnitOfWorkError, UnitOfWorkId, WorkerId};
