//! Opaque handles to units of work.
//!
//! The registry never looks inside a unit of work. It only needs an identity
//! to compare scopes, and `commit`/`dispose` to finish them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use scopekeeper_types::{UnitOfWorkError, UnitOfWorkId};

/// A transactional scope owned by the surrounding application.
pub trait UnitOfWork: Any + Send + Sync {
    /// Make the work done inside this scope durable.
    fn commit(&self) -> Result<(), UnitOfWorkError>;

    /// Release the scope without committing.
    fn dispose(&self);
}

/// Shared handle to a unit of work, with a process-unique identity.
///
/// Cloning the handle shares the same unit of work; equality is identity.
#[derive(Clone)]
pub struct UnitOfWorkHandle {
    id: UnitOfWorkId,
    inner: Arc<dyn UnitOfWork>,
}

impl UnitOfWorkHandle {
    pub fn new(unit: impl UnitOfWork) -> Self {
        Self::from_arc(Arc::new(unit))
    }

    pub fn from_arc(inner: Arc<dyn UnitOfWork>) -> Self {
        Self {
            id: UnitOfWorkId::next(),
            inner,
        }
    }

    #[must_use]
    pub fn id(&self) -> UnitOfWorkId {
        self.id
    }

    pub fn commit(&self) -> Result<(), UnitOfWorkError> {
        self.inner.commit()
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Borrow the concrete unit of work, if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: UnitOfWork>(&self) -> Option<&T> {
        let any: &dyn Any = self.inner.as_ref();
        any.downcast_ref::<T>()
    }
}

impl PartialEq for UnitOfWorkHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UnitOfWorkHandle {}

impl fmt::Debug for UnitOfWorkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWorkHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
