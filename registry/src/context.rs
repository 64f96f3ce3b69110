//! Explicit execution contexts.
//!
//! Callers pass an [`ExecutionContext`] into every registry operation instead
//! of the registry reaching for ambient request or thread state. The context
//! owns the storage; the registry only reads and get-or-creates entries in it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use scopekeeper_types::{RequestId, WorkerId};
use thiserror::Error;

type Item = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("context item table is poisoned")]
    Poisoned,
    #[error("context item '{key}' holds a value of a different type")]
    TypeMismatch { key: String },
}

/// String-keyed side-table owned by a context.
#[derive(Default)]
pub struct ContextItems {
    items: Mutex<HashMap<String, Item>>,
}

impl ContextItems {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Item>>, ItemError> {
        self.items.lock().map_err(|_| ItemError::Poisoned)
    }

    /// Return the `T` stored under `key`, creating it with `init` if absent.
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> Result<Arc<T>, ItemError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut items = self.lock()?;
        let item = items
            .entry(key.to_string())
            .or_insert_with(|| -> Item { Arc::new(init()) })
            .clone();
        item.downcast::<T>().map_err(|_| ItemError::TypeMismatch {
            key: key.to_string(),
        })
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Option<Arc<T>>, ItemError> {
        let items = self.lock()?;
        match items.get(key) {
            None => Ok(None),
            Some(item) => item
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ItemError::TypeMismatch {
                    key: key.to_string(),
                }),
        }
    }

    /// Store `value` under `key`, replacing whatever was there.
    ///
    /// Returns whether a previous value was replaced.
    pub fn insert<T: Any + Send + Sync>(&self, key: &str, value: T) -> Result<bool, ItemError> {
        let mut items = self.lock()?;
        Ok(items.insert(key.to_string(), Arc::new(value)).is_some())
    }

    pub fn remove(&self, key: &str) -> Result<bool, ItemError> {
        let mut items = self.lock()?;
        Ok(items.remove(key).is_some())
    }

    pub fn len(&self) -> Result<usize, ItemError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ItemError> {
        Ok(self.lock()?.is_empty())
    }
}

impl fmt::Debug for ContextItems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("ContextItems");
        match self.items.lock() {
            Ok(items) => {
                let mut keys: Vec<&String> = items.keys().collect();
                keys.sort();
                out.field("keys", &keys);
            }
            Err(_) => {
                out.field("keys", &"<poisoned>");
            }
        }
        out.finish()
    }
}

/// State of one inbound request. The host creates it when the request starts
/// and drops it when the request ends, taking the bound stacks with it.
#[derive(Debug)]
pub struct RequestContext {
    id: RequestId,
    items: ContextItems,
}

impl RequestContext {
    #[must_use]
    pub fn new(id: RequestId) -> Arc<Self> {
        Arc::new(Self {
            id,
            items: ContextItems::new(),
        })
    }

    /// Start a request with the next process-unique id.
    #[must_use]
    pub fn begin() -> Arc<Self> {
        Self::new(RequestId::next())
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn items(&self) -> &ContextItems {
        &self.items
    }
}

/// State of one tracked worker thread.
///
/// There is exactly one per thread, created lazily by [`WorkerContext::current`].
/// It is neither `Send` nor `Sync`, so a thread's storage cannot leak into
/// another thread.
pub struct WorkerContext {
    id: WorkerId,
    thread_name: Option<String>,
    items: ContextItems,
    _not_send: PhantomData<*const ()>,
}

thread_local! {
    static CURRENT_WORKER: Rc<WorkerContext> = Rc::new(WorkerContext {
        id: WorkerId::next(),
        thread_name: thread::current().name().map(ToString::to_string),
        items: ContextItems::new(),
        _not_send: PhantomData,
    });
}

impl WorkerContext {
    /// The context of the calling thread.
    #[must_use]
    pub fn current() -> Rc<Self> {
        CURRENT_WORKER.with(Rc::clone)
    }

    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    #[must_use]
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    #[must_use]
    pub fn items(&self) -> &ContextItems {
        &self.items
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("id", &self.id)
            .field("thread_name", &self.thread_name)
            .field("items", &self.items)
            .finish()
    }
}

/// What the caller is currently running inside.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    request: Option<Arc<RequestContext>>,
    worker: Option<Rc<WorkerContext>>,
}

impl ExecutionContext {
    /// The calling thread, outside any request.
    #[must_use]
    pub fn current_thread() -> Self {
        Self {
            request: None,
            worker: Some(WorkerContext::current()),
        }
    }

    /// A request being handled on the calling thread.
    #[must_use]
    pub fn for_request(request: Arc<RequestContext>) -> Self {
        Self::current_thread().with_request(request)
    }

    /// No request and no tracked thread.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request(mut self, request: Arc<RequestContext>) -> Self {
        self.request = Some(request);
        self
    }

    #[must_use]
    pub fn without_worker(mut self) -> Self {
        self.worker = None;
        self
    }

    #[must_use]
    pub fn request(&self) -> Option<&RequestContext> {
        self.request.as_deref()
    }

    #[must_use]
    pub fn worker(&self) -> Option<&WorkerContext> {
        self.worker.as_deref()
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.request.is_none() && self.worker.is_none()
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.request, &self.worker) {
            (Some(request), Some(worker)) => write!(f, "{} on {}", request.id(), worker.id()),
            (Some(request), None) => write!(f, "{}", request.id()),
            (None, Some(worker)) => write!(f, "{}", worker.id()),
            (None, None) => f.write_str("detached"),
        }
    }
}
