//! Concurrent simulation of requests and background jobs sharing a registry.
//!
//! Each simulated request runs on its own thread with its own
//! [`RequestContext`]. Each background job runs on a thread with no request,
//! so the head of the chain has no binding and the registry falls back.
//! Operations nest: odd levels join the enclosing unit of work, even levels
//! start a nested one, so the commit journal shows innermost-first ordering.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::{Result, anyhow};

use scopekeeper_log::{Logger, Metadata};
use scopekeeper_registry::{
    ExecutionContext, Registry, RegistryError, RequestContext, UnitOfWork, UnitOfWorkError,
    UnitOfWorkHandle,
};
use scopekeeper_types::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOptions {
    pub requests: usize,
    pub background: usize,
    pub depth: usize,
    /// Every Nth request fails its outermost commit. Zero disables failures.
    pub fail_every: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            requests: 4,
            background: 1,
            depth: 3,
            fail_every: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextReport {
    pub context: String,
    pub resolved_by: String,
    pub commits: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub contexts: Vec<ContextReport>,
}

impl SimulationReport {
    #[must_use]
    pub fn failures(&self) -> usize {
        self.contexts.iter().filter(|c| c.error.is_some()).count()
    }

    #[must_use]
    pub fn total_commits(&self) -> usize {
        self.contexts.iter().map(|c| c.commits.len()).sum()
    }
}

type Journal = Arc<Mutex<Vec<String>>>;

struct SimulatedUnitOfWork {
    label: String,
    journal: Journal,
    fail: bool,
}

impl UnitOfWork for SimulatedUnitOfWork {
    fn commit(&self) -> Result<(), UnitOfWorkError> {
        if self.fail {
            return Err(UnitOfWorkError::new(format!(
                "{} rejected by the store",
                self.label
            )));
        }
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.label.clone());
        Ok(())
    }

    fn dispose(&self) {
        tracing::debug!(label = %self.label, "Disposed simulated unit of work");
    }
}

struct Job<'a> {
    registry: &'a Registry,
    cx: &'a ExecutionContext,
    journal: Journal,
    name: String,
    depth: usize,
    fail_outermost: bool,
}

impl Job<'_> {
    fn unit(&self, level: usize) -> UnitOfWorkHandle {
        UnitOfWorkHandle::new(SimulatedUnitOfWork {
            label: format!("{}/L{level}", self.name),
            journal: Arc::clone(&self.journal),
            fail: self.fail_outermost && level == 0,
        })
    }

    fn operation(&self, level: usize) -> Result<(), RegistryError> {
        let scope = if level % 2 == 0 {
            self.registry.begin(self.cx, self.unit(level))?
        } else {
            self.registry.enter(self.cx, || self.unit(level))?
        };
        if level + 1 < self.depth {
            self.operation(level + 1)?;
        }
        scope.complete()
    }
}

fn run_context(
    registry: &Registry,
    logger: &dyn Logger,
    name: String,
    cx: &ExecutionContext,
    options: &SimulationOptions,
    fail_outermost: bool,
) -> ContextReport {
    let resolved_by = match registry.resolve(cx) {
        Ok(Some(resolved)) => format!("{}:{}", resolved.registry(), resolved.adapter()),
        Ok(None) => "unbound".to_string(),
        Err(e) => format!("error: {e}"),
    };
    let job = Job {
        registry,
        cx,
        journal: Journal::default(),
        name: name.clone(),
        depth: options.depth.max(1),
        fail_outermost,
    };

    let outcome = job.operation(0);
    let mut metadata = Metadata::new();
    metadata.insert("context".to_string(), cx.to_string());
    metadata.insert("resolved_by".to_string(), resolved_by.clone());

    let error = match outcome {
        Ok(()) => {
            logger.log_message(&format!("{name} committed"), Severity::Verbose, Some(&metadata));
            None
        }
        Err(err) => {
            logger.log_exception(&err, Severity::Error, Some(&metadata));
            Some(err.to_string())
        }
    };

    let commits = job
        .journal
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    ContextReport {
        context: name,
        resolved_by,
        commits,
        error,
    }
}

/// Run every request and background job concurrently and collect reports in
/// a stable order (requests first, then jobs).
pub fn run(
    registry: &Registry,
    logger: &dyn Logger,
    options: &SimulationOptions,
) -> Result<SimulationReport> {
    let mut reports: BTreeMap<(u8, usize), ContextReport> = BTreeMap::new();

    thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::new();
        for i in 0..options.requests {
            let fail = options.fail_every > 0 && (i + 1) % options.fail_every == 0;
            let handle = thread::Builder::new()
                .name(format!("request-{i}"))
                .spawn_scoped(scope, move || {
                    let request = RequestContext::begin();
                    let cx = ExecutionContext::for_request(request);
                    run_context(registry, logger, format!("request-{i}"), &cx, options, fail)
                })?;
            handles.push(((0, i), handle));
        }
        for i in 0..options.background {
            let handle = thread::Builder::new()
                .name(format!("job-{i}"))
                .spawn_scoped(scope, move || {
                    let cx = ExecutionContext::current_thread();
                    run_context(registry, logger, format!("job-{i}"), &cx, options, false)
                })?;
            handles.push(((1, i), handle));
        }
        for (key, handle) in handles {
            let report = handle
                .join()
                .map_err(|_| anyhow!("simulation thread panicked"))?;
            reports.insert(key, report);
        }
        Ok(())
    })?;

    Ok(SimulationReport {
        contexts: reports.into_values().collect(),
    })
}
