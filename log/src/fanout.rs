use std::error::Error;
use std::sync::Arc;

use scopekeeper_types::Severity;

use crate::sink::{Logger, Metadata};

/// Forwards every record to each of its sinks, in order.
#[derive(Clone, Default)]
pub struct FanoutLogger {
    sinks: Vec<Arc<dyn Logger>>,
}

impl FanoutLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn Logger>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Arc<dyn Logger>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Logger for FanoutLogger {
    fn log_message(&self, message: &str, severity: Severity, metadata: Option<&Metadata>) {
        for sink in &self.sinks {
            sink.log_message(message, severity, metadata);
        }
    }

    fn log_exception(
        &self,
        error: &(dyn Error + 'static),
        severity: Severity,
        metadata: Option<&Metadata>,
    ) {
        for sink in &self.sinks {
            sink.log_exception(error, severity, metadata);
        }
    }
}
