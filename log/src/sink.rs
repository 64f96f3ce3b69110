//! The logger sink contract.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Write;

use scopekeeper_types::Severity;

/// Extra string-keyed fields attached to a log record.
pub type Metadata = BTreeMap<String, String>;

/// A leveled log sink.
///
/// Sinks must not block the caller on slow delivery; anything expensive is
/// handed off to a background task.
pub trait Logger: Send + Sync {
    fn log_message(&self, message: &str, severity: Severity, metadata: Option<&Metadata>);

    /// Log an error together with its chain of sources.
    fn log_exception(
        &self,
        error: &(dyn Error + 'static),
        severity: Severity,
        metadata: Option<&Metadata>,
    ) {
        self.log_message(&describe_error(error), severity, metadata);
    }

    fn verbose(&self, message: &str) {
        self.log_message(message, Severity::Verbose, None);
    }

    fn info(&self, message: &str) {
        self.log_message(message, Severity::Information, None);
    }

    fn warning(&self, message: &str) {
        self.log_message(message, Severity::Warning, None);
    }

    fn error(&self, message: &str) {
        self.log_message(message, Severity::Error, None);
    }

    fn critical(&self, message: &str) {
        self.log_message(message, Severity::Critical, None);
    }
}

/// Render an error and its sources, one `caused by` line per source.
#[must_use]
pub fn describe_error(error: &(dyn Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(out, "\ncaused by: {cause}");
        source = cause.source();
    }
    out
}
