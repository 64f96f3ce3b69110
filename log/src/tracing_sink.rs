//! Logger sink that forwards to `tracing`.

use scopekeeper_types::Severity;

use crate::sink::{Logger, Metadata};

/// Emits every record as a `tracing` event at the matching level.
///
/// `Critical` has no tracing level of its own; it is emitted at `ERROR` with
/// `critical = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger {
    min_severity: Severity,
}

impl TracingLogger {
    #[must_use]
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    #[must_use]
    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }
}

impl Logger for TracingLogger {
    fn log_message(&self, message: &str, severity: Severity, metadata: Option<&Metadata>) {
        if !severity.at_least(self.min_severity) {
            return;
        }
        let empty = Metadata::new();
        let metadata = metadata.unwrap_or(&empty);
        match severity {
            Severity::Verbose => tracing::debug!(?metadata, "{message}"),
            Severity::Information => tracing::info!(?metadata, "{message}"),
            Severity::Warning => tracing::warn!(?metadata, "{message}"),
            Severity::Error => tracing::error!(?metadata, "{message}"),
            Severity::Critical => tracing::error!(critical = true, ?metadata, "{message}"),
        }
    }
}
