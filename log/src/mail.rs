//! Mail-dispatching logger sink.
//!
//! Records at or above the configured severity are queued on a bounded
//! channel. A background task renders each one into a [`MailMessage`] and
//! hands it to a [`MailTransport`]. The caller never waits: when the queue is
//! full or the worker is gone the record is dropped and counted.

use std::fmt::Write;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use scopekeeper_types::Severity;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::sink::{Logger, Metadata};

/// Longest subject line before truncation, in characters.
const MAX_SUBJECT_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub from: String,
    pub to: Vec<String>,
    pub subject_prefix: String,
    pub min_severity: Severity,
    pub queue_capacity: usize,
}

impl MailSettings {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
    pub const DEFAULT_SUBJECT_PREFIX: &'static str = "[scopekeeper]";
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: Vec::new(),
            subject_prefix: Self::DEFAULT_SUBJECT_PREFIX.to_string(),
            min_severity: Severity::Error,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Mail transport future type alias.
pub type MailFut<'a> = Pin<Box<dyn Future<Output = Result<(), MailError>> + Send + 'a>>;

pub trait MailTransport: Send + Sync {
    fn send<'a>(&'a self, message: &'a MailMessage) -> MailFut<'a>;
}

/// Writes rendered mail to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

impl MailTransport for TracingTransport {
    fn send<'a>(&'a self, message: &'a MailMessage) -> MailFut<'a> {
        Box::pin(async move {
            tracing::info!(
                from = %message.from,
                to = %message.to.join(", "),
                subject = %message.subject,
                "Mail (dry run)\n{}",
                message.body
            );
            Ok(())
        })
    }
}

/// A record queued for the mail worker. Rendering happens on the worker.
#[derive(Debug, Clone)]
struct LogRecord {
    message: String,
    severity: Severity,
    metadata: Metadata,
    at: DateTime<Utc>,
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn render(settings: &MailSettings, record: &LogRecord) -> MailMessage {
    let headline = record.message.lines().next().unwrap_or("").trim();
    let subject = truncate_chars(
        &format!(
            "{} [{}] {}",
            settings.subject_prefix,
            record.severity.label(),
            headline
        ),
        MAX_SUBJECT_CHARS,
    );

    let mut body = String::new();
    let _ = writeln!(body, "Severity: {}", record.severity);
    let _ = writeln!(
        body,
        "Time: {}",
        record.at.to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    body.push_str("\nMessage:\n");
    body.push_str(&record.message);
    body.push('\n');
    if !record.metadata.is_empty() {
        body.push_str("\nDetails:\n");
        for (key, value) in &record.metadata {
            let _ = writeln!(body, "  {key}: {value}");
        }
    }

    MailMessage {
        from: settings.from.clone(),
        to: settings.to.clone(),
        subject,
        body,
    }
}

/// Sink that mails records at or above `min_severity`.
///
/// Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct MailLogger {
    min_severity: Severity,
    tx: mpsc::Sender<LogRecord>,
    dropped: Arc<AtomicU64>,
}

/// The background task delivering mail for a [`MailLogger`].
///
/// The task ends once every clone of its logger has been dropped and the
/// queue is drained.
pub struct MailWorker {
    handle: JoinHandle<usize>,
}

impl MailWorker {
    /// Wait for the queue to drain. Returns the number of mails delivered.
    pub async fn finish(self) -> usize {
        match self.handle.await {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::warn!("Mail worker ended abnormally: {e}");
                0
            }
        }
    }
}

impl MailLogger {
    /// Start the sink and its worker on the current tokio runtime.
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(settings: MailSettings, transport: Arc<dyn MailTransport>) -> (Self, MailWorker) {
        let (logger, rx) = Self::channel(&settings);
        let handle = tokio::spawn(run_worker(settings, transport, rx));
        (logger, MailWorker { handle })
    }

    fn channel(settings: &MailSettings) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let logger = Self {
            min_severity: settings.min_severity,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (logger, rx)
    }

    #[must_use]
    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    /// Records discarded because the queue was full or the worker had stopped.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Logger for MailLogger {
    fn log_message(&self, message: &str, severity: Severity, metadata: Option<&Metadata>) {
        if !severity.at_least(self.min_severity) {
            return;
        }
        let record = LogRecord {
            message: message.to_string(),
            severity,
            metadata: metadata.cloned().unwrap_or_default(),
            at: Utc::now(),
        };
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%severity, "Mail queue full; dropping log record");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%severity, "Mail worker stopped; dropping log record");
            }
        }
    }
}

async fn run_worker(
    settings: MailSettings,
    transport: Arc<dyn MailTransport>,
    mut rx: mpsc::Receiver<LogRecord>,
) -> usize {
    let mut delivered = 0;
    while let Some(record) = rx.recv().await {
        let message = render(&settings, &record);
        match transport.send(&message).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(subject = %message.subject, "Failed to send log mail: {e}");
            }
        }
    }
    delivered
}
