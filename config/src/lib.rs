//! Configuration loading for Scopekeeper.
//!
//! ```toml
//! [registry]
//! chain = ["request", "thread", "ambient"]
//! slot = "scopekeeper.unit_of_work_stack"
//!
//! [logging]
//! filter = "info"
//! min_severity = "information"
//!
//! [mail]
//! enabled = true
//! from = "ops@example.com"
//! to = ["${ONCALL_ADDRESS}"]
//! subject_prefix = "[orders]"
//! min_severity = "error"
//! queue_capacity = 64
//! ```

mod env;
mod mail;
mod registry;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use scopekeeper_log::{FanoutLogger, MailLogger, MailTransport, MailWorker, TracingLogger};
use scopekeeper_types::Severity;

pub use mail::{MailConfig, MailConfigError};
pub use registry::{AdapterKind, RegistryConfig};

#[derive(Debug, Default, Deserialize)]
pub struct ScopekeeperConfig {
    pub registry: Option<RegistryConfig>,
    pub logging: Option<LoggingConfig>,
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    /// Threshold for the tracing logger sink. Default: information.
    pub min_severity: Option<Severity>,
}

impl ScopekeeperConfig {
    /// Load from the default path. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|err| {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            }
        })?;

        Self::parse(&content).map(Some).map_err(|err| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn registry(&self) -> RegistryConfig {
        self.registry.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.filter.as_deref())
    }

    /// Build the configured logger sinks.
    ///
    /// The mail sink is started only when `[mail]` is enabled, which requires
    /// a tokio runtime. Its worker is returned so the caller can drain it on
    /// shutdown.
    pub fn loggers(&self, transport: Arc<dyn MailTransport>) -> (FanoutLogger, Option<MailWorker>) {
        let min_severity = self
            .logging
            .as_ref()
            .and_then(|l| l.min_severity)
            .unwrap_or_default();
        let mut fanout = FanoutLogger::new().with(Arc::new(TracingLogger::new(min_severity)));

        let worker = match &self.mail {
            Some(mail) if mail.enabled() => {
                let (logger, worker) = MailLogger::start(mail.settings().clone(), transport);
                fanout.push(Arc::new(logger));
                Some(worker)
            }
            _ => None,
        };
        (fanout, worker)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".scopekeeper").join("config.toml"))
}
