use serde::Deserialize;
use thiserror::Error;

use scopekeeper_log::MailSettings;
use scopekeeper_types::Severity;

use crate::env::expand_env_vars;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailConfigError {
    #[error("mail.from must not be empty when mail is enabled")]
    MissingFrom,
    #[error("mail.to must list at least one recipient when mail is enabled")]
    NoRecipients,
    #[error("mail.queue_capacity must be at least 1")]
    ZeroCapacity,
}

#[derive(Deserialize)]
struct RawMailConfig {
    #[serde(default)]
    enabled: bool,
    from: Option<String>,
    #[serde(default)]
    to: Vec<String>,
    subject_prefix: Option<String>,
    min_severity: Option<Severity>,
    queue_capacity: Option<usize>,
}

/// Validated `[mail]` section.
///
/// Invariant: when `enabled`, the sender and at least one recipient are
/// non-empty after `${VAR}` expansion.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawMailConfig")]
pub struct MailConfig {
    enabled: bool,
    settings: MailSettings,
}

impl TryFrom<RawMailConfig> for MailConfig {
    type Error = MailConfigError;

    fn try_from(raw: RawMailConfig) -> Result<Self, Self::Error> {
        let from = raw
            .from
            .as_deref()
            .map(expand_env_vars)
            .unwrap_or_default()
            .trim()
            .to_string();
        let to: Vec<String> = raw
            .to
            .iter()
            .map(|addr| expand_env_vars(addr).trim().to_string())
            .filter(|addr| !addr.is_empty())
            .collect();
        let queue_capacity = raw
            .queue_capacity
            .unwrap_or(MailSettings::DEFAULT_QUEUE_CAPACITY);

        if queue_capacity == 0 {
            return Err(MailConfigError::ZeroCapacity);
        }
        if raw.enabled {
            if from.is_empty() {
                return Err(MailConfigError::MissingFrom);
            }
            if to.is_empty() {
                return Err(MailConfigError::NoRecipients);
            }
        }

        let defaults = MailSettings::default();
        Ok(Self {
            enabled: raw.enabled,
            settings: MailSettings {
                from,
                to,
                subject_prefix: raw
                    .subject_prefix
                    .as_deref()
                    .map(expand_env_vars)
                    .unwrap_or(defaults.subject_prefix),
                min_severity: raw.min_severity.unwrap_or(defaults.min_severity),
                queue_capacity,
            },
        })
    }
}

impl MailConfig {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn settings(&self) -> &MailSettings {
        &self.settings
    }
}
