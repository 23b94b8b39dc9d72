//! Extension settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::UserId;

/// Settings for the CodeToast extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToastSettings {
    /// Command prefix the host uses to recognise invocations.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// The single user allowed to run commands. `None` defers to the host.
    #[serde(default)]
    pub owner_id: Option<u64>,

    /// Idle time before a paginator session closes itself, in seconds.
    #[serde(default = "default_paginator_timeout")]
    pub paginator_timeout_secs: u64,

    /// Delete paginated messages on timeout instead of stripping reactions.
    #[serde(default)]
    pub delete_on_close: bool,

    /// Largest file the `cat` command agrees to read, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Log level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_command_prefix() -> String {
    "!".to_owned()
}

fn default_paginator_timeout() -> u64 {
    7200 // 2 hours
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for ToastSettings {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            owner_id: None,
            paginator_timeout_secs: default_paginator_timeout(),
            delete_on_close: false,
            max_file_size: default_max_file_size(),
            log_level: default_log_level(),
        }
    }
}

impl ToastSettings {
    /// Creates settings from environment variables with defaults.
    ///
    /// Unparseable numeric values fall back to their defaults; use
    /// [`ToastSettings::from_env`] to reject them instead.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            command_prefix: std::env::var("TOAST_PREFIX")
                .unwrap_or_else(|_| default_command_prefix()),
            owner_id: std::env::var("TOAST_OWNER_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
            paginator_timeout_secs: std::env::var("TOAST_PAGINATOR_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_paginator_timeout),
            delete_on_close: std::env::var("TOAST_DELETE_ON_CLOSE")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(false),
            max_file_size: std::env::var("TOAST_MAX_FILE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_file_size),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_level()),
        }
    }

    /// Creates settings from environment variables, failing on malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::from_env_with_defaults();

        if let Ok(raw) = std::env::var("TOAST_OWNER_ID") {
            settings.owner_id = Some(
                raw.parse()
                    .map_err(|_| ConfigError::InvalidValue("TOAST_OWNER_ID", raw))?,
            );
        }

        if let Ok(raw) = std::env::var("TOAST_PAGINATOR_TIMEOUT") {
            settings.paginator_timeout_secs = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TOAST_PAGINATOR_TIMEOUT", raw))?;
        }

        if let Ok(raw) = std::env::var("TOAST_DELETE_ON_CLOSE") {
            settings.delete_on_close = parse_bool(&raw)
                .ok_or(ConfigError::InvalidValue("TOAST_DELETE_ON_CLOSE", raw))?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Checks the settings for values the extension cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.paginator_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "TOAST_PAGINATOR_TIMEOUT",
                self.paginator_timeout_secs.to_string(),
            ));
        }
        Ok(())
    }

    /// The configured owner as a host identity.
    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        self.owner_id.map(UserId)
    }

    /// Paginator idle timeout.
    #[must_use]
    pub const fn paginator_timeout(&self) -> Duration {
        Duration::from_secs(self.paginator_timeout_secs)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    InvalidValue(&'static str, String),

    #[error("Command prefix must not be empty")]
    EmptyPrefix,
}
