//! Configuration types for the dayplan host.

use crate::error::{DayplanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DayplanConfig {
    /// Task store settings.
    pub store: StoreConfig,
    /// Reminder delivery and today-view refresh settings.
    pub reminders: ReminderConfig,
    /// Log filter settings.
    pub logging: LoggingConfig,
}

/// Task store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the persisted task collection.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: crate::app_dirs::tasks_file(),
        }
    }
}

/// Reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Title of every reminder notification. The body is the task text.
    pub notification_title: String,
    /// Seconds between re-projections of the today view.
    ///
    /// A re-projection picks up midnight rollover even when the store
    /// has not changed.
    pub refresh_interval_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            notification_title: "Task reminder".to_owned(),
            refresh_interval_secs: 60,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl DayplanConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| DayplanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::metadata(path) {
            Ok(_) => Self::from_file(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DayplanError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.reminders.notification_title.trim().is_empty() {
            return Err(DayplanError::Config(
                "reminders.notification_title must not be empty".to_owned(),
            ));
        }
        if self.reminders.refresh_interval_secs == 0 {
            return Err(DayplanError::Config(
                "reminders.refresh_interval_secs must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
