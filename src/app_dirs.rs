//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! - `DAYPLAN_DATA_DIR` overrides [`data_dir`]
//! - `DAYPLAN_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the persisted task file. Resolves to `dirs::data_dir()/dayplan/`
/// by default.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DAYPLAN_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("dayplan"))
        .unwrap_or_else(|| PathBuf::from("/tmp/dayplan-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/dayplan/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DAYPLAN_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("dayplan"))
        .unwrap_or_else(|| PathBuf::from("/tmp/dayplan-config"))
}

/// Default location of the persisted task collection.
#[must_use]
pub fn tasks_file() -> PathBuf {
    data_dir().join("tasks.json")
}
