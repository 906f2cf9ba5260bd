//! Tracking store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name of the snapshot written next to the running executable.
pub const DEFAULT_SNAPSHOT_FILE: &str = "tracking_data.json";

/// Key of the entry written into a freshly bootstrapped snapshot.
pub const DEFAULT_PLACEHOLDER_KEY: &str = "__bootstrap__";

/// Where and how the tracking snapshot is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Path of the JSON snapshot file.
    pub snapshot_path: PathBuf,
    /// Key of the placeholder entry written when bootstrapping.
    pub placeholder_key: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            snapshot_path: install_dir().join(DEFAULT_SNAPSHOT_FILE),
            placeholder_key: DEFAULT_PLACEHOLDER_KEY.to_string(),
        }
    }
}

/// Directory of the running executable, or the working directory if unknown.
fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}
