//! Snapshot persistence backends.
//!
//! A backend stores exactly one serialized snapshot of the whole tracking
//! table. Reads and writes always move the complete snapshot.

use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::config::TrackingConfig;
use crate::errors::Result;

/// Storage contract for the serialized tracking snapshot.
pub trait SnapshotBackend: Send {
    /// Reads the snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot has been written yet.
    fn read(&self) -> Result<Option<String>>;

    /// Replaces the snapshot with `contents`.
    fn write(&self, contents: &str) -> Result<()>;
}

/// A snapshot stored as a JSON file.
///
/// Writes land in a sibling temp file that is renamed over the target, so a
/// reader never observes a partially written snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a backend at the configured snapshot path.
    #[must_use]
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(&config.snapshot_path)
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotBackend for JsonFileBackend {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, contents)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), bytes = contents.len(), "Wrote tracking snapshot");
        Ok(())
    }
}

/// An in-memory snapshot. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    contents: Option<String>,
    writes: usize,
}

impl MemoryBackend {
    /// Creates an empty backend (no snapshot yet).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already holds a snapshot.
    #[must_use]
    pub fn with_contents(contents: impl Into<String>) -> Self {
        let backend = Self::new();
        backend.inner.lock().contents = Some(contents.into());
        backend
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.inner.lock().contents.clone()
    }

    /// Returns the number of writes performed.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }
}

impl SnapshotBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<()> {
        let mut slot = self.inner.lock();
        slot.contents = Some(contents.to_string());
        slot.writes += 1;
        Ok(())
    }
}
