//! Load destinations and loader clients.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a pipeline loads its data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadDestination {
    /// The remote server.
    pub server: String,
    /// The database on that server.
    pub database: String,
    /// The target table.
    pub table: String,
}

impl LoadDestination {
    /// Creates a destination descriptor.
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for LoadDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.server, self.database, self.table)
    }
}

/// A client writing tabular data into a destination store.
///
/// Errors from the remote store are returned unchanged.
pub trait Loader<D> {
    /// Inserts `data` into `table`.
    fn insert(&self, data: &D, table: &str) -> anyhow::Result<()>;
}

/// Builds a loader for a destination. Called once per load.
pub type LoaderFactory<D> = Box<dyn Fn(&LoadDestination) -> anyhow::Result<Box<dyn Loader<D>>>>;

/// Returns the factory used when the caller does not pick a loader.
///
/// It refuses to build a loader, so a pipeline without one fails at the load
/// stage and never reaches clean.
#[must_use]
pub fn default_loader_factory<D: 'static>() -> LoaderFactory<D> {
    Box::new(
        |destination: &LoadDestination| -> anyhow::Result<Box<dyn Loader<D>>> {
            Err(anyhow::anyhow!("no loader configured for {destination}"))
        },
    )
}

/// A loader keeping every inserted batch in memory. Clones share the batches.
#[derive(Debug)]
pub struct MemoryLoader<D> {
    batches: Arc<Mutex<Vec<(String, D)>>>,
}

impl<D> Clone for MemoryLoader<D> {
    fn clone(&self) -> Self {
        Self {
            batches: Arc::clone(&self.batches),
        }
    }
}

impl<D> Default for MemoryLoader<D> {
    fn default() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<D: Clone> MemoryLoader<D> {
    /// Creates an empty memory loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the inserted `(table, data)` batches in order.
    #[must_use]
    pub fn batches(&self) -> Vec<(String, D)> {
        self.batches.lock().clone()
    }

    /// Returns the number of inserted batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// Returns true if nothing was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }
}

impl<D: Clone> Loader<D> for MemoryLoader<D> {
    fn insert(&self, data: &D, table: &str) -> anyhow::Result<()> {
        self.batches.lock().push((table.to_string(), data.clone()));
        Ok(())
    }
}
