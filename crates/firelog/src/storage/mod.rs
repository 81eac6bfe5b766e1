//! Storage layer for firelog.
//!
//! Two contracts live here: the [`ExtinguisherStore`] maps barcodes to
//! registered records and the [`MaintenanceLogStore`] holds the append-only
//! history of each record. Every backend implements both, and callers hold
//! the pair as one [`Store`] trait object chosen at startup:
//!
//! - [`MemoryStore`]: process-local maps, lost on exit.
//! - [`KvStore`]: a durable key-value document on disk.
//! - [`SqliteStore`]: a `SQLite` database.
//!
//! No backend exposes update or delete.

pub mod kv;
pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod contract;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    ExtinguisherWithLogs, FireExtinguisher, MaintenanceLog, NewFireExtinguisher,
    NewMaintenanceLog,
};

pub use kv::KvStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Barcode-keyed registry of fire extinguishers.
pub trait ExtinguisherStore: Send + Sync + std::fmt::Debug {
    /// Look up a record by exact barcode, with its history attached.
    ///
    /// An unknown barcode is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing store fails.
    fn get(&self, barcode: &str) -> Result<Option<ExtinguisherWithLogs>>;

    /// Register a new record.
    ///
    /// The uniqueness check and the insert happen as one step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateBarcode`](crate::Error::DuplicateBarcode) if
    /// the barcode is taken, or a storage error. Nothing is written on error.
    fn create(&self, new: NewFireExtinguisher) -> Result<FireExtinguisher>;

    /// All registered records, without history.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn list(&self) -> Result<Vec<FireExtinguisher>>;
}

/// Append-only maintenance history keyed by record identity.
pub trait MaintenanceLogStore: Send + Sync + std::fmt::Debug {
    /// Record a maintenance event against an existing extinguisher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExtinguisher`](crate::Error::UnknownExtinguisher)
    /// if no record has this id, or a storage error. Nothing is written on
    /// error.
    fn append(&self, extinguisher_id: Uuid, entry: NewMaintenanceLog) -> Result<MaintenanceLog>;

    /// History of one extinguisher, newest work first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn list_for(&self, extinguisher_id: Uuid) -> Result<Vec<MaintenanceLog>>;
}

/// A complete backend: both stores over one underlying medium.
pub trait Store: ExtinguisherStore + MaintenanceLogStore {
    /// Which backend this is.
    fn backend(&self) -> Backend;
}

/// Available storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process maps. Nothing survives a restart.
    Memory,
    /// JSON key-value document on disk.
    File,
    /// `SQLite` database.
    #[default]
    Sqlite,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl Backend {
    /// Whether records written to this backend survive a restart.
    #[must_use]
    pub fn is_durable(self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// Open the backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the backend's file or database cannot be opened.
pub fn open(config: &Config) -> Result<Arc<dyn Store>> {
    let backend = config.storage.backend;
    let store: Arc<dyn Store> = match backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::File => Arc::new(KvStore::open(
            config.kv_path(),
            config.storage.key_prefix.clone(),
        )?),
        Backend::Sqlite => Arc::new(SqliteStore::open(config.database_path())?),
    };
    if backend.is_durable() {
        info!("Using {} storage backend", backend);
    } else {
        info!("Using {} storage backend; records are lost on exit", backend);
    }
    Ok(store)
}
