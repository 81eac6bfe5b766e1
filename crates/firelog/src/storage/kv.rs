//! Durable key-value storage backend.
//!
//! Each record is stored under the key `"{prefix}:{barcode}"` with its full
//! history serialized as JSON, the same shape the HTTP lookup returns. The
//! key space is kept in memory and the whole document is written back to a
//! single file after every mutation.
//!
//! Writes go to a sibling temporary file that is then renamed over the
//! document, so a failed write leaves the previous contents in place. A
//! mutation only becomes visible in memory once it is on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Backend, ExtinguisherStore, MaintenanceLogStore, Store};
use crate::error::{Error, Result};
use crate::model::{
    ExtinguisherWithLogs, FireExtinguisher, MaintenanceLog, NewFireExtinguisher,
    NewMaintenanceLog,
};

/// Key prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "fe_extinguisher";

type Entries = BTreeMap<String, String>;

/// File-backed key-value store.
#[derive(Debug)]
pub struct KvStore {
    path: PathBuf,
    prefix: String,
    entries: Mutex<Entries>,
}

impl KvStore {
    /// Open the document at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store; it is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// document cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let entries = if path.exists() {
            debug!("Loading key-value document from {}", path.display());
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            Entries::new()
        };

        info!(
            "Key-value store opened at {} ({} keys)",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            prefix: prefix.into(),
            entries: Mutex::new(entries),
        })
    }

    /// Get the path to the document file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The storage key for a barcode.
    #[must_use]
    pub fn key_for(&self, barcode: &str) -> String {
        format!("{}:{barcode}", self.prefix)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| Error::StoragePoisoned("key-value"))
    }

    fn owns(&self, key: &str) -> bool {
        key.strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.starts_with(':'))
    }

    fn decode(key: &str, value: &str) -> Result<ExtinguisherWithLogs> {
        serde_json::from_str(value).map_err(|e| Error::CorruptValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn records<'a>(
        &'a self,
        entries: &'a Entries,
    ) -> impl Iterator<Item = Result<ExtinguisherWithLogs>> + 'a {
        entries
            .iter()
            .filter(|(key, _)| self.owns(key))
            .map(|(key, value)| Self::decode(key, value))
    }

    /// Write `key = value` through to disk, then into memory.
    fn put(&self, entries: &mut Entries, key: String, value: &ExtinguisherWithLogs) -> Result<()> {
        let mut next = entries.clone();
        next.insert(key, serde_json::to_string(value)?);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let bytes = serde_json::to_vec_pretty(entries)?;
        if let Err(e) = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, &self.path)) {
            warn!("Failed to write {}: {}", self.path.display(), e);
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl ExtinguisherStore for KvStore {
    fn get(&self, barcode: &str) -> Result<Option<ExtinguisherWithLogs>> {
        let key = self.key_for(barcode);
        let entries = self.lock()?;
        entries
            .get(&key)
            .map(|value| Self::decode(&key, value))
            .transpose()
    }

    fn create(&self, new: NewFireExtinguisher) -> Result<FireExtinguisher> {
        let key = self.key_for(&new.barcode);
        let mut entries = self.lock()?;
        if entries.contains_key(&key) {
            debug!("Rejecting duplicate barcode {}", new.barcode);
            return Err(Error::DuplicateBarcode {
                barcode: new.barcode,
            });
        }

        let record = FireExtinguisher::from_new(new);
        self.put(&mut entries, key, &ExtinguisherWithLogs::new(record.clone()))?;
        info!("Registered {} as {}", record.barcode, record.id);
        Ok(record)
    }

    fn list(&self) -> Result<Vec<FireExtinguisher>> {
        let entries = self.lock()?;
        self.records(&entries)
            .map(|r| r.map(|with_logs| with_logs.extinguisher))
            .collect()
    }
}

impl MaintenanceLogStore for KvStore {
    fn append(&self, extinguisher_id: Uuid, entry: NewMaintenanceLog) -> Result<MaintenanceLog> {
        let mut entries = self.lock()?;
        let mut record = self
            .records(&entries)
            .find(|r| {
                r.as_ref()
                    .map_or(true, |with_logs| with_logs.extinguisher.id == extinguisher_id)
            })
            .transpose()?
            .ok_or(Error::UnknownExtinguisher {
                id: extinguisher_id,
            })?;

        let log = MaintenanceLog::from_new(extinguisher_id, entry);
        record.maintenance_logs.insert(0, log.clone());
        record.maintenance_logs.sort_by(MaintenanceLog::newest_first);

        let key = self.key_for(&record.extinguisher.barcode);
        self.put(&mut entries, key, &record)?;
        info!("Appended log {} to {}", log.id, extinguisher_id);
        Ok(log)
    }

    fn list_for(&self, extinguisher_id: Uuid) -> Result<Vec<MaintenanceLog>> {
        let entries = self.lock()?;
        for record in self.records(&entries) {
            let record = record?;
            if record.extinguisher.id == extinguisher_id {
                return Ok(record.maintenance_logs);
            }
        }
        Ok(Vec::new())
    }
}

impl Store for KvStore {
    fn backend(&self) -> Backend {
        Backend::File
    }
}
