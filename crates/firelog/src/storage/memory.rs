//! In-process storage backend.
//!
//! Everything lives in maps behind a single mutex, so each operation is
//! atomic with respect to every other. Nothing is persisted: records are
//! gone when the process exits.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};
use uuid::Uuid;

use super::{Backend, ExtinguisherStore, MaintenanceLogStore, Store};
use crate::error::{Error, Result};
use crate::model::{
    sort_newest_first, ExtinguisherWithLogs, FireExtinguisher, MaintenanceLog,
    NewFireExtinguisher, NewMaintenanceLog,
};

#[derive(Debug, Default)]
struct Tables {
    by_barcode: BTreeMap<String, FireExtinguisher>,
    barcode_of: HashMap<Uuid, String>,
    /// Entries per record in insertion order.
    logs: HashMap<Uuid, Vec<MaintenanceLog>>,
}

impl Tables {
    fn history(&self, id: Uuid) -> Vec<MaintenanceLog> {
        let mut logs = self.logs.get(&id).cloned().unwrap_or_default();
        sort_newest_first(&mut logs);
        logs
    }
}

/// Volatile store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::StoragePoisoned("memory"))
    }
}

impl ExtinguisherStore for MemoryStore {
    fn get(&self, barcode: &str) -> Result<Option<ExtinguisherWithLogs>> {
        let tables = self.lock()?;
        Ok(tables.by_barcode.get(barcode).map(|record| ExtinguisherWithLogs {
            extinguisher: record.clone(),
            maintenance_logs: tables.history(record.id),
        }))
    }

    fn create(&self, new: NewFireExtinguisher) -> Result<FireExtinguisher> {
        let mut tables = self.lock()?;
        if tables.by_barcode.contains_key(&new.barcode) {
            debug!("Rejecting duplicate barcode {}", new.barcode);
            return Err(Error::DuplicateBarcode {
                barcode: new.barcode,
            });
        }

        let record = FireExtinguisher::from_new(new);
        tables.barcode_of.insert(record.id, record.barcode.clone());
        tables
            .by_barcode
            .insert(record.barcode.clone(), record.clone());
        info!("Registered {} as {}", record.barcode, record.id);
        Ok(record)
    }

    fn list(&self) -> Result<Vec<FireExtinguisher>> {
        Ok(self.lock()?.by_barcode.values().cloned().collect())
    }
}

impl MaintenanceLogStore for MemoryStore {
    fn append(&self, extinguisher_id: Uuid, entry: NewMaintenanceLog) -> Result<MaintenanceLog> {
        let mut tables = self.lock()?;
        if !tables.barcode_of.contains_key(&extinguisher_id) {
            return Err(Error::UnknownExtinguisher {
                id: extinguisher_id,
            });
        }

        let log = MaintenanceLog::from_new(extinguisher_id, entry);
        tables
            .logs
            .entry(extinguisher_id)
            .or_default()
            .push(log.clone());
        info!("Appended log {} to {}", log.id, extinguisher_id);
        Ok(log)
    }

    fn list_for(&self, extinguisher_id: Uuid) -> Result<Vec<MaintenanceLog>> {
        Ok(self.lock()?.history(extinguisher_id))
    }
}

impl Store for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract::{self, store_contract_tests};

    store_contract_tests!(MemoryStore::new());

    #[test]
    fn test_backend() {
        assert_eq!(MemoryStore::new().backend(), Backend::Memory);
    }

    #[test]
    fn test_list_in_barcode_order() {
        let store = MemoryStore::new();
        for code in ["FE-010", "FE-002", "FE-001"] {
            store.create(contract::new_extinguisher(code)).unwrap();
        }
        let codes: Vec<_> = store.list().unwrap().into_iter().map(|r| r.barcode).collect();
        assert_eq!(codes, ["FE-001", "FE-002", "FE-010"]);
    }

    #[test]
    fn test_separate_stores_do_not_share_state() {
        let a = MemoryStore::new();
        let b = MemoryStore::new();
        a.create(contract::new_extinguisher("FE-001")).unwrap();

        assert!(a.get("FE-001").unwrap().is_some());
        assert!(b.get("FE-001").unwrap().is_none());
    }
}
