//! Routing a scanned or typed barcode to its record or to registration.
//!
//! The [`Resolver`] is the one place that decides what happens to a code. A
//! known barcode resolves to the record and its history; an unknown one
//! resolves to [`Resolution::Unregistered`] carrying the normalized code, so
//! the caller can pre-fill a registration form with it.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::barcode;
use crate::error::{Error, Result};
use crate::model::{ExtinguisherWithLogs, LogEntryRequest, MaintenanceLog, RegisterRequest};
use crate::storage::Store;

/// Outcome of resolving a barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// The barcode is registered.
    Found {
        /// The record with its history, newest first.
        record: ExtinguisherWithLogs,
    },
    /// No record has this barcode yet.
    Unregistered {
        /// The normalized barcode, ready for registration.
        barcode: String,
    },
}

/// Barcode resolution over a shared store.
#[derive(Debug, Clone)]
pub struct Resolver {
    store: Arc<dyn Store>,
}

impl Resolver {
    /// Create a resolver over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Resolve a raw barcode.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the barcode is blank after
    /// normalization, or a storage error if the lookup fails.
    pub fn resolve(&self, raw: &str) -> Result<Resolution> {
        let barcode = barcode::normalize(raw)
            .map_err(|_| Error::invalid_field("barcode", "Please enter a barcode"))?;

        match self.store.get(&barcode)? {
            Some(record) => {
                debug!(
                    "Resolved {} with {} log entries",
                    barcode,
                    record.maintenance_logs.len()
                );
                Ok(Resolution::Found { record })
            }
            None => {
                debug!("Barcode {} is not registered", barcode);
                Ok(Resolution::Unregistered { barcode })
            }
        }
    }

    /// Register a new record and move straight to its (empty) history.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input,
    /// [`Error::DuplicateBarcode`] if the code is taken, or a storage error.
    pub fn register(&self, request: RegisterRequest) -> Result<ExtinguisherWithLogs> {
        let new = request.into_new()?;
        let record = self.store.create(new)?;
        Ok(ExtinguisherWithLogs::new(record))
    }

    /// Append a maintenance entry to the record a barcode resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBarcode`] if the barcode is not registered, a
    /// validation error for bad input, or a storage error.
    pub fn add_log(&self, raw: &str, entry: LogEntryRequest) -> Result<MaintenanceLog> {
        let entry = entry.into_new()?;
        match self.resolve(raw)? {
            Resolution::Found { record } => self.store.append(record.extinguisher.id, entry),
            Resolution::Unregistered { barcode } => Err(Error::UnknownBarcode { barcode }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(MemoryStore::new()))
    }

    fn register_request(barcode: &str) -> RegisterRequest {
        RegisterRequest {
            barcode: barcode.to_string(),
            extinguisher_no: "EX-10".to_string(),
            location: "Lobby".to_string(),
            date_of_testing: "2024-01-01".to_string(),
        }
    }

    fn entry(day: &str, remarks: &str) -> LogEntryRequest {
        LogEntryRequest {
            date_work_done: day.to_string(),
            remarks: remarks.to_string(),
            user: "A".to_string(),
        }
    }

    #[test]
    fn test_unknown_barcode_routes_to_registration() {
        let outcome = resolver().resolve("FE-001").unwrap();
        assert_eq!(
            outcome,
            Resolution::Unregistered {
                barcode: "FE-001".to_string()
            }
        );
    }

    #[test]
    fn test_blank_barcode_rejected() {
        let err = resolver().resolve("   ").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Please enter a barcode");
    }

    #[test]
    fn test_normalizes_before_lookup() {
        let resolver = resolver();
        resolver.register(register_request("FE 001")).unwrap();

        match resolver.resolve("  FE%20001\n").unwrap() {
            Resolution::Found { record } => assert_eq!(record.extinguisher.barcode, "FE 001"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_register_transitions_to_found() {
        let resolver = resolver();
        let registered = resolver.register(register_request("FE-001")).unwrap();
        assert!(registered.maintenance_logs.is_empty());

        match resolver.resolve("FE-001").unwrap() {
            Resolution::Found { record } => assert_eq!(record, registered),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let resolver = resolver();
        resolver.register(register_request("FE-001")).unwrap();
        let err = resolver.register(register_request("FE-001")).unwrap_err();
        assert!(matches!(err, Error::DuplicateBarcode { .. }));
    }

    #[test]
    fn test_add_log_by_barcode() {
        let resolver = resolver();
        resolver.register(register_request("FE-001")).unwrap();
        resolver.add_log("FE-001", entry("2024-03-01", "inspect")).unwrap();
        resolver.add_log("FE-001", entry("2024-06-01", "refill")).unwrap();

        match resolver.resolve("FE-001").unwrap() {
            Resolution::Found { record } => {
                let remarks: Vec<_> = record
                    .maintenance_logs
                    .iter()
                    .map(|l| l.remarks.as_str())
                    .collect();
                assert_eq!(remarks, ["refill", "inspect"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_add_log_unregistered_barcode() {
        let err = resolver()
            .add_log("FE-404", entry("2024-03-01", "inspect"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownBarcode { ref barcode } if barcode == "FE-404"));
    }

    #[test]
    fn test_add_log_validates_before_lookup() {
        let err = resolver()
            .add_log("FE-404", entry("not a date", " "))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_resolution_serialization() {
        let json = serde_json::to_value(Resolution::Unregistered {
            barcode: "FE-001".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"outcome": "unregistered", "barcode": "FE-001"})
        );

        let resolver = resolver();
        resolver.register(register_request("FE-002")).unwrap();
        let json = serde_json::to_value(resolver.resolve("FE-002").unwrap()).unwrap();
        assert_eq!(json["outcome"], "found");
        assert_eq!(json["record"]["barcode"], "FE-002");
        assert_eq!(json["record"]["maintenanceLogs"], serde_json::json!([]));
    }
}
