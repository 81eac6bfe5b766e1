//! `SQLite` storage backend.
//!
//! Durable once a write returns. The barcode column is `UNIQUE` and log rows
//! carry a foreign key to their extinguisher, so the database enforces the
//! same invariants the checks here report.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use super::{migrations, Backend, ExtinguisherStore, MaintenanceLogStore, Store};
use crate::error::{Error, Result};
use crate::model::{
    ExtinguisherWithLogs, FireExtinguisher, MaintenanceLog, NewFireExtinguisher,
    NewMaintenanceLog,
};

const SELECT_EXTINGUISHER: &str = r"
    SELECT id, barcode, extinguisher_no, location, date_of_testing, created_at
    FROM extinguishers
";

const SELECT_LOGS_FOR: &str = r"
    SELECT id, extinguisher_id, date_work_done, remarks, technician, created_at
    FROM maintenance_logs WHERE extinguisher_id = ?1
    ORDER BY date_work_done DESC, created_at DESC, seq DESC
";

/// Relational store over a single `SQLite` connection.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StoragePoisoned("sqlite"))
    }

    fn exists(conn: &Connection, id: Uuid) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM extinguishers WHERE id = ?1",
                [id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn history(conn: &Connection, id: Uuid) -> Result<Vec<MaintenanceLog>> {
        let mut stmt = conn.prepare_cached(SELECT_LOGS_FOR)?;
        let logs = stmt
            .query_map([id.to_string()], Self::row_to_log)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    fn row_to_extinguisher(row: &rusqlite::Row) -> rusqlite::Result<FireExtinguisher> {
        Ok(FireExtinguisher {
            id: parse_column(row, 0, Uuid::from_str)?,
            barcode: row.get(1)?,
            extinguisher_no: row.get(2)?,
            location: row.get(3)?,
            date_of_testing: parse_column(row, 4, NaiveDate::from_str)?,
            created_at: parse_column(row, 5, parse_timestamp)?,
        })
    }

    fn row_to_log(row: &rusqlite::Row) -> rusqlite::Result<MaintenanceLog> {
        Ok(MaintenanceLog {
            id: parse_column(row, 0, Uuid::from_str)?,
            extinguisher_id: parse_column(row, 1, Uuid::from_str)?,
            date_work_done: parse_column(row, 2, NaiveDate::from_str)?,
            remarks: row.get(3)?,
            user: row.get(4)?,
            created_at: parse_column(row, 5, parse_timestamp)?,
        })
    }
}

/// Decode a text column with `parse`, reporting failures as conversion errors.
fn parse_column<T, E>(
    row: &rusqlite::Row,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    parse(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(text: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl ExtinguisherStore for SqliteStore {
    fn get(&self, barcode: &str) -> Result<Option<ExtinguisherWithLogs>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("{SELECT_EXTINGUISHER} WHERE barcode = ?1"),
                [barcode],
                Self::row_to_extinguisher,
            )
            .optional()?;

        match record {
            Some(extinguisher) => {
                let maintenance_logs = Self::history(&conn, extinguisher.id)?;
                Ok(Some(ExtinguisherWithLogs {
                    extinguisher,
                    maintenance_logs,
                }))
            }
            None => {
                debug!("No record for barcode {}", barcode);
                Ok(None)
            }
        }
    }

    fn create(&self, new: NewFireExtinguisher) -> Result<FireExtinguisher> {
        let conn = self.lock()?;
        let taken = conn
            .query_row(
                "SELECT 1 FROM extinguishers WHERE barcode = ?1",
                [&new.barcode],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if taken {
            debug!("Rejecting duplicate barcode {}", new.barcode);
            return Err(Error::DuplicateBarcode {
                barcode: new.barcode,
            });
        }

        let record = FireExtinguisher::from_new(new);
        let inserted = conn.execute(
            r"
            INSERT INTO extinguishers
                (id, barcode, extinguisher_no, location, date_of_testing, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                record.id.to_string(),
                record.barcode,
                record.extinguisher_no,
                record.location,
                record.date_of_testing.to_string(),
                format_timestamp(record.created_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::DuplicateBarcode {
                    barcode: record.barcode,
                })
            }
            Err(e) => return Err(e.into()),
        }

        info!("Registered {} as {}", record.barcode, record.id);
        Ok(record)
    }

    fn list(&self) -> Result<Vec<FireExtinguisher>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_EXTINGUISHER} ORDER BY barcode"))?;
        let records = stmt
            .query_map([], Self::row_to_extinguisher)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl MaintenanceLogStore for SqliteStore {
    fn append(&self, extinguisher_id: Uuid, entry: NewMaintenanceLog) -> Result<MaintenanceLog> {
        let conn = self.lock()?;
        if !Self::exists(&conn, extinguisher_id)? {
            return Err(Error::UnknownExtinguisher {
                id: extinguisher_id,
            });
        }

        let log = MaintenanceLog::from_new(extinguisher_id, entry);
        conn.execute(
            r"
            INSERT INTO maintenance_logs
                (id, extinguisher_id, date_work_done, remarks, technician, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                log.id.to_string(),
                log.extinguisher_id.to_string(),
                log.date_work_done.to_string(),
                log.remarks,
                log.user,
                format_timestamp(log.created_at),
            ],
        )?;

        info!("Appended log {} to {}", log.id, extinguisher_id);
        Ok(log)
    }

    fn list_for(&self, extinguisher_id: Uuid) -> Result<Vec<MaintenanceLog>> {
        let conn = self.lock()?;
        Self::history(&conn, extinguisher_id)
    }
}

impl Store for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }
}
