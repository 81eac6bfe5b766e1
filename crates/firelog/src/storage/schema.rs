//! `SQLite` schema definitions for firelog.
//!
//! Dates are stored as `YYYY-MM-DD` text and timestamps as fixed-width
//! RFC 3339 text, so both sort correctly as strings.

/// SQL statement to create the extinguishers table.
pub const CREATE_EXTINGUISHERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS extinguishers (
    id TEXT PRIMARY KEY,
    barcode TEXT NOT NULL UNIQUE,
    extinguisher_no TEXT NOT NULL,
    location TEXT NOT NULL,
    date_of_testing TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the maintenance log table.
///
/// `seq` records insertion order and breaks ties between entries with the
/// same work date and timestamp.
pub const CREATE_MAINTENANCE_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS maintenance_logs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    extinguisher_id TEXT NOT NULL REFERENCES extinguishers(id),
    date_work_done TEXT NOT NULL,
    remarks TEXT NOT NULL,
    technician TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Index serving history lookups in presentation order.
pub const CREATE_LOG_HISTORY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_logs_history
    ON maintenance_logs(extinguisher_id, date_work_done DESC, created_at DESC)
";

/// Base schema statements, in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_EXTINGUISHERS_TABLE,
    CREATE_MAINTENANCE_LOGS_TABLE,
    CREATE_METADATA_TABLE,
];
