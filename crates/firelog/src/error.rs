//! Error types for firelog.
//!
//! This module defines all error types used throughout the firelog crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Field name mapped to the validation messages reported for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// The main error type for firelog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    /// A required field is missing or malformed. Nothing was written.
    #[error("{}", describe_validation(.message, .details))]
    Validation {
        /// Human-readable summary.
        message: String,
        /// Per-field messages, empty when the failure is not tied to a field.
        details: FieldErrors,
    },

    /// A record with this barcode is already registered. Nothing was written.
    #[error("barcode already exists: {barcode}")]
    DuplicateBarcode {
        /// The rejected barcode.
        barcode: String,
    },

    /// A maintenance log referenced an extinguisher id that does not exist.
    #[error("no fire extinguisher with id {id}")]
    UnknownExtinguisher {
        /// The dangling id.
        id: Uuid,
    },

    /// An operation needed a registered barcode but none matched.
    #[error("fire extinguisher not registered: {barcode}")]
    UnknownBarcode {
        /// The barcode that was looked up.
        barcode: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A store lock was poisoned by a panicking writer.
    #[error("storage lock poisoned: {0}")]
    StoragePoisoned(&'static str),

    /// A stored value could not be decoded.
    #[error("corrupt stored value under key {key}: {message}")]
    CorruptValue {
        /// The key whose value failed to decode.
        key: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Scanner Errors ===
    /// No scan device is present or access to it was denied.
    #[error("scanner unavailable ({device}): {message}")]
    ScannerUnavailable {
        /// The device that could not be opened.
        device: String,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for firelog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

/// Flatten the field-level failures of a validator run into messages.
#[must_use]
pub fn field_messages(errors: &validator::ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string)
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// The summary, followed by any field messages it does not already say.
fn describe_validation(message: &str, details: &FieldErrors) -> String {
    let fields: Vec<String> = details
        .iter()
        .filter(|(_, messages)| messages.iter().any(|m| m != message))
        .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
        .collect();
    if fields.is_empty() {
        message.to_string()
    } else {
        format!("{message} ({})", fields.join("; "))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation {
            message: "Invalid data".to_string(),
            details: field_messages(&errors),
        }
    }
}

impl Error {
    /// Create a validation error that is not tied to a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: FieldErrors::new(),
        }
    }

    /// Create a validation error for a single field.
    #[must_use]
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut details = FieldErrors::new();
        details.insert(field.to_string(), vec![message.clone()]);
        Self::Validation { message, details }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a scanner unavailable error.
    #[must_use]
    pub fn scanner_unavailable(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScannerUnavailable {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Check if this error is an input validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error was caused by what the user submitted, as opposed
    /// to a failure of the system itself.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::DuplicateBarcode { .. }
                | Self::UnknownExtinguisher { .. }
                | Self::UnknownBarcode { .. }
        )
    }

    /// Check if this error is a storage failure.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::StoragePoisoned(_)
                | Self::CorruptValue { .. }
                | Self::Io(_)
                | Self::DirectoryCreate { .. }
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DuplicateBarcode {
            barcode: "FE-001".to_string(),
        };
        assert_eq!(err.to_string(), "barcode already exists: FE-001");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_validation_display_is_message() {
        let err = Error::validation("Please enter a barcode");
        assert_eq!(err.to_string(), "Please enter a barcode");
        assert!(err.is_validation());
    }

    #[test]
    fn test_validation_display_names_failed_fields() {
        let mut details = FieldErrors::new();
        details.insert(
            "extinguisher_no".to_string(),
            vec!["Fire Extinguisher No is required".to_string()],
        );
        details.insert("location".to_string(), vec!["Location is required".to_string()]);
        let err = Error::Validation {
            message: "Invalid data".to_string(),
            details,
        };
        assert_eq!(
            err.to_string(),
            "Invalid data (extinguisher_no: Extinguisher number is required; \
             location: Location is required)"
        );

        // A single-field error already says what failed.
        let err = Error::invalid_field("barcode", "Please enter a barcode");
        assert_eq!(err.to_string(), "Please enter a barcode");
    }

    #[test]
    fn test_invalid_field_details() {
        let err = Error::invalid_field("location", "Location is required");
        match err {
            Error::Validation { details, .. } => {
                assert_eq!(details["location"], vec!["Location is required"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_user_error() {
        assert!(Error::validation("x").is_user_error());
        assert!(Error::DuplicateBarcode {
            barcode: "A".to_string()
        }
        .is_user_error());
        assert!(Error::UnknownExtinguisher { id: Uuid::nil() }.is_user_error());
        assert!(!Error::internal("x").is_user_error());
    }

    #[test]
    fn test_is_storage() {
        let io_err = std::io::Error::other("disk full");
        assert!(Error::from(io_err).is_storage());
        assert!(Error::StoragePoisoned("records").is_storage());
        assert!(!Error::validation("x").is_storage());
    }

    #[test]
    fn test_scanner_unavailable_display() {
        let err = Error::scanner_unavailable("/dev/hidraw0", "permission denied");
        let msg = err.to_string();
        assert!(msg.contains("/dev/hidraw0"));
        assert!(msg.contains("permission denied"));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid bind".to_string(),
        };
        assert!(err.to_string().contains("invalid bind"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
