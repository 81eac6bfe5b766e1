//! Core record types for firelog.
//!
//! A [`FireExtinguisher`] is registered once per barcode and a
//! [`MaintenanceLog`] is appended for every piece of work done on it. Neither
//! is ever edited once stored.
//!
//! The `New*` types are the validated inputs accepted by the stores, and the
//! `*Request` types are the raw, string-typed payloads accepted from the HTTP
//! API and the CLI before validation.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{field_messages, FieldErrors, Result};

/// Creation time at microsecond precision, the finest any backend stores.
fn created_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A registered fire extinguisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireExtinguisher {
    /// Identity assigned at creation.
    pub id: Uuid,
    /// Unique lookup key printed on the unit.
    pub barcode: String,
    /// Number painted or stamped on the unit.
    pub extinguisher_no: String,
    /// Where the unit is installed.
    pub location: String,
    /// When the unit was last pressure tested.
    pub date_of_testing: NaiveDate,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl FireExtinguisher {
    /// Build a new record from validated input, assigning identity and
    /// creation time.
    #[must_use]
    pub fn from_new(new: NewFireExtinguisher) -> Self {
        Self {
            id: Uuid::new_v4(),
            barcode: new.barcode,
            extinguisher_no: new.extinguisher_no,
            location: new.location,
            date_of_testing: new.date_of_testing,
            created_at: created_now(),
        }
    }
}

/// One maintenance event recorded against an extinguisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceLog {
    /// Identity assigned at creation.
    pub id: Uuid,
    /// The extinguisher this work was done on.
    pub extinguisher_id: Uuid,
    /// When the work was done.
    pub date_work_done: NaiveDate,
    /// What was done.
    pub remarks: String,
    /// Technician name.
    pub user: String,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

impl MaintenanceLog {
    /// Build a new entry from validated input, assigning identity and
    /// creation time.
    #[must_use]
    pub fn from_new(extinguisher_id: Uuid, new: NewMaintenanceLog) -> Self {
        Self {
            id: Uuid::new_v4(),
            extinguisher_id,
            date_work_done: new.date_work_done,
            remarks: new.remarks,
            user: new.user,
            created_at: created_now(),
        }
    }

    /// Ordering used for every presented log list: newest work first, then
    /// most recently recorded first.
    #[must_use]
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.date_work_done
            .cmp(&a.date_work_done)
            .then_with(|| b.created_at.cmp(&a.created_at))
    }
}

/// Sort a log list into presentation order.
///
/// Entries that compare equal keep their relative order reversed, so that
/// with identical dates and timestamps the later insertion still comes first.
pub fn sort_newest_first(logs: &mut [MaintenanceLog]) {
    logs.reverse();
    logs.sort_by(MaintenanceLog::newest_first);
}

/// A record together with its maintenance history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtinguisherWithLogs {
    /// The record itself.
    #[serde(flatten)]
    pub extinguisher: FireExtinguisher,
    /// Maintenance history in presentation order.
    pub maintenance_logs: Vec<MaintenanceLog>,
}

impl ExtinguisherWithLogs {
    /// Wrap a freshly registered record that has no history yet.
    #[must_use]
    pub fn new(extinguisher: FireExtinguisher) -> Self {
        Self {
            extinguisher,
            maintenance_logs: Vec::new(),
        }
    }
}

/// Validated registration data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFireExtinguisher {
    /// Normalized barcode.
    pub barcode: String,
    /// Trimmed extinguisher number.
    pub extinguisher_no: String,
    /// Trimmed location.
    pub location: String,
    /// Date of testing.
    pub date_of_testing: NaiveDate,
}

/// Validated maintenance entry data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMaintenanceLog {
    /// Date the work was done.
    pub date_work_done: NaiveDate,
    /// Trimmed remarks.
    pub remarks: String,
    /// Trimmed technician name.
    pub user: String,
}

/// Registration payload as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Barcode being registered.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Barcode is required"))]
    pub barcode: String,
    /// Extinguisher number.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Fire Extinguisher No is required"))]
    pub extinguisher_no: String,
    /// Installed location.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Location is required"))]
    pub location: String,
    /// Date of testing, `YYYY-MM-DD` or RFC 3339.
    #[serde(default)]
    #[validate(custom(
        function = "calendar_date",
        message = "Date of Testing must be a valid date"
    ))]
    pub date_of_testing: String,
}

impl RegisterRequest {
    /// Validate and normalize into store input.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming every offending field.
    pub fn into_new(self) -> Result<NewFireExtinguisher> {
        self.validate()?;
        Ok(NewFireExtinguisher {
            barcode: crate::barcode::normalize(&self.barcode)?,
            extinguisher_no: self.extinguisher_no.trim().to_string(),
            location: self.location.trim().to_string(),
            date_of_testing: parse_calendar_date(&self.date_of_testing)?,
        })
    }
}

/// Maintenance log payload as submitted over HTTP.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddLogRequest {
    /// Target extinguisher.
    #[serde(default)]
    #[validate(custom(function = "uuid_string", message = "Extinguisher id must be a UUID"))]
    pub extinguisher_id: String,
    /// The maintenance details.
    #[serde(flatten)]
    pub entry: LogEntryRequest,
}

impl AddLogRequest {
    /// Validate and normalize into the target id plus store input.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming every offending field.
    pub fn into_new(self) -> Result<(Uuid, NewMaintenanceLog)> {
        let mut details = FieldErrors::new();
        for outcome in [self.validate(), self.entry.validate()] {
            if let Err(errors) = outcome {
                details.extend(field_messages(&errors));
            }
        }
        if !details.is_empty() {
            return Err(crate::Error::Validation {
                message: "Invalid data".to_string(),
                details,
            });
        }
        let id = Uuid::parse_str(self.extinguisher_id.trim()).map_err(|_| {
            crate::Error::invalid_field("extinguisher_id", "Extinguisher id must be a UUID")
        })?;
        Ok((id, self.entry.into_new()?))
    }
}

/// The maintenance details of a log entry, without its target.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryRequest {
    /// Date the work was done, `YYYY-MM-DD` or RFC 3339.
    #[serde(default)]
    #[validate(custom(
        function = "calendar_date",
        message = "Date Work Done must be a valid date"
    ))]
    pub date_work_done: String,
    /// What was done.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Remarks is required"))]
    pub remarks: String,
    /// Technician name.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Technician Name is required"))]
    pub user: String,
}

impl LogEntryRequest {
    /// Validate and normalize into store input.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming every offending field.
    pub fn into_new(self) -> Result<NewMaintenanceLog> {
        self.validate()?;
        Ok(NewMaintenanceLog {
            date_work_done: parse_calendar_date(&self.date_work_done)?,
            remarks: self.remarks.trim().to_string(),
            user: self.user.trim().to_string(),
        })
    }
}

/// Parse a calendar date from `YYYY-MM-DD` or an RFC 3339 timestamp.
///
/// # Errors
///
/// Returns a validation error if the input is neither.
pub fn parse_calendar_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.date_naive())
        .map_err(|_| crate::Error::validation(format!("not a valid date: {input:?}")))
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn calendar_date(value: &str) -> std::result::Result<(), ValidationError> {
    parse_calendar_date(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("date"))
}

fn uuid_string(value: &str) -> std::result::Result<(), ValidationError> {
    Uuid::parse_str(value.trim())
        .map(|_| ())
        .map_err(|_| ValidationError::new("uuid"))
}
