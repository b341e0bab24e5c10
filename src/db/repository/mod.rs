//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table. All public functions are re-exported here.
//! Timestamps are stored as local wall-clock text (`YYYY-MM-DD HH:MM:SS`),
//! dates as `YYYY-MM-DD`, ids as hyphenated UUID text.

mod appointment;
mod caregiver;
mod dose_log;
mod health_metric;
mod medication;
mod patient;
mod schedule;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::PatientScope;

pub use appointment::*;
pub use caregiver::*;
pub use dose_log::*;
pub use health_metric::*;
pub use medication::*;
pub use patient::*;
pub use schedule::*;

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid timestamp '{s}': {e}")))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid date '{s}': {e}")))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    s.as_deref().map(parse_uuid).transpose()
}

/// SQL predicate restricting `column` to a patient scope, plus its bound value.
///
/// `Myself` becomes `IS NULL` so it never matches another patient's rows.
pub(crate) fn scope_predicate(
    scope: &PatientScope,
    column: &str,
    param_idx: usize,
) -> (String, Option<String>) {
    match scope {
        PatientScope::Myself => (format!("{column} IS NULL"), None),
        PatientScope::Patient(id) => (format!("{column} = ?{param_idx}"), Some(id.to_string())),
    }
}

pub(crate) fn not_found(entity_type: &str, id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: entity_type.into(),
        id: id.to_string(),
    }
}
