//! One-way JSON exports: the full backup document and the home-screen
//! widget snapshot.

use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::adherence::calculator::AdherenceRate;
use crate::config;
use crate::db::{repository, DatabaseError};
use crate::models::{Appointment, HealthMetric, Medication, MedicationLog, MedicationSchedule, Patient};
use crate::tracker::{DoseItem, HomeSnapshot};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

// ═══════════════════════════════════════════
// Backup document
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportInfo {
    pub exported_at: NaiveDateTime,
    pub app_version: String,
    pub data_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportData {
    pub patients: Vec<Patient>,
    pub medications: Vec<Medication>,
    pub schedules: Vec<MedicationSchedule>,
    pub logs: Vec<MedicationLog>,
    pub health_metrics: Vec<HealthMetric>,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDocument {
    pub export_info: ExportInfo,
    pub data: ExportData,
}

/// Result of writing an export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: String,
    pub size_bytes: u64,
    pub record_count: usize,
}

impl ExportDocument {
    pub fn record_count(&self) -> usize {
        let d = &self.data;
        d.patients.len()
            + d.medications.len()
            + d.schedules.len()
            + d.logs.len()
            + d.health_metrics.len()
            + d.appointments.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Snapshot of every patient's data, regardless of scope.
pub fn build_export(conn: &Connection, now: NaiveDateTime) -> Result<ExportDocument, DatabaseError> {
    Ok(ExportDocument {
        export_info: ExportInfo {
            exported_at: now,
            app_version: config::APP_VERSION.into(),
            data_version: config::EXPORT_DATA_VERSION,
        },
        data: ExportData {
            patients: repository::fetch_all_patients(conn)?,
            medications: repository::fetch_all_medications(conn)?,
            schedules: repository::fetch_all_schedules(conn)?,
            logs: repository::fetch_all_logs(conn)?,
            health_metrics: repository::fetch_all_health_metrics(conn)?,
            appointments: repository::fetch_all_appointments(conn)?,
        },
    })
}

/// Writes the backup document as pretty JSON to `output_path`.
pub fn write_export(
    conn: &Connection,
    output_path: &Path,
    now: NaiveDateTime,
) -> Result<ExportSummary, ExportError> {
    let document = build_export(conn, now)?;
    let json = document.to_json()?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    file.flush()?;
    let size_bytes = std::fs::metadata(output_path)?.len();

    tracing::info!(
        records = document.record_count(),
        size_bytes,
        "Export written"
    );

    Ok(ExportSummary {
        path: output_path.to_string_lossy().into_owned(),
        size_bytes,
        record_count: document.record_count(),
    })
}

// ═══════════════════════════════════════════
// Widget
// ═══════════════════════════════════════════

/// What the home-screen widget shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetSnapshot {
    pub date: NaiveDate,
    pub today_rate: AdherenceRate,
    pub today_percent: u32,
    pub next_dose: Option<DoseItem>,
    pub today: Vec<DoseItem>,
    pub pending_due_count: usize,
    pub is_all_completed: bool,
}

impl From<&HomeSnapshot> for WidgetSnapshot {
    fn from(home: &HomeSnapshot) -> Self {
        Self {
            date: home.date,
            today_rate: home.today_rate,
            today_percent: home.today_rate.percent(),
            next_dose: home.next_dose.clone(),
            today: home.today.clone(),
            pending_due_count: home.pending_due_count,
            is_all_completed: home.is_all_completed,
        }
    }
}

impl WidgetSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
