use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, not_found, parse_datetime, parse_opt_uuid, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{DataSource, MetricType};
use crate::models::HealthMetric;

const METRIC_COLUMNS: &str =
    "id, medication_id, log_id, metric_type, value, systolic, diastolic, source, recorded_at, notes";

pub fn insert_health_metric(conn: &Connection, metric: &HealthMetric) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_metrics (id, medication_id, log_id, metric_type, value, systolic,
         diastolic, source, recorded_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            metric.id.to_string(),
            metric.medication_id.map(|id| id.to_string()),
            metric.log_id.map(|id| id.to_string()),
            metric.metric_type.as_str(),
            metric.value,
            metric.systolic,
            metric.diastolic,
            metric.source.as_str(),
            fmt_datetime(&metric.recorded_at),
            metric.notes,
        ],
    )?;
    Ok(())
}

/// Metrics of one type, newest first.
pub fn list_health_metrics(
    conn: &Connection,
    metric_type: MetricType,
) -> Result<Vec<HealthMetric>, DatabaseError> {
    let sql = format!(
        "SELECT {METRIC_COLUMNS} FROM health_metrics
         WHERE metric_type = ?1 ORDER BY recorded_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![metric_type.as_str()], |row| Ok(metric_row_from_rusqlite(row)))?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(metric_from_row(row??)?);
    }
    Ok(metrics)
}

/// Most recent reading of a type linked to a medication.
pub fn latest_metric_for_medication(
    conn: &Connection,
    medication_id: &Uuid,
    metric_type: MetricType,
) -> Result<Option<HealthMetric>, DatabaseError> {
    let sql = format!(
        "SELECT {METRIC_COLUMNS} FROM health_metrics
         WHERE medication_id = ?1 AND metric_type = ?2
         ORDER BY recorded_at DESC LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(
        params![medication_id.to_string(), metric_type.as_str()],
        |row| Ok(metric_row_from_rusqlite(row)),
    )?;

    match rows.next() {
        Some(row) => Ok(Some(metric_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn fetch_all_health_metrics(conn: &Connection) -> Result<Vec<HealthMetric>, DatabaseError> {
    let sql = format!("SELECT {METRIC_COLUMNS} FROM health_metrics ORDER BY recorded_at");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(metric_row_from_rusqlite(row)))?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(metric_from_row(row??)?);
    }
    Ok(metrics)
}

pub fn delete_health_metric(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM health_metrics WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(not_found("HealthMetric", id));
    }
    Ok(())
}

struct MetricRow {
    id: String,
    medication_id: Option<String>,
    log_id: Option<String>,
    metric_type: String,
    value: f64,
    systolic: Option<f64>,
    diastolic: Option<f64>,
    source: String,
    recorded_at: String,
    notes: Option<String>,
}

fn metric_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MetricRow, rusqlite::Error> {
    Ok(MetricRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        log_id: row.get(2)?,
        metric_type: row.get(3)?,
        value: row.get(4)?,
        systolic: row.get(5)?,
        diastolic: row.get(6)?,
        source: row.get(7)?,
        recorded_at: row.get(8)?,
        notes: row.get(9)?,
    })
}

fn metric_from_row(row: MetricRow) -> Result<HealthMetric, DatabaseError> {
    Ok(HealthMetric {
        id: parse_uuid(&row.id)?,
        medication_id: parse_opt_uuid(row.medication_id)?,
        log_id: parse_opt_uuid(row.log_id)?,
        metric_type: MetricType::from_str(&row.metric_type)?,
        value: row.value,
        systolic: row.systolic,
        diastolic: row.diastolic,
        source: DataSource::from_str(&row.source)?,
        recorded_at: parse_datetime(&row.recorded_at)?,
        notes: row.notes,
    })
}
