use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, not_found, parse_datetime, parse_opt_uuid, parse_uuid, scope_predicate};
use crate::db::DatabaseError;
use crate::models::enums::LogStatus;
use crate::models::{MedicationLog, PatientScope};

const LOG_COLUMNS: &str =
    "l.id, l.medication_id, l.schedule_id, l.scheduled_time, l.status, l.actual_time,
     l.notes, l.snooze_count, l.snoozed_until, l.created_at";

// Minute-resolution key used for slot uniqueness.
const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn insert_log(conn: &Connection, log: &MedicationLog) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_logs (id, medication_id, schedule_id, scheduled_time, status,
         actual_time, notes, snooze_count, snoozed_until, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            log.id.to_string(),
            log.medication_id.to_string(),
            log.schedule_id.map(|id| id.to_string()),
            fmt_datetime(&log.scheduled_time),
            log.status.as_str(),
            log.actual_time.as_ref().map(fmt_datetime),
            log.notes,
            log.snooze_count,
            log.snoozed_until.as_ref().map(fmt_datetime),
            fmt_datetime(&log.created_at),
        ],
    )?;
    Ok(())
}

/// Persists the mutable part of a log: status, times, notes and snooze state.
pub fn update_log(conn: &Connection, log: &MedicationLog) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medication_logs SET status = ?2, actual_time = ?3, notes = ?4,
         snooze_count = ?5, snoozed_until = ?6
         WHERE id = ?1",
        params![
            log.id.to_string(),
            log.status.as_str(),
            log.actual_time.as_ref().map(fmt_datetime),
            log.notes,
            log.snooze_count,
            log.snoozed_until.as_ref().map(fmt_datetime),
        ],
    )?;
    if updated == 0 {
        return Err(not_found("MedicationLog", &log.id));
    }
    Ok(())
}

pub fn get_log(conn: &Connection, id: &Uuid) -> Result<Option<MedicationLog>, DatabaseError> {
    let sql = format!("SELECT {LOG_COLUMNS} FROM medication_logs l WHERE l.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(log_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(log_from_row(row??)?)),
        None => Ok(None),
    }
}

/// Whether a log already occupies the (schedule, minute) slot.
pub fn log_exists(
    conn: &Connection,
    schedule_id: &Uuid,
    scheduled_time: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let minute = scheduled_time.format(MINUTE_FORMAT).to_string();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM medication_logs
         WHERE schedule_id = ?1 AND substr(scheduled_time, 1, 16) = ?2",
        params![schedule_id.to_string(), minute],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Logs scheduled in `[start, end)` for medications in the patient scope,
/// ordered by scheduled time.
pub fn fetch_logs_between(
    conn: &Connection,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    scope: &PatientScope,
) -> Result<Vec<MedicationLog>, DatabaseError> {
    let mut sql = format!(
        "SELECT {LOG_COLUMNS} FROM medication_logs l
         JOIN medications m ON m.id = l.medication_id
         WHERE l.scheduled_time >= ?1 AND l.scheduled_time < ?2"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(fmt_datetime(start)), Box::new(fmt_datetime(end))];

    let (scope_sql, scope_param) = scope_predicate(scope, "m.patient_id", 3);
    sql.push_str(&format!(" AND {scope_sql}"));
    if let Some(p) = scope_param {
        params_vec.push(Box::new(p));
    }
    sql.push_str(" ORDER BY l.scheduled_time, m.name");

    query_logs(conn, &sql, &params_vec)
}

/// Logs of one medication scheduled in `[start, end)`.
pub fn fetch_logs_for_medication_between(
    conn: &Connection,
    medication_id: &Uuid,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> Result<Vec<MedicationLog>, DatabaseError> {
    let sql = format!(
        "SELECT {LOG_COLUMNS} FROM medication_logs l
         WHERE l.medication_id = ?1 AND l.scheduled_time >= ?2 AND l.scheduled_time < ?3
         ORDER BY l.scheduled_time"
    );
    let params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(medication_id.to_string()),
        Box::new(fmt_datetime(start)),
        Box::new(fmt_datetime(end)),
    ];
    query_logs(conn, &sql, &params_vec)
}

/// Full history of one medication, newest first.
pub fn fetch_logs_for_medication(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Vec<MedicationLog>, DatabaseError> {
    let sql = format!(
        "SELECT {LOG_COLUMNS} FROM medication_logs l
         WHERE l.medication_id = ?1 ORDER BY l.scheduled_time DESC"
    );
    let params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(medication_id.to_string())];
    query_logs(conn, &sql, &params_vec)
}

pub fn fetch_all_logs(conn: &Connection) -> Result<Vec<MedicationLog>, DatabaseError> {
    let sql = format!("SELECT {LOG_COLUMNS} FROM medication_logs l ORDER BY l.scheduled_time");
    query_logs(conn, &sql, &[])
}

fn query_logs(
    conn: &Connection,
    sql: &str,
    params_vec: &[Box<dyn rusqlite::types::ToSql>],
) -> Result<Vec<MedicationLog>, DatabaseError> {
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| Ok(log_row_from_rusqlite(row)))?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(log_from_row(row??)?);
    }
    Ok(logs)
}

struct LogRow {
    id: String,
    medication_id: String,
    schedule_id: Option<String>,
    scheduled_time: String,
    status: String,
    actual_time: Option<String>,
    notes: Option<String>,
    snooze_count: u32,
    snoozed_until: Option<String>,
    created_at: String,
}

fn log_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<LogRow, rusqlite::Error> {
    Ok(LogRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        schedule_id: row.get(2)?,
        scheduled_time: row.get(3)?,
        status: row.get(4)?,
        actual_time: row.get(5)?,
        notes: row.get(6)?,
        snooze_count: row.get(7)?,
        snoozed_until: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn log_from_row(row: LogRow) -> Result<MedicationLog, DatabaseError> {
    Ok(MedicationLog {
        id: parse_uuid(&row.id)?,
        medication_id: parse_uuid(&row.medication_id)?,
        schedule_id: parse_opt_uuid(row.schedule_id)?,
        scheduled_time: parse_datetime(&row.scheduled_time)?,
        status: LogStatus::from_str(&row.status)?,
        actual_time: row.actual_time.as_deref().map(parse_datetime).transpose()?,
        notes: row.notes,
        snooze_count: row.snooze_count,
        snoozed_until: row.snoozed_until.as_deref().map(parse_datetime).transpose()?,
        created_at: parse_datetime(&row.created_at)?,
    })
}
