use std::str::FromStr;

use chrono::NaiveTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{
    fmt_date, fmt_datetime, not_found, parse_date, parse_datetime, parse_uuid, scope_predicate,
};
use crate::db::DatabaseError;
use crate::models::enums::{MealRelation, ScheduleType};
use crate::models::{MedicationSchedule, PatientScope};

const SCHEDULE_COLUMNS: &str =
    "s.id, s.medication_id, s.schedule_type, s.times, s.specific_days, s.interval_days,
     s.start_date, s.end_date, s.meal_relation, s.is_active, s.notification_enabled,
     s.reminder_minutes_before, s.notes, s.created_at, s.updated_at";

// Times of day are kept as a JSON list of "HH:MM" strings.
const TIME_FORMAT: &str = "%H:%M";

fn times_to_json(times: &[NaiveTime]) -> Result<String, DatabaseError> {
    let text: Vec<String> = times.iter().map(|t| t.format(TIME_FORMAT).to_string()).collect();
    Ok(serde_json::to_string(&text)?)
}

fn times_from_json(json: &str) -> Result<Vec<NaiveTime>, DatabaseError> {
    let text: Vec<String> = serde_json::from_str(json)?;
    text.iter()
        .map(|s| {
            NaiveTime::parse_from_str(s, TIME_FORMAT)
                .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid time '{s}': {e}")))
        })
        .collect()
}

pub fn insert_schedule(conn: &Connection, schedule: &MedicationSchedule) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_schedules (id, medication_id, schedule_type, times, specific_days,
         interval_days, start_date, end_date, meal_relation, is_active, notification_enabled,
         reminder_minutes_before, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            schedule.id.to_string(),
            schedule.medication_id.to_string(),
            schedule.schedule_type.as_str(),
            times_to_json(&schedule.times)?,
            serde_json::to_string(&schedule.specific_days)?,
            schedule.interval_days.max(1),
            fmt_date(&schedule.start_date),
            schedule.end_date.as_ref().map(fmt_date),
            schedule.meal_relation.as_str(),
            schedule.is_active as i32,
            schedule.notification_enabled as i32,
            schedule.reminder_minutes_before,
            schedule.notes,
            fmt_datetime(&schedule.created_at),
            fmt_datetime(&schedule.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_schedule(conn: &Connection, schedule: &MedicationSchedule) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medication_schedules SET schedule_type = ?2, times = ?3, specific_days = ?4,
         interval_days = ?5, start_date = ?6, end_date = ?7, meal_relation = ?8, is_active = ?9,
         notification_enabled = ?10, reminder_minutes_before = ?11, notes = ?12, updated_at = ?13
         WHERE id = ?1",
        params![
            schedule.id.to_string(),
            schedule.schedule_type.as_str(),
            times_to_json(&schedule.times)?,
            serde_json::to_string(&schedule.specific_days)?,
            schedule.interval_days.max(1),
            fmt_date(&schedule.start_date),
            schedule.end_date.as_ref().map(fmt_date),
            schedule.meal_relation.as_str(),
            schedule.is_active as i32,
            schedule.notification_enabled as i32,
            schedule.reminder_minutes_before,
            schedule.notes,
            fmt_datetime(&schedule.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(not_found("MedicationSchedule", &schedule.id));
    }
    Ok(())
}

pub fn get_schedule(conn: &Connection, id: &Uuid) -> Result<Option<MedicationSchedule>, DatabaseError> {
    let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM medication_schedules s WHERE s.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(schedule_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(schedule_from_row(row??)?)),
        None => Ok(None),
    }
}

pub fn fetch_schedules_for_medication(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM medication_schedules s
         WHERE s.medication_id = ?1 ORDER BY s.created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![medication_id.to_string()], |row| {
        Ok(schedule_row_from_rusqlite(row))
    })?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row??)?);
    }
    Ok(schedules)
}

/// Active schedules whose medication is active and inside the patient scope.
pub fn fetch_active_schedules(
    conn: &Connection,
    scope: &PatientScope,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let (scope_sql, scope_param) = scope_predicate(scope, "m.patient_id", 1);
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM medication_schedules s
         JOIN medications m ON m.id = s.medication_id
         WHERE s.is_active = 1 AND m.is_active = 1 AND {scope_sql}
         ORDER BY m.name, s.created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = scope_param
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn rusqlite::types::ToSql>)
        .collect();
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| Ok(schedule_row_from_rusqlite(row)))?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row??)?);
    }
    Ok(schedules)
}

pub fn fetch_all_schedules(conn: &Connection) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM medication_schedules s ORDER BY s.created_at");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(schedule_row_from_rusqlite(row)))?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row??)?);
    }
    Ok(schedules)
}

/// Deletes a schedule. Its logs stay, detached from the schedule.
pub fn delete_schedule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM medication_schedules WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(not_found("MedicationSchedule", id));
    }
    Ok(())
}

struct ScheduleRow {
    id: String,
    medication_id: String,
    schedule_type: String,
    times: String,
    specific_days: String,
    interval_days: u32,
    start_date: String,
    end_date: Option<String>,
    meal_relation: String,
    is_active: i32,
    notification_enabled: i32,
    reminder_minutes_before: u32,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn schedule_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ScheduleRow, rusqlite::Error> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        schedule_type: row.get(2)?,
        times: row.get(3)?,
        specific_days: row.get(4)?,
        interval_days: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        meal_relation: row.get(8)?,
        is_active: row.get(9)?,
        notification_enabled: row.get(10)?,
        reminder_minutes_before: row.get(11)?,
        notes: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn schedule_from_row(row: ScheduleRow) -> Result<MedicationSchedule, DatabaseError> {
    Ok(MedicationSchedule {
        id: parse_uuid(&row.id)?,
        medication_id: parse_uuid(&row.medication_id)?,
        schedule_type: ScheduleType::from_str(&row.schedule_type)?,
        times: times_from_json(&row.times)?,
        specific_days: serde_json::from_str(&row.specific_days)?,
        interval_days: row.interval_days.max(1),
        start_date: parse_date(&row.start_date)?,
        end_date: row.end_date.as_deref().map(parse_date).transpose()?,
        meal_relation: MealRelation::from_str(&row.meal_relation)?,
        is_active: row.is_active != 0,
        notification_enabled: row.notification_enabled != 0,
        reminder_minutes_before: row.reminder_minutes_before,
        notes: row.notes,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}
