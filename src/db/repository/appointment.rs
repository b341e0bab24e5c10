use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, not_found, parse_datetime, parse_opt_uuid, parse_uuid, scope_predicate};
use crate::db::DatabaseError;
use crate::models::{Appointment, PatientScope};

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, doctor_name, specialty, location, appointment_time, notes, is_completed";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_name, specialty, location,
         appointment_time, notes, is_completed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            appt.id.to_string(),
            appt.patient_id.map(|id| id.to_string()),
            appt.doctor_name,
            appt.specialty,
            appt.location,
            fmt_datetime(&appt.appointment_time),
            appt.notes,
            appt.is_completed as i32,
        ],
    )?;
    Ok(())
}

pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET patient_id = ?2, doctor_name = ?3, specialty = ?4, location = ?5,
         appointment_time = ?6, notes = ?7, is_completed = ?8
         WHERE id = ?1",
        params![
            appt.id.to_string(),
            appt.patient_id.map(|id| id.to_string()),
            appt.doctor_name,
            appt.specialty,
            appt.location,
            fmt_datetime(&appt.appointment_time),
            appt.notes,
            appt.is_completed as i32,
        ],
    )?;
    if updated == 0 {
        return Err(not_found("Appointment", &appt.id));
    }
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(appointment_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(appointment_from_row(row??)?)),
        None => Ok(None),
    }
}

/// Not-yet-completed appointments in `[start, end)` for the scope, soonest first.
pub fn fetch_open_appointments_between(
    conn: &Connection,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    scope: &PatientScope,
) -> Result<Vec<Appointment>, DatabaseError> {
    let (scope_sql, scope_param) = scope_predicate(scope, "patient_id", 3);
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE is_completed = 0 AND appointment_time >= ?1 AND appointment_time < ?2 AND {scope_sql}
         ORDER BY appointment_time"
    );

    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(fmt_datetime(start)), Box::new(fmt_datetime(end))];
    if let Some(p) = scope_param {
        params_vec.push(Box::new(p));
    }
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| Ok(appointment_row_from_rusqlite(row)))?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row??)?);
    }
    Ok(appointments)
}

pub fn fetch_all_appointments(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY appointment_time");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(appointment_row_from_rusqlite(row)))?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row??)?);
    }
    Ok(appointments)
}

pub fn delete_appointment(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(not_found("Appointment", id));
    }
    Ok(())
}

struct AppointmentRow {
    id: String,
    patient_id: Option<String>,
    doctor_name: String,
    specialty: Option<String>,
    location: Option<String>,
    appointment_time: String,
    notes: Option<String>,
    is_completed: i32,
}

fn appointment_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AppointmentRow, rusqlite::Error> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_name: row.get(2)?,
        specialty: row.get(3)?,
        location: row.get(4)?,
        appointment_time: row.get(5)?,
        notes: row.get(6)?,
        is_completed: row.get(7)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid(&row.id)?,
        patient_id: parse_opt_uuid(row.patient_id)?,
        doctor_name: row.doctor_name,
        specialty: row.specialty,
        location: row.location,
        appointment_time: parse_datetime(&row.appointment_time)?,
        notes: row.notes,
        is_completed: row.is_completed != 0,
    })
}
