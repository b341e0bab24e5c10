use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_date, fmt_datetime, not_found, parse_date, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::PatientRelationship;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, relationship, birth_date, profile_color, notes, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.relationship.as_str(),
            patient.birth_date.as_ref().map(fmt_date),
            patient.profile_color,
            patient.notes,
            patient.is_active as i32,
            fmt_datetime(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE patients SET name = ?2, relationship = ?3, birth_date = ?4, profile_color = ?5,
         notes = ?6, is_active = ?7
         WHERE id = ?1",
        params![
            patient.id.to_string(),
            patient.name,
            patient.relationship.as_str(),
            patient.birth_date.as_ref().map(fmt_date),
            patient.profile_color,
            patient.notes,
            patient.is_active as i32,
        ],
    )?;
    if updated == 0 {
        return Err(not_found("Patient", &patient.id));
    }
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, relationship, birth_date, profile_color, notes, is_active, created_at
         FROM patients WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(patient_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(patient_from_row(row??)?)),
        None => Ok(None),
    }
}

/// Active patients in registration order.
pub fn list_active_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    query_patients(conn, "WHERE is_active = 1")
}

pub fn fetch_all_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    query_patients(conn, "")
}

fn query_patients(conn: &Connection, where_sql: &str) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT id, name, relationship, birth_date, profile_color, notes, is_active, created_at
         FROM patients {where_sql} ORDER BY created_at, name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(patient_row_from_rusqlite(row)))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row??)?);
    }
    Ok(patients)
}

/// Deletes a patient together with their medications and appointments.
pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(not_found("Patient", id));
    }
    Ok(())
}

struct PatientRow {
    id: String,
    name: String,
    relationship: String,
    birth_date: Option<String>,
    profile_color: String,
    notes: Option<String>,
    is_active: i32,
    created_at: String,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        relationship: row.get(2)?,
        birth_date: row.get(3)?,
        profile_color: row.get(4)?,
        notes: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        name: row.name,
        relationship: PatientRelationship::from_str(&row.relationship)?,
        birth_date: row.birth_date.as_deref().map(parse_date).transpose()?,
        profile_color: row.profile_color,
        notes: row.notes,
        is_active: row.is_active != 0,
        created_at: parse_datetime(&row.created_at)?,
    })
}
