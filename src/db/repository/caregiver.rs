use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, not_found, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Caregiver;

pub fn insert_caregiver(conn: &Connection, caregiver: &Caregiver) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO caregivers (id, name, relationship, phone, email, notify_on_missed_dose,
         is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            caregiver.id.to_string(),
            caregiver.name,
            caregiver.relationship,
            caregiver.phone,
            caregiver.email,
            caregiver.notify_on_missed_dose as i32,
            caregiver.is_active as i32,
            fmt_datetime(&caregiver.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_caregiver(conn: &Connection, caregiver: &Caregiver) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE caregivers SET name = ?2, relationship = ?3, phone = ?4, email = ?5,
         notify_on_missed_dose = ?6, is_active = ?7
         WHERE id = ?1",
        params![
            caregiver.id.to_string(),
            caregiver.name,
            caregiver.relationship,
            caregiver.phone,
            caregiver.email,
            caregiver.notify_on_missed_dose as i32,
            caregiver.is_active as i32,
        ],
    )?;
    if updated == 0 {
        return Err(not_found("Caregiver", &caregiver.id));
    }
    Ok(())
}

/// Caregivers, active ones only when `active_only`.
pub fn list_caregivers(conn: &Connection, active_only: bool) -> Result<Vec<Caregiver>, DatabaseError> {
    let mut sql = String::from(
        "SELECT id, name, relationship, phone, email, notify_on_missed_dose, is_active, created_at
         FROM caregivers",
    );
    if active_only {
        sql.push_str(" WHERE is_active = 1");
    }
    sql.push_str(" ORDER BY name");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, i32>(5)?,
            row.get::<_, i32>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut caregivers = Vec::new();
    for row in rows {
        let (id, name, relationship, phone, email, notify, active, created_at) = row?;
        caregivers.push(Caregiver {
            id: parse_uuid(&id)?,
            name,
            relationship,
            phone,
            email,
            notify_on_missed_dose: notify != 0,
            is_active: active != 0,
            created_at: parse_datetime(&created_at)?,
        });
    }
    Ok(caregivers)
}

pub fn delete_caregiver(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM caregivers WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(not_found("Caregiver", id));
    }
    Ok(())
}
