use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, not_found, parse_datetime, parse_opt_uuid, parse_uuid, scope_predicate};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const MEDICATION_COLUMNS: &str =
    "m.id, m.patient_id, m.name, m.dosage, m.strength, m.form, m.color, m.category,
     m.purpose, m.prescribing_doctor, m.notes, m.stock_count, m.low_stock_threshold,
     m.is_active, m.created_at";

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, patient_id, name, dosage, strength, form, color, category,
         purpose, prescribing_doctor, notes, stock_count, low_stock_threshold, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            med.id.to_string(),
            med.patient_id.map(|id| id.to_string()),
            med.name,
            med.dosage,
            med.strength,
            med.form.as_str(),
            med.color.as_str(),
            med.category.as_str(),
            med.purpose,
            med.prescribing_doctor,
            med.notes,
            med.stock_count.max(0),
            med.low_stock_threshold,
            med.is_active as i32,
            fmt_datetime(&med.created_at),
        ],
    )?;
    Ok(())
}

/// Rewrites every editable column of an existing medication.
pub fn update_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medications SET patient_id = ?2, name = ?3, dosage = ?4, strength = ?5, form = ?6,
         color = ?7, category = ?8, purpose = ?9, prescribing_doctor = ?10, notes = ?11,
         stock_count = ?12, low_stock_threshold = ?13, is_active = ?14
         WHERE id = ?1",
        params![
            med.id.to_string(),
            med.patient_id.map(|id| id.to_string()),
            med.name,
            med.dosage,
            med.strength,
            med.form.as_str(),
            med.color.as_str(),
            med.category.as_str(),
            med.purpose,
            med.prescribing_doctor,
            med.notes,
            med.stock_count.max(0),
            med.low_stock_threshold,
            med.is_active as i32,
        ],
    )?;
    if updated == 0 {
        return Err(not_found("Medication", &med.id));
    }
    Ok(())
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications m WHERE m.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(medication_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(medication_from_row(row??)?)),
        None => Ok(None),
    }
}

/// Medications in a patient scope, sorted by name.
pub fn fetch_medications(
    conn: &Connection,
    scope: &PatientScope,
) -> Result<Vec<Medication>, DatabaseError> {
    query_medications(conn, scope, false)
}

/// Active medications in a patient scope, sorted by name.
pub fn fetch_active_medications(
    conn: &Connection,
    scope: &PatientScope,
) -> Result<Vec<Medication>, DatabaseError> {
    query_medications(conn, scope, true)
}

/// Every medication regardless of owner (export, entitlement counting).
pub fn fetch_all_medications(conn: &Connection) -> Result<Vec<Medication>, DatabaseError> {
    let sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications m ORDER BY m.name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(medication_row_from_rusqlite(row)))?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row??)?);
    }
    Ok(meds)
}

pub fn count_medications(conn: &Connection) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM medications", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

fn query_medications(
    conn: &Connection,
    scope: &PatientScope,
    active_only: bool,
) -> Result<Vec<Medication>, DatabaseError> {
    let (scope_sql, scope_param) = scope_predicate(scope, "m.patient_id", 1);
    let mut sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications m WHERE {scope_sql}");
    if active_only {
        sql.push_str(" AND m.is_active = 1");
    }
    sql.push_str(" ORDER BY m.name");

    let mut stmt = conn.prepare(&sql)?;
    let params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = scope_param
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn rusqlite::types::ToSql>)
        .collect();
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| Ok(medication_row_from_rusqlite(row)))?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row??)?);
    }
    Ok(meds)
}

/// Medications in scope narrowed by a list filter and a case-insensitive
/// search over name, purpose and prescribing doctor.
///
/// `NextDose` has no column to sort on; those rows come back by name.
pub fn search_medications(
    conn: &Connection,
    scope: &PatientScope,
    filter: MedicationFilter,
    search_query: Option<&str>,
    sort: MedicationSort,
) -> Result<Vec<Medication>, DatabaseError> {
    let (scope_sql, scope_param) = scope_predicate(scope, "m.patient_id", 1);
    let mut sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications m WHERE {scope_sql}");

    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut param_idx = 1;
    if let Some(p) = scope_param {
        params_vec.push(Box::new(p));
        param_idx += 1;
    }

    match filter {
        MedicationFilter::All => {}
        MedicationFilter::Active => sql.push_str(" AND m.is_active = 1"),
        MedicationFilter::Inactive => sql.push_str(" AND m.is_active = 0"),
        MedicationFilter::LowStock => {
            sql.push_str(" AND m.is_active = 1 AND m.stock_count <= m.low_stock_threshold")
        }
    }

    if let Some(query) = search_query.map(str::trim).filter(|q| !q.is_empty()) {
        sql.push_str(&format!(
            " AND (m.name LIKE ?{p} COLLATE NOCASE
               OR m.purpose LIKE ?{p} COLLATE NOCASE
               OR m.prescribing_doctor LIKE ?{p} COLLATE NOCASE)",
            p = param_idx
        ));
        params_vec.push(Box::new(format!("%{query}%")));
    }

    sql.push_str(match sort {
        MedicationSort::Name | MedicationSort::NextDose => " ORDER BY m.name COLLATE NOCASE",
        MedicationSort::Newest => " ORDER BY m.created_at DESC, m.name",
        MedicationSort::Stock => " ORDER BY m.stock_count ASC, m.name",
    });

    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| Ok(medication_row_from_rusqlite(row)))?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row??)?);
    }
    Ok(meds)
}

pub fn set_medication_active(
    conn: &Connection,
    id: &Uuid,
    is_active: bool,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medications SET is_active = ?1 WHERE id = ?2",
        params![is_active as i32, id.to_string()],
    )?;
    if updated == 0 {
        return Err(not_found("Medication", id));
    }
    Ok(())
}

/// Stores a new stock count, floored at zero. Returns the stored value.
pub fn set_medication_stock(conn: &Connection, id: &Uuid, stock: i32) -> Result<i32, DatabaseError> {
    let stock = stock.max(0);
    let updated = conn.execute(
        "UPDATE medications SET stock_count = ?1 WHERE id = ?2",
        params![stock, id.to_string()],
    )?;
    if updated == 0 {
        return Err(not_found("Medication", id));
    }
    Ok(stock)
}

/// Removes a medication; schedules and logs go with it (ON DELETE CASCADE).
pub fn delete_medication_cascade(conn: &Connection, med_id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM medications WHERE id = ?1", params![med_id.to_string()])?;
    if deleted == 0 {
        return Err(not_found("Medication", med_id));
    }
    Ok(())
}

// Internal row type for Medication mapping
struct MedicationRow {
    id: String,
    patient_id: Option<String>,
    name: String,
    dosage: String,
    strength: String,
    form: String,
    color: String,
    category: String,
    purpose: String,
    prescribing_doctor: String,
    notes: Option<String>,
    stock_count: i32,
    low_stock_threshold: i32,
    is_active: i32,
    created_at: String,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        dosage: row.get(3)?,
        strength: row.get(4)?,
        form: row.get(5)?,
        color: row.get(6)?,
        category: row.get(7)?,
        purpose: row.get(8)?,
        prescribing_doctor: row.get(9)?,
        notes: row.get(10)?,
        stock_count: row.get(11)?,
        low_stock_threshold: row.get(12)?,
        is_active: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: parse_uuid(&row.id)?,
        patient_id: parse_opt_uuid(row.patient_id)?,
        name: row.name,
        dosage: row.dosage,
        strength: row.strength,
        form: MedicationForm::from_str(&row.form)?,
        color: MedicationColor::from_str(&row.color)?,
        category: MedicationCategory::from_str(&row.category)?,
        purpose: row.purpose,
        prescribing_doctor: row.prescribing_doctor,
        notes: row.notes,
        stock_count: row.stock_count,
        low_stock_threshold: row.low_stock_threshold,
        is_active: row.is_active != 0,
        created_at: parse_datetime(&row.created_at)?,
    })
}
