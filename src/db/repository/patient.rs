use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{expect_affected, opt_uuid_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, full_name, email, phone, birth_date, city, hospital_id,
    doctor_id, insurance_plan_id, funnel_id, status, consultant_id, manager_id, marketing,
    created_at, updated_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    let marketing_raw: String = row.get(13)?;
    // A malformed blob should not hide the patient from the board.
    let marketing = serde_json::from_str(&marketing_raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unreadable marketing blob, using empty attribution");
        Marketing::default()
    });
    Ok(Patient {
        id: uuid_at(row, 0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        birth_date: row.get(4)?,
        city: row.get(5)?,
        hospital_id: opt_uuid_at(row, 6)?,
        doctor_id: opt_uuid_at(row, 7)?,
        insurance_plan_id: opt_uuid_at(row, 8)?,
        funnel_id: opt_uuid_at(row, 9)?,
        status: row.get(10)?,
        consultant_id: opt_uuid_at(row, 11)?,
        manager_id: opt_uuid_at(row, 12)?,
        marketing,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn marketing_json(marketing: &Marketing) -> Result<String, DatabaseError> {
    serde_json::to_string(marketing).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, full_name, email, phone, birth_date, city, hospital_id,
         doctor_id, insurance_plan_id, funnel_id, status, consultant_id, manager_id, marketing,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.email,
            patient.phone,
            patient.birth_date,
            patient.city,
            patient.hospital_id.map(|id| id.to_string()),
            patient.doctor_id.map(|id| id.to_string()),
            patient.insurance_plan_id.map(|id| id.to_string()),
            patient.funnel_id.map(|id| id.to_string()),
            patient.status,
            patient.consultant_id.map(|id| id.to_string()),
            patient.manager_id.map(|id| id.to_string()),
            marketing_json(&patient.marketing)?,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id.to_string()],
        patient_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Patients matching every set field of `filter`, most recently updated first.
pub fn list_patients(
    conn: &Connection,
    filter: &PatientFilter,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE 1 = 1");
    let mut args: Vec<Value> = Vec::new();

    if let Some(funnel_id) = filter.funnel_id {
        args.push(Value::Text(funnel_id.to_string()));
        sql.push_str(&format!(" AND funnel_id = ?{}", args.len()));
    }
    if let Some(hospital_id) = filter.hospital_id {
        args.push(Value::Text(hospital_id.to_string()));
        sql.push_str(&format!(" AND hospital_id = ?{}", args.len()));
    }
    if let Some(consultant_id) = filter.consultant_id {
        args.push(Value::Text(consultant_id.to_string()));
        sql.push_str(&format!(" AND consultant_id = ?{}", args.len()));
    }
    if let Some(status) = &filter.status {
        args.push(Value::Text(status.clone()));
        sql.push_str(&format!(" AND status = ?{}", args.len()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        args.push(Value::Text(format!("%{}%", search.to_lowercase())));
        let n = args.len();
        sql.push_str(&format!(
            " AND (lower(full_name) LIKE ?{n} OR lower(coalesce(email, '')) LIKE ?{n}
             OR coalesce(phone, '') LIKE ?{n})"
        ));
    }
    sql.push_str(" ORDER BY updated_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), patient_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Update the patient row itself (children are handled by the sync module).
pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE patients SET full_name = ?2, email = ?3, phone = ?4, birth_date = ?5, city = ?6,
         hospital_id = ?7, doctor_id = ?8, insurance_plan_id = ?9, funnel_id = ?10, status = ?11,
         consultant_id = ?12, manager_id = ?13, marketing = ?14, updated_at = ?15
         WHERE id = ?1",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.email,
            patient.phone,
            patient.birth_date,
            patient.city,
            patient.hospital_id.map(|id| id.to_string()),
            patient.doctor_id.map(|id| id.to_string()),
            patient.insurance_plan_id.map(|id| id.to_string()),
            patient.funnel_id.map(|id| id.to_string()),
            patient.status,
            patient.consultant_id.map(|id| id.to_string()),
            patient.manager_id.map(|id| id.to_string()),
            marketing_json(&patient.marketing)?,
            patient.updated_at,
        ],
    )?;
    expect_affected(affected, "patient", &patient.id)
}

/// Single-row status write used by the pipeline board.
pub fn update_patient_status(
    conn: &Connection,
    id: &Uuid,
    status: &str,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE patients SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), status, at],
    )?;
    expect_affected(affected, "patient", id)
}

pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    expect_affected(affected, "patient", id)
}
