use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{expect_affected, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

const DOCTOR_COLUMNS: &str = "id, hospital_id, name, crm_number, specialty, phone, active";

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: uuid_at(row, 0)?,
        hospital_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        crm_number: row.get(3)?,
        specialty: row.get(4)?,
        phone: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
    })
}

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, hospital_id, name, crm_number, specialty, phone, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            doctor.id.to_string(),
            doctor.hospital_id.to_string(),
            doctor.name,
            doctor.crm_number,
            doctor.specialty,
            doctor.phone,
            doctor.active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"),
        params![id.to_string()],
        doctor_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], doctor_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn list_doctors_for_hospital(
    conn: &Connection,
    hospital_id: &Uuid,
) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE hospital_id = ?1 ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map(params![hospital_id.to_string()], doctor_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE doctors SET hospital_id = ?2, name = ?3, crm_number = ?4, specialty = ?5,
         phone = ?6, active = ?7 WHERE id = ?1",
        params![
            doctor.id.to_string(),
            doctor.hospital_id.to_string(),
            doctor.name,
            doctor.crm_number,
            doctor.specialty,
            doctor.phone,
            doctor.active as i32,
        ],
    )?;
    expect_affected(affected, "doctor", &doctor.id)
}

pub fn delete_doctor(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute("DELETE FROM doctors WHERE id = ?1", params![id.to_string()])?;
    expect_affected(affected, "doctor", id)
}
