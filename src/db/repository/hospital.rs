use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{expect_affected, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

const HOSPITAL_COLUMNS: &str = "id, name, city, phone, active, created_at";

fn hospital_from_row(row: &Row<'_>) -> rusqlite::Result<Hospital> {
    Ok(Hospital {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        phone: row.get(3)?,
        active: row.get::<_, i32>(4)? != 0,
        created_at: row.get(5)?,
    })
}

pub fn insert_hospital(conn: &Connection, hospital: &Hospital) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO hospitals (id, name, city, phone, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            hospital.id.to_string(),
            hospital.name,
            hospital.city,
            hospital.phone,
            hospital.active as i32,
            hospital.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_hospital(conn: &Connection, id: &Uuid) -> Result<Option<Hospital>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {HOSPITAL_COLUMNS} FROM hospitals WHERE id = ?1"),
        params![id.to_string()],
        hospital_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_hospitals(conn: &Connection) -> Result<Vec<Hospital>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HOSPITAL_COLUMNS} FROM hospitals ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], hospital_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_hospital(conn: &Connection, hospital: &Hospital) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE hospitals SET name = ?2, city = ?3, phone = ?4, active = ?5 WHERE id = ?1",
        params![
            hospital.id.to_string(),
            hospital.name,
            hospital.city,
            hospital.phone,
            hospital.active as i32,
        ],
    )?;
    expect_affected(affected, "hospital", &hospital.id)
}

/// Deleting a hospital cascades to its doctors; patients keep a NULL reference.
pub fn delete_hospital(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute("DELETE FROM hospitals WHERE id = ?1", params![id.to_string()])?;
    expect_affected(affected, "hospital", id)
}
