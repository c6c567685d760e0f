use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{expect_affected, opt_uuid_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: uuid_at(row, 0)?,
        patient_id: uuid_at(row, 1)?,
        author_id: opt_uuid_at(row, 2)?,
        author_name: row.get(3)?,
        action: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert_history_entry(conn: &Connection, entry: &HistoryEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO history_entries (id, patient_id, author_id, author_name, action,
         description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.id.to_string(),
            entry.patient_id.to_string(),
            entry.author_id.map(|id| id.to_string()),
            entry.author_name,
            entry.action,
            entry.description,
            entry.created_at,
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn list_history_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<HistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, author_id, author_name, action, description, created_at
         FROM history_entries WHERE patient_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], entry_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_history_entry(conn: &Connection, entry: &HistoryEntry) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE history_entries SET action = ?2, description = ?3 WHERE id = ?1",
        params![entry.id.to_string(), entry.action, entry.description],
    )?;
    expect_affected(affected, "history_entry", &entry.id)
}

pub fn delete_history_entry(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM history_entries WHERE id = ?1",
        params![id.to_string()],
    )?;
    expect_affected(affected, "history_entry", id)
}
