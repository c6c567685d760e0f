use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{expect_affected, opt_uuid_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: uuid_at(row, 0)?,
        patient_id: uuid_at(row, 1)?,
        author_id: opt_uuid_at(row, 2)?,
        author_name: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_note(conn: &Connection, note: &Note) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notes (id, patient_id, author_id, author_name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            note.id.to_string(),
            note.patient_id.to_string(),
            note.author_id.map(|id| id.to_string()),
            note.author_name,
            note.description,
            note.created_at,
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn list_notes_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Note>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, author_id, author_name, description, created_at
         FROM notes WHERE patient_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], note_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Only the text is editable; author and timestamp are kept.
pub fn update_note(conn: &Connection, note: &Note) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE notes SET description = ?2 WHERE id = ?1",
        params![note.id.to_string(), note.description],
    )?;
    expect_affected(affected, "note", &note.id)
}

pub fn delete_note(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute("DELETE FROM notes WHERE id = ?1", params![id.to_string()])?;
    expect_affected(affected, "note", id)
}
