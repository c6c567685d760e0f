use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{expect_affected, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<MarketingSource> {
    Ok(MarketingSource {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        channel: row.get(2)?,
        active: row.get::<_, i32>(3)? != 0,
    })
}

pub fn insert_marketing_source(
    conn: &Connection,
    source: &MarketingSource,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO marketing_sources (id, name, channel, active) VALUES (?1, ?2, ?3, ?4)",
        params![source.id.to_string(), source.name, source.channel, source.active as i32],
    )?;
    Ok(())
}

pub fn get_marketing_source(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<MarketingSource>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, channel, active FROM marketing_sources WHERE id = ?1",
        params![id.to_string()],
        source_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_marketing_sources(conn: &Connection) -> Result<Vec<MarketingSource>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, channel, active FROM marketing_sources ORDER BY name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], source_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_marketing_source(
    conn: &Connection,
    source: &MarketingSource,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE marketing_sources SET name = ?2, channel = ?3, active = ?4 WHERE id = ?1",
        params![source.id.to_string(), source.name, source.channel, source.active as i32],
    )?;
    expect_affected(affected, "marketing_source", &source.id)
}

pub fn delete_marketing_source(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM marketing_sources WHERE id = ?1",
        params![id.to_string()],
    )?;
    expect_affected(affected, "marketing_source", id)
}
