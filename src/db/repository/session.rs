use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::uuid_at;
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_session(conn: &Connection, session: &StoredSession) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            session.token_hash,
            session.user_id.to_string(),
            session.created_at,
            session.expires_at,
        ],
    )?;
    Ok(())
}

pub fn get_session(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<StoredSession>, DatabaseError> {
    conn.query_row(
        "SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = ?1",
        params![token_hash],
        |row| {
            Ok(StoredSession {
                token_hash: row.get(0)?,
                user_id: uuid_at(row, 1)?,
                created_at: row.get(2)?,
                expires_at: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Returns whether a session was removed.
pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let affected = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
    Ok(affected > 0)
}

pub fn purge_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?)
}
