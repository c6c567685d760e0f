//! Repository layer — entity-scoped database operations.
//!
//! One sub-module per table family; free functions taking `&Connection`
//! so callers can pass a plain connection or an open transaction.

mod doctor;
mod funnel;
mod history;
mod hospital;
mod insurance;
mod marketing;
mod note;
mod patient;
mod procedure;
mod procedure_catalog;
mod session;
mod setting;
mod user;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use super::DatabaseError;

pub use doctor::*;
pub use funnel::*;
pub use history::*;
pub use hospital::*;
pub use insurance::*;
pub use marketing::*;
pub use note::*;
pub use patient::*;
pub use procedure::*;
pub use procedure_catalog::*;
pub use session::*;
pub use setting::*;
pub use user::*;

// ── Row helpers ─────────────────────────────────────────────
// UUIDs and enums are stored as TEXT.

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        Uuid::parse_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map "0 rows affected" on an UPDATE/DELETE to `NotFound`.
pub(crate) fn expect_affected(
    affected: usize,
    entity_type: &str,
    id: &Uuid,
) -> Result<(), DatabaseError> {
    if affected == 0 {
        return Err(DatabaseError::not_found(entity_type, id));
    }
    Ok(())
}
