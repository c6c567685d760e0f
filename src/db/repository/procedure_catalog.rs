use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_at, expect_affected, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

const CATALOG_COLUMNS: &str = "id, name, kind, default_price_cents, active";

fn configured_from_row(row: &Row<'_>) -> rusqlite::Result<ConfiguredProcedure> {
    Ok(ConfiguredProcedure {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        kind: enum_at(row, 2)?,
        default_price_cents: row.get(3)?,
        active: row.get::<_, i32>(4)? != 0,
    })
}

pub fn insert_configured_procedure(
    conn: &Connection,
    procedure: &ConfiguredProcedure,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO configured_procedures (id, name, kind, default_price_cents, active)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            procedure.id.to_string(),
            procedure.name,
            procedure.kind.as_str(),
            procedure.default_price_cents,
            procedure.active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_configured_procedure(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ConfiguredProcedure>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {CATALOG_COLUMNS} FROM configured_procedures WHERE id = ?1"),
        params![id.to_string()],
        configured_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_configured_procedures(
    conn: &Connection,
) -> Result<Vec<ConfiguredProcedure>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CATALOG_COLUMNS} FROM configured_procedures ORDER BY kind, name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], configured_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_configured_procedure(
    conn: &Connection,
    procedure: &ConfiguredProcedure,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE configured_procedures SET name = ?2, kind = ?3, default_price_cents = ?4,
         active = ?5 WHERE id = ?1",
        params![
            procedure.id.to_string(),
            procedure.name,
            procedure.kind.as_str(),
            procedure.default_price_cents,
            procedure.active as i32,
        ],
    )?;
    expect_affected(affected, "configured_procedure", &procedure.id)
}

pub fn delete_configured_procedure(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM configured_procedures WHERE id = ?1",
        params![id.to_string()],
    )?;
    expect_affected(affected, "configured_procedure", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ProcedureKind;

    #[test]
    fn catalog_round_trips_kind() {
        let conn = open_memory_database().unwrap();
        let p = ConfiguredProcedure {
            id: Uuid::new_v4(),
            name: "Facectomia".into(),
            kind: ProcedureKind::Surgery,
            default_price_cents: Some(450_000),
            active: true,
        };
        insert_configured_procedure(&conn, &p).unwrap();
        let loaded = get_configured_procedure(&conn, &p.id).unwrap().unwrap();
        assert_eq!(loaded, p);
    }

    #[test]
    fn catalog_lists_grouped_by_kind() {
        let conn = open_memory_database().unwrap();
        for (name, kind) in [
            ("Mapeamento de retina", ProcedureKind::Exam),
            ("Consulta inicial", ProcedureKind::Consultation),
            ("Topografia", ProcedureKind::Exam),
        ] {
            insert_configured_procedure(&conn, &ConfiguredProcedure {
                id: Uuid::new_v4(),
                name: name.into(),
                kind,
                default_price_cents: None,
                active: true,
            })
            .unwrap();
        }
        let names: Vec<String> = list_configured_procedures(&conn)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Consulta inicial", "Mapeamento de retina", "Topografia"]);
    }
}
