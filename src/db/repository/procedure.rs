use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{enum_at, expect_affected, opt_uuid_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

const PROCEDURE_COLUMNS: &str = "id, patient_id, kind, configured_procedure_id, price_cents,
    scheduled_date, performed_date, status, notes";

fn procedure_from_row(row: &Row<'_>) -> rusqlite::Result<Procedure> {
    Ok(Procedure {
        id: uuid_at(row, 0)?,
        patient_id: uuid_at(row, 1)?,
        kind: enum_at(row, 2)?,
        configured_procedure_id: opt_uuid_at(row, 3)?,
        price_cents: row.get(4)?,
        scheduled_date: row.get(5)?,
        performed_date: row.get(6)?,
        status: enum_at(row, 7)?,
        notes: row.get(8)?,
    })
}

pub fn insert_procedure(conn: &Connection, proc: &Procedure) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO procedures (id, patient_id, kind, configured_procedure_id, price_cents,
         scheduled_date, performed_date, status, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            proc.id.to_string(),
            proc.patient_id.to_string(),
            proc.kind.as_str(),
            proc.configured_procedure_id.map(|id| id.to_string()),
            proc.price_cents,
            proc.scheduled_date,
            proc.performed_date,
            proc.status.as_str(),
            proc.notes,
        ],
    )?;
    Ok(())
}

pub fn list_procedures_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Procedure>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROCEDURE_COLUMNS} FROM procedures WHERE patient_id = ?1
         ORDER BY coalesce(scheduled_date, performed_date) DESC, rowid"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], procedure_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_procedure(conn: &Connection, proc: &Procedure) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE procedures SET kind = ?2, configured_procedure_id = ?3, price_cents = ?4,
         scheduled_date = ?5, performed_date = ?6, status = ?7, notes = ?8
         WHERE id = ?1",
        params![
            proc.id.to_string(),
            proc.kind.as_str(),
            proc.configured_procedure_id.map(|id| id.to_string()),
            proc.price_cents,
            proc.scheduled_date,
            proc.performed_date,
            proc.status.as_str(),
            proc.notes,
        ],
    )?;
    expect_affected(affected, "procedure", &proc.id)
}

pub fn delete_procedure(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute("DELETE FROM procedures WHERE id = ?1", params![id.to_string()])?;
    expect_affected(affected, "procedure", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::*;

    #[test]
    fn procedure_status_and_kind_persist() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "Eva", None, "Lead");
        let mut proc = fixtures::procedure(&conn, p.id, ProcedureKind::Surgery);
        proc.status = ProcedureStatus::Won;
        proc.performed_date = chrono::NaiveDate::from_ymd_opt(2026, 3, 10);
        update_procedure(&conn, &proc).unwrap();

        let loaded = list_procedures_for_patient(&conn, &p.id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], proc);
    }
}
