use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{expect_affected, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<InsurancePlan> {
    Ok(InsurancePlan {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        active: row.get::<_, i32>(3)? != 0,
    })
}

pub fn insert_insurance_plan(conn: &Connection, plan: &InsurancePlan) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO insurance_plans (id, name, code, active) VALUES (?1, ?2, ?3, ?4)",
        params![plan.id.to_string(), plan.name, plan.code, plan.active as i32],
    )?;
    Ok(())
}

pub fn get_insurance_plan(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<InsurancePlan>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, code, active FROM insurance_plans WHERE id = ?1",
        params![id.to_string()],
        plan_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn list_insurance_plans(conn: &Connection) -> Result<Vec<InsurancePlan>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, code, active FROM insurance_plans ORDER BY name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], plan_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_insurance_plan(conn: &Connection, plan: &InsurancePlan) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE insurance_plans SET name = ?2, code = ?3, active = ?4 WHERE id = ?1",
        params![plan.id.to_string(), plan.name, plan.code, plan.active as i32],
    )?;
    expect_affected(affected, "insurance_plan", &plan.id)
}

pub fn delete_insurance_plan(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM insurance_plans WHERE id = ?1",
        params![id.to_string()],
    )?;
    expect_affected(affected, "insurance_plan", id)
}
