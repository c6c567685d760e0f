use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{expect_affected, uuid_at};
use crate::db::DatabaseError;
use crate::models::*;

const STAGE_COLUMNS: &str = "id, funnel_id, name, position, color";

fn stage_from_row(row: &Row<'_>) -> rusqlite::Result<Stage> {
    Ok(Stage {
        id: uuid_at(row, 0)?,
        funnel_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        position: row.get(3)?,
        color: row.get(4)?,
    })
}

/// Insert a funnel together with its stages.
pub fn insert_funnel(conn: &Connection, funnel: &Funnel) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO funnels (id, name, position) VALUES (?1, ?2, ?3)",
        params![funnel.id.to_string(), funnel.name, funnel.position],
    )?;
    for stage in &funnel.stages {
        insert_stage(conn, stage)?;
    }
    Ok(())
}

pub fn insert_stage(conn: &Connection, stage: &Stage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO stages (id, funnel_id, name, position, color) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            stage.id.to_string(),
            stage.funnel_id.to_string(),
            stage.name,
            stage.position,
            stage.color,
        ],
    )?;
    Ok(())
}

pub fn list_stages(conn: &Connection, funnel_id: &Uuid) -> Result<Vec<Stage>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STAGE_COLUMNS} FROM stages WHERE funnel_id = ?1 ORDER BY position, name"
    ))?;
    let rows = stmt.query_map(params![funnel_id.to_string()], stage_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_funnel(conn: &Connection, id: &Uuid) -> Result<Option<Funnel>, DatabaseError> {
    let head = conn
        .query_row(
            "SELECT id, name, position FROM funnels WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((uuid_at(row, 0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
        )
        .optional()?;

    match head {
        Some((id, name, position)) => Ok(Some(Funnel {
            stages: list_stages(conn, &id)?,
            id,
            name,
            position,
        })),
        None => Ok(None),
    }
}

/// All funnels with their stages, in display order.
pub fn list_funnels(conn: &Connection) -> Result<Vec<Funnel>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name, position FROM funnels ORDER BY position, name")?;
    let heads = stmt
        .query_map([], |row| {
            Ok((uuid_at(row, 0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stage_stmt = conn.prepare(&format!(
        "SELECT {STAGE_COLUMNS} FROM stages ORDER BY position, name"
    ))?;
    let mut by_funnel: HashMap<Uuid, Vec<Stage>> = HashMap::new();
    for stage in stage_stmt.query_map([], stage_from_row)? {
        let stage = stage?;
        by_funnel.entry(stage.funnel_id).or_default().push(stage);
    }

    Ok(heads
        .into_iter()
        .map(|(id, name, position)| Funnel {
            stages: by_funnel.remove(&id).unwrap_or_default(),
            id,
            name,
            position,
        })
        .collect())
}

/// Update a funnel and reconcile its stage list.
///
/// Stages missing from `funnel.stages` are deleted, new ones inserted,
/// existing ones updated. A renamed stage relabels the patients of this
/// funnel that sat in it, since `patients.status` holds the stage name.
/// Run inside a transaction.
pub fn update_funnel(conn: &Connection, funnel: &Funnel) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE funnels SET name = ?2, position = ?3 WHERE id = ?1",
        params![funnel.id.to_string(), funnel.name, funnel.position],
    )?;
    expect_affected(affected, "funnel", &funnel.id)?;

    let existing: HashMap<Uuid, Stage> = list_stages(conn, &funnel.id)?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    for old in existing.values() {
        if !funnel.stages.iter().any(|s| s.id == old.id) {
            conn.execute("DELETE FROM stages WHERE id = ?1", params![old.id.to_string()])?;
        }
    }

    // Park renamed stages on a unique placeholder first so swapping two
    // names never trips UNIQUE(funnel_id, name).
    let mut renames = Vec::new();
    for stage in &funnel.stages {
        if let Some(old) = existing.get(&stage.id) {
            if old.name != stage.name {
                conn.execute(
                    "UPDATE stages SET name = ?2 WHERE id = ?1",
                    params![stage.id.to_string(), format!("~{}", stage.id)],
                )?;
                renames.push((old.name.clone(), stage.name.clone()));
            }
        }
    }

    for stage in &funnel.stages {
        if existing.contains_key(&stage.id) {
            conn.execute(
                "UPDATE stages SET name = ?2, position = ?3, color = ?4 WHERE id = ?1",
                params![stage.id.to_string(), stage.name, stage.position, stage.color],
            )?;
        } else {
            insert_stage(conn, &Stage {
                funnel_id: funnel.id,
                ..stage.clone()
            })?;
        }
    }

    // Same two-step trick for patient labels.
    for (old_name, new_name) in &renames {
        conn.execute(
            "UPDATE patients SET status = ?3 WHERE funnel_id = ?1 AND status = ?2",
            params![funnel.id.to_string(), old_name, format!("~{new_name}")],
        )?;
    }
    for (_, new_name) in &renames {
        conn.execute(
            "UPDATE patients SET status = ?2 WHERE funnel_id = ?1 AND status = ?3",
            params![funnel.id.to_string(), new_name, format!("~{new_name}")],
        )?;
    }

    Ok(())
}

/// Rewrite stage positions to follow `ordered_ids`.
pub fn reorder_stages(
    conn: &Connection,
    funnel_id: &Uuid,
    ordered_ids: &[Uuid],
) -> Result<(), DatabaseError> {
    for (position, id) in ordered_ids.iter().enumerate() {
        let affected = conn.execute(
            "UPDATE stages SET position = ?3 WHERE id = ?1 AND funnel_id = ?2",
            params![id.to_string(), funnel_id.to_string(), position as i64],
        )?;
        expect_affected(affected, "stage", id)?;
    }
    Ok(())
}

pub fn delete_stage(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute("DELETE FROM stages WHERE id = ?1", params![id.to_string()])?;
    expect_affected(affected, "stage", id)
}

pub fn delete_funnel(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute("DELETE FROM funnels WHERE id = ?1", params![id.to_string()])?;
    expect_affected(affected, "funnel", id)
}
