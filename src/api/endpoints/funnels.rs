//! Funnel endpoints and the pipeline board.
//!
//! - `GET|POST /api/funnels`
//! - `PUT|DELETE /api/funnels/:id` — PUT reconciles the stage list
//! - `GET /api/funnels/:id/board`

use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::{self, DatabaseError};
use crate::models::{Funnel, Stage};
use crate::pipeline::{load_board, BoardView};
use crate::validation::validate_funnel;

#[derive(Deserialize)]
pub struct FunnelInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: i64,
    /// Display order is the order given here.
    #[serde(default)]
    pub stages: Vec<StageInput>,
}

#[derive(Deserialize)]
pub struct StageInput {
    /// Existing stage to keep (and possibly rename); absent for a new one.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl FunnelInput {
    /// Stage ids not in `known` get a fresh id, so a client cannot claim
    /// another funnel's stage.
    fn into_funnel(self, id: Uuid, known: &HashSet<Uuid>) -> Funnel {
        let stages = self
            .stages
            .into_iter()
            .enumerate()
            .map(|(position, s)| Stage {
                id: s.id.filter(|sid| known.contains(sid)).unwrap_or_else(Uuid::new_v4),
                funnel_id: id,
                name: s.name.trim().to_string(),
                position: position as i64,
                color: s.color,
            })
            .collect();
        Funnel {
            id,
            name: self.name.trim().to_string(),
            position: self.position,
            stages,
        }
    }
}

/// `GET /api/funnels`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Funnel>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_funnels(&conn)?))
}

/// `POST /api/funnels`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<FunnelInput>,
) -> Result<(StatusCode, Json<Funnel>), ApiError> {
    let funnel = input.into_funnel(Uuid::new_v4(), &HashSet::new());
    validate_funnel(&funnel)?;

    let conn = ctx.core.open_db()?;
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    db::insert_funnel(&tx, &funnel)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(funnel_id = %funnel.id, stages = funnel.stages.len(), "Funnel created");
    Ok((StatusCode::CREATED, Json(funnel)))
}

/// `PUT /api/funnels/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<FunnelInput>,
) -> Result<Json<Funnel>, ApiError> {
    let conn = ctx.core.open_db()?;
    let stored = db::get_funnel(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("funnel", id))?;
    let known: HashSet<Uuid> = stored.stages.iter().map(|s| s.id).collect();
    let funnel = input.into_funnel(id, &known);
    validate_funnel(&funnel)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    db::update_funnel(&tx, &funnel)?;
    tx.commit().map_err(DatabaseError::from)?;

    let saved = db::get_funnel(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("funnel", id))?;
    tracing::info!(funnel_id = %id, stages = saved.stages.len(), "Funnel updated");
    Ok(Json(saved))
}

/// `DELETE /api/funnels/:id` — patients keep their status label but leave the funnel.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_funnel(&conn, &id)?;
    tracing::info!(funnel_id = %id, "Funnel deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/funnels/:id/board`
pub async fn board(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoardView>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut board = load_board(&conn, &id)?;
    Ok(Json(BoardView::from(&mut board)))
}
