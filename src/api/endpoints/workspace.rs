//! `GET /api/workspace` — everything a client loads after sign-in.

use axum::extract::{Query, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::catalog::{load_workspace, Workspace};
use crate::models::PatientFilter;

pub async fn load(
    State(ctx): State<ApiContext>,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Workspace>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(load_workspace(&conn, &filter)?))
}
