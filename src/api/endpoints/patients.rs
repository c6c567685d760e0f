//! Patient endpoints.
//!
//! - `GET /api/patients` — filtered list
//! - `POST /api/patients` — new lead, lands in the funnel's first stage
//! - `GET /api/patients/:id` — detail record with children
//! - `PUT /api/patients/:id` — detail editor save (diff-sync)
//! - `DELETE /api/patients/:id`
//! - `PATCH /api/patients/:id/status` — board move

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::AuthenticatedUser;
use crate::db::{self, DatabaseError};
use crate::detail::{load_patient_detail, PatientRecord};
use crate::models::{HistoryEntry, Marketing, Patient, PatientFilter, CREATED_ACTION};
use crate::pipeline::{load_board, BoardView, MoveOutcome, SqliteStatusWriter};
use crate::sync::{save_patient, Author, PatientDraft, SyncReport};
use crate::validation::{non_nil, validate_patient, validate_patient_children};

#[derive(Deserialize)]
pub struct NewPatientRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub hospital_id: Option<Uuid>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub insurance_plan_id: Option<Uuid>,
    #[serde(default)]
    pub funnel_id: Option<Uuid>,
    /// Defaults to the funnel's first stage.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub consultant_id: Option<Uuid>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub marketing: Marketing,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub stage: String,
}

#[derive(Serialize)]
pub struct MoveResponse {
    #[serde(flatten)]
    pub outcome: MoveOutcome,
    pub board: BoardView,
}

#[derive(Serialize)]
pub struct SaveResponse {
    #[serde(flatten)]
    pub report: SyncReport,
    pub record: PatientRecord,
}

fn author_of(user: &AuthenticatedUser) -> Author {
    Author {
        id: Some(user.id),
        name: user.full_name.clone(),
    }
}

/// A status must name a stage of the patient's funnel. Patients outside
/// any funnel may carry any label.
fn check_status_in_funnel(conn: &Connection, patient: &Patient) -> Result<(), ApiError> {
    let Some(funnel_id) = patient.funnel_id else {
        return Ok(());
    };
    let funnel = db::get_funnel(conn, &funnel_id)?
        .ok_or_else(|| ApiError::field("funnel_id", "unknown funnel"))?;
    if funnel.stage_named(&patient.status).is_none() {
        return Err(ApiError::field("status", "unknown stage"));
    }
    Ok(())
}

/// `GET /api/patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_patients(&conn, &filter)?))
}

/// `POST /api/patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewPatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let conn = ctx.core.open_db()?;

    let funnel_id = non_nil(input.funnel_id);
    let status = match (input.status.filter(|s| !s.trim().is_empty()), funnel_id) {
        (Some(status), _) => status.trim().to_string(),
        (None, Some(funnel_id)) => db::get_funnel(&conn, &funnel_id)?
            .and_then(|f| f.first_stage().map(|s| s.name.clone()))
            .unwrap_or_default(),
        (None, None) => String::new(),
    };

    let now = Utc::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        full_name: input.full_name.trim().to_string(),
        email: input.email,
        phone: input.phone,
        birth_date: input.birth_date,
        city: input.city,
        hospital_id: non_nil(input.hospital_id),
        doctor_id: non_nil(input.doctor_id),
        insurance_plan_id: non_nil(input.insurance_plan_id),
        funnel_id,
        status,
        consultant_id: non_nil(input.consultant_id).or(Some(user.id)),
        manager_id: non_nil(input.manager_id),
        marketing: input.marketing,
        created_at: now,
        updated_at: now,
    };
    validate_patient(&patient)?;
    check_status_in_funnel(&conn, &patient)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    db::insert_patient(&tx, &patient)?;
    db::insert_history_entry(&tx, &HistoryEntry {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        author_id: Some(user.id),
        author_name: user.full_name.clone(),
        action: CREATED_ACTION.into(),
        description: format!("Lead created in stage {}", patient.status),
        created_at: now,
    })?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(patient_id = %patient.id, status = %patient.status, "Patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientRecord>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(load_patient_detail(&conn, &id)?))
}

/// `PUT /api/patients/:id` — the editor's full draft; children are diffed
/// against what is stored and written in one transaction.
pub async fn save(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(draft): Json<PatientDraft>,
) -> Result<Json<SaveResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let stored = db::get_patient(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("patient", id))?;

    let merged = draft.merged_into(&stored);
    validate_patient(&merged)?;
    validate_patient_children(&draft)?;
    if merged.status != stored.status || merged.funnel_id != stored.funnel_id {
        check_status_in_funnel(&conn, &merged)?;
    }

    let report = save_patient(&conn, &id, &draft, &author_of(&user))?;
    let record = load_patient_detail(&conn, &id)?;
    Ok(Json(SaveResponse { report, record }))
}

/// `DELETE /api/patients/:id` — children go with it.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_patient(&conn, &id)?;
    tracing::info!(patient_id = %id, "Patient deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /api/patients/:id/status` — drop a card on another column.
pub async fn move_stage(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = db::get_patient(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("patient", id))?;
    let funnel_id = patient
        .funnel_id
        .ok_or_else(|| ApiError::field("funnel_id", "patient is not in a funnel"))?;

    let mut board = load_board(&conn, &funnel_id)?;
    let outcome = board.move_patient(&id, input.stage.trim(), &SqliteStatusWriter::new(&conn))?;
    Ok(Json(MoveResponse {
        outcome,
        board: BoardView::from(&mut board),
    }))
}
