//! Hospital and doctor endpoints.
//!
//! Doctors belong to a hospital: creating or moving a doctor requires the
//! hospital to exist, and deleting a hospital removes its doctors.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::active_by_default;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::{self, DatabaseError};
use crate::models::{Doctor, Hospital};
use crate::validation::{validate_doctor, validate_hospital};

#[derive(Deserialize)]
pub struct HospitalInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

#[derive(Deserialize)]
pub struct DoctorInput {
    #[serde(default)]
    pub hospital_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub crm_number: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl HospitalInput {
    fn into_hospital(self, id: Uuid, created_at: chrono::DateTime<Utc>) -> Hospital {
        Hospital {
            id,
            name: self.name.trim().to_string(),
            city: self.city,
            phone: self.phone,
            active: self.active,
            created_at,
        }
    }
}

impl DoctorInput {
    fn into_doctor(self, id: Uuid) -> Doctor {
        Doctor {
            id,
            hospital_id: self.hospital_id,
            name: self.name.trim().to_string(),
            crm_number: self.crm_number,
            specialty: self.specialty,
            phone: self.phone,
            active: self.active,
        }
    }
}

// ── Hospitals ──────────────────────────────────────────────

/// `GET /api/hospitals`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Hospital>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_hospitals(&conn)?))
}

/// `POST /api/hospitals`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<HospitalInput>,
) -> Result<(StatusCode, Json<Hospital>), ApiError> {
    let hospital = input.into_hospital(Uuid::new_v4(), Utc::now());
    validate_hospital(&hospital)?;

    let conn = ctx.core.open_db()?;
    db::insert_hospital(&conn, &hospital)?;
    tracing::info!(hospital_id = %hospital.id, "Hospital created");
    Ok((StatusCode::CREATED, Json(hospital)))
}

/// `GET /api/hospitals/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Hospital>, ApiError> {
    let conn = ctx.core.open_db()?;
    let hospital = db::get_hospital(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("hospital", id))?;
    Ok(Json(hospital))
}

/// `PUT /api/hospitals/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<HospitalInput>,
) -> Result<Json<Hospital>, ApiError> {
    let conn = ctx.core.open_db()?;
    let stored = db::get_hospital(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("hospital", id))?;
    let hospital = input.into_hospital(id, stored.created_at);
    validate_hospital(&hospital)?;

    db::update_hospital(&conn, &hospital)?;
    Ok(Json(hospital))
}

/// `DELETE /api/hospitals/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_hospital(&conn, &id)?;
    tracing::info!(hospital_id = %id, "Hospital deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/hospitals/:id/doctors`
pub async fn doctors_of(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let conn = ctx.core.open_db()?;
    if db::get_hospital(&conn, &id)?.is_none() {
        return Err(DatabaseError::not_found("hospital", id).into());
    }
    Ok(Json(db::list_doctors_for_hospital(&conn, &id)?))
}

// ── Doctors ────────────────────────────────────────────────

/// `GET /api/doctors`
pub async fn list_doctors(State(ctx): State<ApiContext>) -> Result<Json<Vec<Doctor>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_doctors(&conn)?))
}

/// `POST /api/doctors`
pub async fn create_doctor(
    State(ctx): State<ApiContext>,
    Json(input): Json<DoctorInput>,
) -> Result<(StatusCode, Json<Doctor>), ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = input.into_doctor(Uuid::new_v4());
    let hospital_exists = db::get_hospital(&conn, &doctor.hospital_id)?.is_some();
    validate_doctor(&doctor, hospital_exists)?;

    db::insert_doctor(&conn, &doctor)?;
    tracing::info!(doctor_id = %doctor.id, hospital_id = %doctor.hospital_id, "Doctor created");
    Ok((StatusCode::CREATED, Json(doctor)))
}

/// `PUT /api/doctors/:id`
pub async fn update_doctor(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<DoctorInput>,
) -> Result<Json<Doctor>, ApiError> {
    let conn = ctx.core.open_db()?;
    if db::get_doctor(&conn, &id)?.is_none() {
        return Err(DatabaseError::not_found("doctor", id).into());
    }
    let doctor = input.into_doctor(id);
    let hospital_exists = db::get_hospital(&conn, &doctor.hospital_id)?.is_some();
    validate_doctor(&doctor, hospital_exists)?;

    db::update_doctor(&conn, &doctor)?;
    Ok(Json(doctor))
}

/// `DELETE /api/doctors/:id`
pub async fn delete_doctor(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_doctor(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
