//! Flat reference lists: insurance plans, the procedure catalog and
//! marketing sources. Each is a plain list with create/update/delete.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::active_by_default;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::enums::ProcedureKind;
use crate::models::{ConfiguredProcedure, InsurancePlan, MarketingSource};
use crate::validation::{validate_configured_procedure, validate_insurance_plan, validate_marketing_source};

#[derive(Deserialize)]
pub struct InsurancePlanInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

#[derive(Deserialize)]
pub struct ConfiguredProcedureInput {
    #[serde(default)]
    pub name: String,
    pub kind: ProcedureKind,
    #[serde(default)]
    pub default_price_cents: Option<i64>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

#[derive(Deserialize)]
pub struct MarketingSourceInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl InsurancePlanInput {
    fn into_plan(self, id: Uuid) -> InsurancePlan {
        InsurancePlan {
            id,
            name: self.name.trim().to_string(),
            code: self.code,
            active: self.active,
        }
    }
}

impl ConfiguredProcedureInput {
    fn into_procedure(self, id: Uuid) -> ConfiguredProcedure {
        ConfiguredProcedure {
            id,
            name: self.name.trim().to_string(),
            kind: self.kind,
            default_price_cents: self.default_price_cents,
            active: self.active,
        }
    }
}

impl MarketingSourceInput {
    fn into_source(self, id: Uuid) -> MarketingSource {
        MarketingSource {
            id,
            name: self.name.trim().to_string(),
            channel: self.channel,
            active: self.active,
        }
    }
}

// ── Insurance plans ────────────────────────────────────────

pub async fn list_insurance_plans(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<InsurancePlan>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_insurance_plans(&conn)?))
}

pub async fn create_insurance_plan(
    State(ctx): State<ApiContext>,
    Json(input): Json<InsurancePlanInput>,
) -> Result<(StatusCode, Json<InsurancePlan>), ApiError> {
    let plan = input.into_plan(Uuid::new_v4());
    validate_insurance_plan(&plan)?;
    let conn = ctx.core.open_db()?;
    db::insert_insurance_plan(&conn, &plan)?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_insurance_plan(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<InsurancePlanInput>,
) -> Result<Json<InsurancePlan>, ApiError> {
    let plan = input.into_plan(id);
    validate_insurance_plan(&plan)?;
    let conn = ctx.core.open_db()?;
    db::update_insurance_plan(&conn, &plan)?;
    Ok(Json(plan))
}

pub async fn delete_insurance_plan(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_insurance_plan(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Procedure catalog ──────────────────────────────────────

pub async fn list_procedures(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<ConfiguredProcedure>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_configured_procedures(&conn)?))
}

pub async fn create_procedure(
    State(ctx): State<ApiContext>,
    Json(input): Json<ConfiguredProcedureInput>,
) -> Result<(StatusCode, Json<ConfiguredProcedure>), ApiError> {
    let procedure = input.into_procedure(Uuid::new_v4());
    validate_configured_procedure(&procedure)?;
    let conn = ctx.core.open_db()?;
    db::insert_configured_procedure(&conn, &procedure)?;
    Ok((StatusCode::CREATED, Json(procedure)))
}

pub async fn update_procedure(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<ConfiguredProcedureInput>,
) -> Result<Json<ConfiguredProcedure>, ApiError> {
    let procedure = input.into_procedure(id);
    validate_configured_procedure(&procedure)?;
    let conn = ctx.core.open_db()?;
    db::update_configured_procedure(&conn, &procedure)?;
    Ok(Json(procedure))
}

pub async fn delete_procedure(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_configured_procedure(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Marketing sources ──────────────────────────────────────

pub async fn list_marketing_sources(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<MarketingSource>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_marketing_sources(&conn)?))
}

pub async fn create_marketing_source(
    State(ctx): State<ApiContext>,
    Json(input): Json<MarketingSourceInput>,
) -> Result<(StatusCode, Json<MarketingSource>), ApiError> {
    let source = input.into_source(Uuid::new_v4());
    validate_marketing_source(&source)?;
    let conn = ctx.core.open_db()?;
    db::insert_marketing_source(&conn, &source)?;
    Ok((StatusCode::CREATED, Json(source)))
}

pub async fn update_marketing_source(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<MarketingSourceInput>,
) -> Result<Json<MarketingSource>, ApiError> {
    let source = input.into_source(id);
    validate_marketing_source(&source)?;
    let conn = ctx.core.open_db()?;
    db::update_marketing_source(&conn, &source)?;
    Ok(Json(source))
}

pub async fn delete_marketing_source(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_marketing_source(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
