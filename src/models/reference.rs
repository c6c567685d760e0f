use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProcedureKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub name: String,
    /// Medical council registration number.
    pub crm_number: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePlan {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub active: bool,
}

/// A procedure offered by the clinic network, selectable on patient procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredProcedure {
    pub id: Uuid,
    pub name: String,
    pub kind: ProcedureKind,
    pub default_price_cents: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingSource {
    pub id: Uuid,
    pub name: String,
    pub channel: Option<String>,
    pub active: bool,
}
