use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ProcedureKind, ProcedureStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub kind: ProcedureKind,
    pub configured_procedure_id: Option<Uuid>,
    pub price_cents: Option<i64>,
    pub scheduled_date: Option<NaiveDate>,
    pub performed_date: Option<NaiveDate>,
    pub status: ProcedureStatus,
    pub notes: Option<String>,
}
