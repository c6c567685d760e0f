use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub hospital_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub insurance_plan_id: Option<Uuid>,
    pub funnel_id: Option<Uuid>,
    /// Name of a stage in the patient's funnel. Not a foreign key.
    pub status: String,
    pub consultant_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub marketing: Marketing,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Marketing attribution captured at lead intake. Stored as a JSON blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marketing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    /// Anything else the intake form sent along (utm_* tags, ad ids).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
