use serde::Deserialize;
use uuid::Uuid;

/// Patient list filter; also the query string of `GET /patients`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PatientFilter {
    pub funnel_id: Option<Uuid>,
    pub hospital_id: Option<Uuid>,
    pub consultant_id: Option<Uuid>,
    pub status: Option<String>,
    /// Case-insensitive match on name, phone or email.
    pub search: Option<String>,
}
