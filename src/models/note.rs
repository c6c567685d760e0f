use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Action of the entry written when a patient is created.
pub const CREATED_ACTION: &str = "created";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    /// Short machine-friendly label, e.g. `stage_change`, `call`.
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entries written by the server rather than typed by a user.
    pub fn is_system(&self) -> bool {
        self.action == CREATED_ACTION
    }
}
