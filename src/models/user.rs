use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::UserRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub avatar_path: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored session row. Only the SHA-256 of the bearer token is kept.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
