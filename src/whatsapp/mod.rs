//! WhatsApp messaging through an Evolution API gateway.
//!
//! The gateway is reached over plain HTTP with a static API key. Nothing is
//! pushed to us: chat history is re-fetched after each send (see
//! [`chat::ChatSession`]).

pub mod chat;
pub mod client;
pub mod jid;
pub mod types;

pub use chat::*;
pub use client::*;
pub use jid::*;
pub use types::*;

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::enums::ConnectionStatus;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("WhatsApp gateway is not configured")]
    NotConfigured,

    #[error("Phone number '{0}' cannot receive WhatsApp messages")]
    InvalidPhone(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Gateway unreachable at {0}")]
    Connection(String),

    #[error("Gateway request timed out")]
    Timeout,

    #[error("Gateway returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Invalid media: {0}")]
    Media(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ── Settings ───────────────────────────────────────────────

const KEY_BASE_URL: &str = "whatsapp.base_url";
const KEY_API_KEY: &str = "whatsapp.api_key";
const KEY_INSTANCE: &str = "whatsapp.instance";
const KEY_LAST_STATUS: &str = "whatsapp.last_status";

/// Gateway connection values, persisted in the `settings` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub base_url: String,
    pub api_key: String,
    pub instance: String,
    pub last_status: Option<ConnectionStatus>,
}

impl GatewaySettings {
    pub fn new(base_url: &str, api_key: &str, instance: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            instance: instance.trim().to_string(),
            last_status: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty() && !self.instance.is_empty()
    }

    /// Stored settings, or `None` until all three values have been saved.
    pub fn load(conn: &Connection) -> Result<Option<Self>, DatabaseError> {
        let base_url = db::get_setting(conn, KEY_BASE_URL)?;
        let api_key = db::get_setting(conn, KEY_API_KEY)?;
        let instance = db::get_setting(conn, KEY_INSTANCE)?;
        let (Some(base_url), Some(api_key), Some(instance)) = (base_url, api_key, instance) else {
            return Ok(None);
        };

        let last_status = db::get_setting(conn, KEY_LAST_STATUS)?
            .map(|raw| ConnectionStatus::from_gateway_state(&raw));

        Ok(Some(Self {
            base_url,
            api_key,
            instance,
            last_status,
        }))
    }

    pub fn save(&self, conn: &Connection) -> Result<(), DatabaseError> {
        db::set_setting(conn, KEY_BASE_URL, &self.base_url)?;
        db::set_setting(conn, KEY_API_KEY, &self.api_key)?;
        db::set_setting(conn, KEY_INSTANCE, &self.instance)?;
        match self.last_status {
            Some(status) => db::set_setting(conn, KEY_LAST_STATUS, status.as_str()),
            None => db::delete_setting(conn, KEY_LAST_STATUS),
        }
    }

    /// Remember the last connection state seen, for display before the next check.
    pub fn record_status(conn: &Connection, status: ConnectionStatus) -> Result<(), DatabaseError> {
        db::set_setting(conn, KEY_LAST_STATUS, status.as_str())
    }

    /// Settings as shown to clients; the API key itself never leaves the server.
    pub fn view(&self) -> SettingsView {
        SettingsView {
            base_url: self.base_url.clone(),
            instance: self.instance.clone(),
            has_api_key: !self.api_key.is_empty(),
            last_status: self.last_status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub base_url: String,
    pub instance: String,
    pub has_api_key: bool,
    pub last_status: Option<ConnectionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn new_trims_trailing_slash_and_whitespace() {
        let s = GatewaySettings::new(" https://evo.example.com/ ", " key ", "clinica ");
        assert_eq!(s.base_url, "https://evo.example.com");
        assert_eq!(s.api_key, "key");
        assert_eq!(s.instance, "clinica");
        assert!(s.is_complete());
    }

    #[test]
    fn load_is_none_until_saved() {
        let conn = open_memory_database().unwrap();
        assert!(GatewaySettings::load(&conn).unwrap().is_none());

        let s = GatewaySettings::new("https://evo.example.com", "key", "clinica");
        s.save(&conn).unwrap();
        assert_eq!(GatewaySettings::load(&conn).unwrap(), Some(s));
    }

    #[test]
    fn recorded_status_survives_reload() {
        let conn = open_memory_database().unwrap();
        GatewaySettings::new("https://evo.example.com", "key", "clinica")
            .save(&conn)
            .unwrap();
        GatewaySettings::record_status(&conn, ConnectionStatus::Open).unwrap();

        let loaded = GatewaySettings::load(&conn).unwrap().unwrap();
        assert_eq!(loaded.last_status, Some(ConnectionStatus::Open));
    }

    #[test]
    fn view_hides_api_key() {
        let s = GatewaySettings::new("https://evo.example.com", "secret", "clinica");
        let json = serde_json::to_value(s.view()).unwrap();
        assert_eq!(json["has_api_key"], true);
        assert!(json.get("api_key").is_none());
        assert!(!json.to_string().contains("secret"));
    }
}
