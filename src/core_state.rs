//! Shared application state behind every request.
//!
//! Holds paths and settings only; each request opens its own SQLite
//! connection, so there is no connection lock to contend on.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db;
use crate::whatsapp::{EvolutionClient, GatewayError, GatewaySettings};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

pub struct CoreState {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub avatars_dir: PathBuf,
    /// Wait between a WhatsApp send and the history re-fetch.
    pub chat_refresh: Duration,
    pub session_ttl: chrono::Duration,
    /// Shared so gateway calls reuse pooled connections.
    http: reqwest::Client,
}

impl CoreState {
    /// Create data directories, migrate the database and seed gateway
    /// settings from the environment when none are stored yet.
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let avatars_dir = config.avatars_dir();
        std::fs::create_dir_all(&avatars_dir)?;

        let core = Self {
            data_dir: config.data_dir.clone(),
            db_path: config.database_path(),
            avatars_dir,
            chat_refresh: config.chat_refresh,
            session_ttl: config.session_ttl,
            http: EvolutionClient::http_client()?,
        };

        // open_database runs migrations
        let conn = core.open_db()?;
        if let Some(seed) = &config.gateway {
            if GatewaySettings::load(&conn)?.is_none() {
                seed.save(&conn)?;
                tracing::info!(instance = %seed.instance, "Gateway settings seeded from environment");
            }
        }

        tracing::info!(db = %core.db_path.display(), "Core state ready");
        Ok(core)
    }

    /// Open a database connection for one request.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        Ok(db::open_database(&self.db_path)?)
    }

    /// Gateway client for the stored settings.
    pub fn gateway(&self, conn: &Connection) -> Result<EvolutionClient, GatewayError> {
        let settings = GatewaySettings::load(conn)?
            .filter(GatewaySettings::is_complete)
            .ok_or(GatewayError::NotConfigured)?;
        Ok(EvolutionClient::new(&settings, self.http.clone()))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::temp_core;
    use super::*;

    #[test]
    fn new_creates_dirs_and_database() {
        let (core, _tmp) = temp_core();
        assert!(core.db_path.exists());
        assert!(core.avatars_dir.is_dir());
        let conn = core.open_db().unwrap();
        assert!(db::count_tables(&conn).unwrap() > 0);
    }

    #[test]
    fn gateway_requires_settings() {
        let (core, _tmp) = temp_core();
        let conn = core.open_db().unwrap();
        assert!(matches!(core.gateway(&conn), Err(GatewayError::NotConfigured)));

        GatewaySettings::new("https://evo.example.com", "key", "clinica")
            .save(&conn)
            .unwrap();
        assert!(core.gateway(&conn).is_ok());
    }

    #[test]
    fn environment_seed_does_not_override_stored_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let lookup = move |key: &str| match key {
            "CRM_DATA_DIR" => Some(dir.clone()),
            "EVOLUTION_API_URL" => Some("https://seed.example.com".into()),
            "EVOLUTION_API_KEY" => Some("seed".into()),
            "EVOLUTION_INSTANCE" => Some("seed".into()),
            _ => None,
        };
        let config = AppConfig::from_lookup(lookup);

        let core = CoreState::new(&config).unwrap();
        let conn = core.open_db().unwrap();
        GatewaySettings::new("https://saved.example.com", "k", "clinica")
            .save(&conn)
            .unwrap();

        CoreState::new(&config).unwrap();
        let stored = GatewaySettings::load(&conn).unwrap().unwrap();
        assert_eq!(stored.base_url, "https://saved.example.com");
    }
}
