pub mod api; // HTTP surface
pub mod auth;
pub mod catalog; // Workspace fan-out fetch
pub mod config;
pub mod core_state;
pub mod db;
pub mod detail; // Patient detail modal
pub mod models;
pub mod pipeline; // Kanban board
pub mod storage; // Avatar files
pub mod sync; // Detail editor diff-sync
pub mod validation;
pub mod whatsapp; // Evolution API gateway

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Core state: {0}")]
    Core(#[from] core_state::CoreError),
    #[error("Server: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialise logging, open the data directory and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = config::AppConfig::from_env();
    let core = Arc::new(core_state::CoreState::new(&app_config)?);
    api::serve(core, app_config.bind_addr).await?;

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
