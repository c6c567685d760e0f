use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::whatsapp::GatewaySettings;

/// Application-level constants
pub const APP_NAME: &str = "OphthalmoCRM";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

/// Wait between a WhatsApp send and the history re-fetch that should show it.
pub const DEFAULT_CHAT_REFRESH_MS: u64 = 1500;

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

/// Upper bound for avatar and WhatsApp media uploads.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "ophthalmo_crm=info,tower_http=warn"
}

/// Get the application data directory.
/// `CRM_DATA_DIR` wins; otherwise the platform data dir, then the working dir.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CRM_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("crm.db")
}

pub fn avatars_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("avatars")
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub chat_refresh: Duration,
    pub session_ttl: chrono::Duration,
    /// Gateway values seeded from the environment; stored settings take over once saved.
    pub gateway: Option<GatewaySettings>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = lookup("CRM_BIND_ADDR")
            .and_then(|raw| match raw.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Invalid CRM_BIND_ADDR, using default");
                    None
                }
            })
            .unwrap_or_else(default_bind_addr);

        let data_dir = lookup("CRM_DATA_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(data_dir);

        let chat_refresh_ms =
            parse_or_default(&lookup, "CRM_CHAT_REFRESH_MS", DEFAULT_CHAT_REFRESH_MS);
        let session_ttl_hours =
            parse_or_default(&lookup, "CRM_SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS);

        let gateway = match (
            lookup("EVOLUTION_API_URL"),
            lookup("EVOLUTION_API_KEY"),
            lookup("EVOLUTION_INSTANCE"),
        ) {
            (Some(base_url), Some(api_key), Some(instance)) => {
                Some(GatewaySettings::new(&base_url, &api_key, &instance))
            }
            _ => None,
        };

        Self {
            bind_addr,
            data_dir,
            chat_refresh: Duration::from_millis(chat_refresh_ms),
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            gateway,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        database_path(&self.data_dir)
    }

    pub fn avatars_dir(&self) -> PathBuf {
        avatars_dir(&self.data_dir)
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid number in environment, using default");
            default
        }),
    }
}
