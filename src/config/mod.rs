use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/eventhub";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_UPLOAD_DIR: &str = "static/img";
const DEFAULT_IMAGE: &str = "default.jpg";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;
const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Directory uploaded event images are written to and served from.
    pub upload_dir: PathBuf,
    /// Image reference stored for events created without an upload.
    pub default_image: String,
    pub session_ttl: chrono::Duration,
    /// Marks the session cookie `Secure`; on in production.
    pub secure_cookies: bool,
    pub max_body_bytes: usize,
    pub db_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            default_image: DEFAULT_IMAGE.to_string(),
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            secure_cookies: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| {
                warn!("DATABASE_URL not set, using default");
                defaults.database_url
            }),
            port: try_load("PORT", defaults.port),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            default_image: env::var("DEFAULT_IMAGE").unwrap_or(defaults.default_image),
            session_ttl: session_ttl(try_load("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)),
            secure_cookies: is_production(),
            max_body_bytes: try_load("MAX_BODY_BYTES", defaults.max_body_bytes),
            db_max_connections: try_load("DB_MAX_CONNECTIONS", defaults.db_max_connections),
        }
    }
}

pub fn is_production() -> bool {
    env::var("RUST_ENV")
        .map(|v| v.to_lowercase() == "production")
        .unwrap_or(false)
}

/// Lifetimes outside one hour to one year fall back to the default.
fn session_ttl(hours: i64) -> chrono::Duration {
    match chrono::Duration::try_hours(hours) {
        Some(ttl) if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) => ttl,
        _ => {
            warn!(
                "Invalid SESSION_TTL_HOURS value '{hours}', using default: {DEFAULT_SESSION_TTL_HOURS}"
            );
            chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS)
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_load_falls_back_on_garbage() {
        std::env::set_var("EVENTHUB_TEST_PORT", "not-a-port");
        assert_eq!(try_load("EVENTHUB_TEST_PORT", 3001u16), 3001);
        std::env::set_var("EVENTHUB_TEST_PORT", " 8080 ");
        assert_eq!(try_load("EVENTHUB_TEST_PORT", 3001u16), 8080);
        std::env::remove_var("EVENTHUB_TEST_PORT");
    }

    #[test]
    fn test_session_ttl_rejects_out_of_range_hours() {
        assert_eq!(session_ttl(48), chrono::Duration::hours(48));
        assert_eq!(session_ttl(i64::MAX), chrono::Duration::hours(24));
        assert_eq!(session_ttl(1_000_000_000_000), chrono::Duration::hours(24));
        assert_eq!(session_ttl(0), chrono::Duration::hours(24));
        assert_eq!(session_ttl(-5), chrono::Duration::hours(24));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_image, "default.jpg");
        assert_eq!(config.session_ttl, chrono::Duration::hours(24));
        assert!(!config.secure_cookies);
    }
}
