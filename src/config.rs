//! Runtime configuration
//! Mission: Read every tunable from the environment once at startup

use crate::auth::password::DEFAULT_COST;
use crate::storage::StorageBackend;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub bcrypt_cost: u32,
    /// Credential relay; credentials are only logged when unset
    pub notify_webhook_url: Option<String>,
    /// Included in credential notices
    pub login_url: String,
    /// Login attempts per client per minute
    pub login_rate_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid PORT '{}'", raw))?,
            None => 5000,
        };

        let storage = match get("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::Json,
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("⚠️  JWT_SECRET not set, using development secret");
            DEV_JWT_SECRET.to_string()
        });

        let jwt_expiration_hours = get("JWT_EXPIRATION_HOURS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);

        let bcrypt_cost = get("BCRYPT_COST")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_COST);

        let login_rate_limit = get("LOGIN_RATE_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            port,
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "./data".to_string())),
            storage,
            jwt_secret,
            jwt_expiration_hours,
            bcrypt_cost,
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            login_url: get("LOGIN_URL").unwrap_or_else(|| "http://localhost:3000/login".to_string()),
            login_rate_limit,
        })
    }

    pub fn login_window(&self) -> Duration {
        Duration::from_secs(60)
    }
}
