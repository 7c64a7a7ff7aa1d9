use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub cron_secret: String,
    pub token_ttl_days: i64,
    /// 0 leaves quest maintenance to the external cron trigger.
    pub maintenance_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("SLIMQUEST_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SLIMQUEST_JWT_SECRET is unset or still a placeholder");
        }

        let cron_secret = env::var("SLIMQUEST_CRON_SECRET").unwrap_or_default();
        if PLACEHOLDER_SECRETS.contains(&cron_secret.as_str()) {
            bail!("SLIMQUEST_CRON_SECRET is still a placeholder");
        }

        Ok(Self {
            host: load("SLIMQUEST_HOST", "0.0.0.0")?,
            port: load("SLIMQUEST_PORT", "3000")?,
            db_path: load("SLIMQUEST_DB_PATH", "slimquest.db")?,
            jwt_secret,
            cron_secret,
            token_ttl_days: load("SLIMQUEST_TOKEN_TTL_DAYS", "30")?,
            maintenance_interval_secs: load("SLIMQUEST_MAINTENANCE_INTERVAL_SECS", "0")?,
        })
    }
}

fn load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value '{raw}'"))
}
