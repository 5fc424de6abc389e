use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::info;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    /// Reads the service configuration from the process environment.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite://food_delivery.db?mode=rwc")?,
            host: try_load("HOST", "0.0.0.0")?,
            port: try_load("PORT", "3000")?,
            secret: env::var("SECRET").map_err(|_| ConfigError::Missing("SECRET"))?,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "24")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}
