//! Runtime configuration loaded from environment variables.

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

use stockroom_inventory::DEFAULT_LOW_STOCK_THRESHOLD;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required: {reason}")]
    Missing { key: &'static str, reason: &'static str },

    #[error("invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    /// `Some` when persistent (Postgres) stores are enabled.
    pub database_url: Option<String>,
    /// `None` selects the in-memory identity provider.
    pub identity: Option<IdentityConfig>,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub low_stock_threshold: i64,
    pub seed_demo_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = try_load(&var, "PORT", 3000u16)?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let persistent = parse_flag(&var, "USE_PERSISTENT_STORES")?;
        let database_url = if persistent {
            Some(var("DATABASE_URL").ok_or(ConfigError::Missing {
                key: "DATABASE_URL",
                reason: "USE_PERSISTENT_STORES is enabled",
            })?)
        } else {
            None
        };

        let identity = match var("IDENTITY_URL") {
            Some(url) => Some(IdentityConfig {
                url,
                service_key: var("IDENTITY_SERVICE_KEY").ok_or(ConfigError::Missing {
                    key: "IDENTITY_SERVICE_KEY",
                    reason: "IDENTITY_URL is set",
                })?,
            }),
            None => {
                info!("IDENTITY_URL not set, using the in-memory identity provider");
                None
            }
        };

        let cors_origins = var("CORS_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let low_stock_threshold = try_load(&var, "LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD)?;
        if low_stock_threshold < 0 {
            return Err(ConfigError::Invalid {
                key: "LOW_STOCK_THRESHOLD",
                value: low_stock_threshold.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        Ok(Self {
            port,
            jwt_secret,
            database_url,
            identity,
            cors_origins,
            low_stock_threshold,
            seed_demo_data: parse_flag(&var, "SEED_DEMO_DATA")?,
        })
    }

    pub fn persistent(&self) -> bool {
        self.database_url.is_some()
    }
}

fn try_load<T, V>(var: &V, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn parse_flag<V>(var: &V, key: &'static str) -> Result<bool, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None | Some("false" | "0" | "no") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
