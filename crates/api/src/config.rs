//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

use storeledger_observability::LogFormat;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// The shop's offset from UTC; business days start at local midnight.
    pub utc_offset: FixedOffset,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            use_persistent_stores: false,
            database_url: None,
            utc_offset: Utc.fix(),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset and empty variables take their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let use_persistent_stores = match var("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "USE_PERSISTENT_STORES",
                reason: format!("expected true or false, got `{raw}`"),
            })?,
        };

        let database_url = var("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let utc_offset = match var("SHOP_UTC_OFFSET_MINUTES") {
            None => Utc.fix(),
            Some(raw) => {
                let minutes: i32 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: "SHOP_UTC_OFFSET_MINUTES",
                    reason: format!("expected whole minutes, got `{raw}`"),
                })?;
                if minutes.abs() > MAX_OFFSET_MINUTES {
                    return Err(ConfigError::Invalid {
                        name: "SHOP_UTC_OFFSET_MINUTES",
                        reason: format!("{minutes} is outside ±{MAX_OFFSET_MINUTES}"),
                    });
                }
                FixedOffset::east_opt(minutes * 60).ok_or_else(|| ConfigError::Invalid {
                    name: "SHOP_UTC_OFFSET_MINUTES",
                    reason: format!("{minutes} is not a valid offset"),
                })?
            }
        };

        let log_format = match var("LOG_FORMAT") {
            None => LogFormat::Json,
            Some(raw) => raw.parse().map_err(|e: storeledger_observability::ParseLogFormatError| {
                ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: e.to_string(),
                }
            })?,
        };

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        Ok(Self {
            bind_addr,
            jwt_secret,
            use_persistent_stores,
            database_url,
            utc_offset,
            log_format,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
