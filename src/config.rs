//! Server settings read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const HOSTED_FRONTEND_URL: &str = "https://anon-chat.vercel.app";
pub const LOCAL_FRONTEND_URL: &str = "http://localhost:5173";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub data_file: PathBuf,
    pub snapshot_interval: Duration,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            data_file: PathBuf::from("board.json"),
            snapshot_interval: Duration::from_secs(300),
            allowed_origins: vec![
                HOSTED_FRONTEND_URL.to_string(),
                LOCAL_FRONTEND_URL.to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// Read settings from the process environment, loading `.env` first
    /// when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        if let Some(path) = lookup("BOARD_DATA_FILE") {
            config.data_file = PathBuf::from(path);
        }
        if let Some(secs) = lookup("SNAPSHOT_INTERVAL_SECS") {
            let secs: u64 = parse_var("SNAPSHOT_INTERVAL_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::InvalidVar {
                    key: "SNAPSHOT_INTERVAL_SECS".into(),
                    value: secs.to_string(),
                });
            }
            config.snapshot_interval = Duration::from_secs(secs);
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if let Some(bad) = config
                .allowed_origins
                .iter()
                .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
            {
                return Err(ConfigError::InvalidVar {
                    key: "ALLOWED_ORIGINS".into(),
                    value: bad.clone(),
                });
            }
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidVar {
        key: key.to_string(),
        value: value.to_string(),
    })
}
