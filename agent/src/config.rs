//! Configuration management for the agent.

use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Control surface host address
    pub host: String,
    /// Control surface port
    pub port: u16,
    /// Base URL of the clinic API that pending mutations are relayed to
    pub api_base_url: Url,
    /// SQLite file backing the local store
    pub db_path: PathBuf,
    /// Bearer token to start with, until the session store provides one
    pub session_token: Option<String>,
    /// Timeout applied to every relay request
    pub request_timeout: Duration,
    /// Connectivity assumed at startup
    pub start_online: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "4100".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let api_base_url = env::var("CLINIC_API_BASE_URL")
            .map_err(|_| ConfigError::MissingApiBaseUrl)?;
        let api_base_url =
            Url::parse(&api_base_url).map_err(|e| ConfigError::InvalidApiBaseUrl(e.to_string()))?;

        let db_path = env::var("CLINIC_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("clinic-sync.db"));

        let session_token = env::var("CLINIC_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let request_timeout = env::var("CLINIC_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let start_online = match env::var("CLINIC_START_ONLINE") {
            Ok(value) => parse_bool(&value).ok_or(ConfigError::InvalidStartOnline)?,
            Err(_) => false,
        };

        Ok(Self {
            host,
            port,
            api_base_url,
            db_path,
            session_token,
            request_timeout,
            start_online,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CLINIC_API_BASE_URL environment variable is required")]
    MissingApiBaseUrl,

    #[error("Invalid CLINIC_API_BASE_URL: {0}")]
    InvalidApiBaseUrl(String),

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid CLINIC_REQUEST_TIMEOUT_SECS value")]
    InvalidTimeout,

    #[error("Invalid CLINIC_START_ONLINE value")]
    InvalidStartOnline,
}
