//! Client configuration loaded from environment.

use std::time::Duration;

/// Client configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// REST API base URL (e.g. `http://localhost:8000`).
    pub api_base_url: String,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Reconnect ceiling for the global channels.
    pub max_reconnect_attempts: u32,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let reconnect_delay_ms: u64 = std::env::var("RECONNECT_DELAY_MS")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigLoadError::InvalidNumber("RECONNECT_DELAY_MS"))?;

        let max_reconnect_attempts: u32 = std::env::var("MAX_RECONNECT_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigLoadError::InvalidNumber("MAX_RECONNECT_ATTEMPTS"))?;

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_base_url,
            reconnect_delay: Duration::from_millis(reconnect_delay_ms),
            max_reconnect_attempts,
            log_level,
        })
    }

    /// WebSocket base URL derived from the API base: same host, `ws`/`wss` scheme.
    pub fn ws_base_url(&self) -> String {
        if let Some(host) = self.api_base_url.strip_prefix("https://") {
            format!("wss://{}", host.trim_end_matches('/'))
        } else if let Some(host) = self.api_base_url.strip_prefix("http://") {
            format!("ws://{}", host.trim_end_matches('/'))
        } else {
            format!("ws://{}", self.api_base_url.trim_end_matches('/'))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid {0}")]
    InvalidNumber(&'static str),
}
