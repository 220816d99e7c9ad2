use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::client::ReconnectOptions;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level of this crate when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Database URL. The in-memory store is used when absent.
    pub db_url: Option<String>,

    /// Path of the live update channel
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Delay between the first mutation and the coalesced broadcast
    #[serde(default = "default_broadcast_throttle_ms")]
    pub broadcast_throttle_ms: u64,

    /// Frames a connection may have queued before it is dropped as too slow
    #[serde(default = "default_connection_queue_capacity")]
    pub connection_queue_capacity: usize,

    /// Origin the live channel client resolves bare paths against
    #[serde(default = "default_live_origin")]
    pub live_origin: String,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        format!(
            "batch_live={},tower_http=debug,axum::rejection=trace,info",
            self.log_level
        )
    }

    pub fn broadcast_throttle(&self) -> Duration {
        Duration::from_millis(self.broadcast_throttle_ms)
    }

    /// Reconnect policy for the live channel client
    pub fn reconnect_options(&self) -> ReconnectOptions {
        ReconnectOptions {
            enabled: true,
            interval: Duration::from_millis(self.reconnect_interval_ms),
            max_attempts: self.reconnect_attempts,
        }
    }

    /// Parsed CORS origins, empty when none are configured
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            db_url: None,
            ws_path: default_ws_path(),
            broadcast_throttle_ms: default_broadcast_throttle_ms(),
            connection_queue_capacity: default_connection_queue_capacity(),
            live_origin: default_live_origin(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            reconnect_attempts: default_reconnect_attempts(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_broadcast_throttle_ms() -> u64 {
    2_000
}

fn default_connection_queue_capacity() -> usize {
    32
}

fn default_live_origin() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    10_000
}

fn default_reconnect_attempts() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_live_channel_policy() {
        let config = Config::default();
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.broadcast_throttle(), Duration::from_secs(2));

        let reconnect = config.reconnect_options();
        assert!(reconnect.enabled);
        assert_eq!(reconnect.interval, Duration::from_secs(10));
        assert_eq!(reconnect.max_attempts, 5);
    }

    #[test]
    fn log_level_drives_default_filter() {
        assert_eq!(
            Config::default().default_log_filter(),
            "batch_live=debug,tower_http=debug,axum::rejection=trace,info"
        );

        let config = Config {
            log_level: "warn".to_string(),
            ..Config::default()
        };
        assert!(config.default_log_filter().starts_with("batch_live=warn,"));
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = Config {
            cors_origins: Some(" http://a.example ,,http://b.example".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.cors_origin_list(),
            vec!["http://a.example".to_string(), "http://b.example".to_string()]
        );
        assert!(Config::default().cors_origin_list().is_empty());
    }
}
