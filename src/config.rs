//! Configuration module
//!
//! Handles loading and parsing of relay and client configuration from TOML
//! files and environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name used in logs
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Interface to bind
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// WebSocket port
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Frames buffered per connection before sends to it are skipped
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

/// Headless client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Relay WebSocket URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Frame loop rate in Hz
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: u32,

    /// How long the bot stays connected, in seconds (0 = until Ctrl+C)
    #[serde(default)]
    pub run_duration_secs: u64,
}

// Default value functions
fn default_server_name() -> String {
    "Avatar Sync".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_websocket_port() -> u16 {
    8080
}

fn default_outbound_queue_capacity() -> usize {
    256
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:8080".to_string()
}

fn default_frame_rate() -> u32 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_host: default_bind_host(),
            websocket_port: default_websocket_port(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/client.toml"),
            endpoint: default_endpoint(),
            frame_rate_hz: default_frame_rate(),
            run_duration_secs: 0,
        }
    }
}

/// Read a TOML file, or fall back to defaults if it does not exist
async fn load_file<T: DeserializeOwned + Default>(config_path: &Path) -> Result<T> {
    if config_path.exists() {
        let content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    } else {
        tracing::warn!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
        Ok(T::default())
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        let config_path = env::var("AVATAR_SYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config: Self = load_file(&config_path).await?;
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("AVATAR_SYNC_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("AVATAR_SYNC_BIND_HOST") {
            self.bind_host = val;
        }
        if let Ok(val) = env::var("AVATAR_SYNC_WEBSOCKET_PORT") {
            if let Ok(port) = val.parse() {
                self.websocket_port = port;
            }
        }
        if let Ok(val) = env::var("AVATAR_SYNC_OUTBOUND_QUEUE") {
            if let Ok(capacity) = val.parse() {
                self.outbound_queue_capacity = capacity;
            }
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.outbound_queue_capacity == 0 {
            anyhow::bail!("Outbound queue capacity must be at least 1");
        }
        self.bind_addr()?;
        Ok(())
    }

    /// Socket address the relay listens on
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_host, self.websocket_port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind_host))
    }
}

impl ClientConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        let config_path = env::var("AVATAR_SYNC_CLIENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/client.toml"));

        let mut config: Self = load_file(&config_path).await?;
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("AVATAR_SYNC_ENDPOINT") {
            self.endpoint = val;
        }
        if let Ok(val) = env::var("AVATAR_SYNC_FRAME_RATE") {
            if let Ok(rate) = val.parse() {
                self.frame_rate_hz = rate;
            }
        }
        if let Ok(val) = env::var("AVATAR_SYNC_RUN_SECS") {
            if let Ok(secs) = val.parse() {
                self.run_duration_secs = secs;
            }
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            anyhow::bail!("Endpoint must be a ws:// or wss:// URL");
        }
        if self.frame_rate_hz == 0 || self.frame_rate_hz > 240 {
            anyhow::bail!("Frame rate must be between 1 and 240 Hz");
        }
        Ok(())
    }

    /// Fixed frame step in seconds
    pub fn frame_step(&self) -> f32 {
        1.0 / self.frame_rate_hz as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "Avatar Sync");
        assert_eq!(config.websocket_port, 8080);
        assert_eq!(config.outbound_queue_capacity, 256);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_server_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.outbound_queue_capacity = 0;
        assert!(config.validate().is_err());
        config.outbound_queue_capacity = 16;

        config.bind_host = "not an address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ServerConfig = toml::from_str("websocket_port = 9000\n").unwrap();
        assert_eq!(config.websocket_port, 9000);
        assert_eq!(config.bind_host, "0.0.0.0");
    }

    #[test]
    fn test_legacy_debug_key_ignored() {
        // Verbosity comes from RUST_LOG; old files with a debug key still load
        let config: ServerConfig = toml::from_str("debug = true\nwebsocket_port = 9001\n").unwrap();
        assert_eq!(config.websocket_port, 9001);
        assert!(toml::to_string(&config).unwrap().find("debug").is_none());
    }

    #[test]
    fn test_client_validation() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.frame_step() - 1.0 / 60.0).abs() < f32::EPSILON);

        config.endpoint = "http://localhost:8080".to_string();
        assert!(config.validate().is_err());
        config.endpoint = default_endpoint();

        config.frame_rate_hz = 0;
        assert!(config.validate().is_err());
    }
}
