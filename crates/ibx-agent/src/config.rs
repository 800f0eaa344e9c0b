//! Application configuration.
//!
//! Loaded from a TOML file, with `IBX_HOST`, `IBX_PORT`, and
//! `IBX_CLIENT_ID` environment overrides applied afterwards so a
//! deployment can repoint the gateway without editing the file.

use crate::error::{AppError, AppResult};
use ibx_gateway::LinkConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Gateway endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client id presented in the handshake. Must be unique per
    /// connected client; the gateway refuses duplicates.
    #[serde(default = "default_client_id")]
    pub client_id: u32,
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7497
}

fn default_client_id() -> u32 {
    1
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60000
}

fn default_heartbeat_interval_ms() -> u64 {
    30000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10000
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl GatewaySettings {
    /// WebSocket URL for the gateway endpoint.
    pub fn url(&self) -> String {
        format!("ws://{}:{}/ws", self.host, self.port)
    }
}

/// Session-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Reply deadline for correlated requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10000
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Confirmation gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmSettings {
    /// How long a proposed trade stays confirmable.
    #[serde(default = "default_confirm_deadline_ms")]
    pub deadline_ms: u64,
    /// Expiry sweeper cadence.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_confirm_deadline_ms() -> u64 {
    60000
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

impl Default for ConfirmSettings {
    fn default() -> Self {
        Self {
            deadline_ms: default_confirm_deadline_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Order tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// How long to wait for a terminal state after submission before
    /// reporting a timeout (the order keeps being tracked).
    #[serde(default = "default_await_terminal_timeout_ms")]
    pub await_terminal_timeout_ms: u64,
}

fn default_await_terminal_timeout_ms() -> u64 {
    30000
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            await_terminal_timeout_ms: default_await_terminal_timeout_ms(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub confirm: ConfirmSettings,
    #[serde(default)]
    pub orders: OrderSettings,
}

impl AppConfig {
    /// Load from a file if it exists, fall back to defaults, then
    /// apply environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(%path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    fn apply_env_overrides(&mut self) -> AppResult<()> {
        if let Ok(host) = std::env::var("IBX_HOST") {
            self.gateway.host = host;
        }
        if let Ok(port) = std::env::var("IBX_PORT") {
            self.gateway.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid IBX_PORT: {port}")))?;
        }
        if let Ok(client_id) = std::env::var("IBX_CLIENT_ID") {
            self.gateway.client_id = client_id
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid IBX_CLIENT_ID: {client_id}")))?;
        }
        Ok(())
    }

    /// Link configuration for the gateway connection.
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            url: self.gateway.url(),
            client_id: self.gateway.client_id,
            max_reconnect_attempts: self.gateway.max_reconnect_attempts,
            reconnect_base_delay_ms: self.gateway.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.gateway.reconnect_max_delay_ms,
            heartbeat_interval_ms: self.gateway.heartbeat_interval_ms,
            heartbeat_timeout_ms: self.gateway.heartbeat_timeout_ms,
            handshake_timeout_ms: self.gateway.handshake_timeout_ms,
        }
    }
}
