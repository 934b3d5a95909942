//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`MULTISTREAM_*`)
//! - CLI arguments (for the `multistream` binary)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{HostConfig, MAX_MESSAGE_LEN};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Host (responder) options
    #[serde(default)]
    pub host: HostConfig,

    /// Message framing limits
    #[serde(default)]
    pub framing: FramingConfig,

    /// TCP listener options
    #[serde(default)]
    pub transport: TcpConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {path:?}: {e}")))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Default per-user config file location, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("multistream").join("config.toml"))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Override fields from `MULTISTREAM_*` environment variables.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(debug) = var("MULTISTREAM_DEBUG") {
            self.host.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(val) = var("MULTISTREAM_MAX_MESSAGE_LEN") {
            if let Ok(val) = val.parse() {
                self.framing.max_message_len = val;
            }
        }
        if let Some(host) = var("MULTISTREAM_HOST") {
            self.transport.host = host;
        }
        if let Some(port) = var("MULTISTREAM_PORT") {
            if let Ok(port) = port.parse() {
                self.transport.port = port;
            }
        }
        if let Some(secs) = var("MULTISTREAM_NEGOTIATION_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.transport.negotiation_timeout_secs = secs;
            }
        }

        self
    }
}

/// Framing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Largest message payload accepted or sent, in bytes
    pub max_message_len: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_message_len: MAX_MESSAGE_LEN,
        }
    }
}

/// TCP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Deadline for one whole negotiation, in seconds (0 = none)
    pub negotiation_timeout_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4001,
            negotiation_timeout_secs: 10,
        }
    }
}

impl TcpConfig {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Negotiation deadline, `None` when disabled.
    pub fn negotiation_timeout(&self) -> Option<Duration> {
        (self.negotiation_timeout_secs > 0)
            .then(|| Duration::from_secs(self.negotiation_timeout_secs))
    }
}
