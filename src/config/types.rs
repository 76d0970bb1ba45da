//! Root `Config` struct.

use serde::{Deserialize, Serialize};

use super::defaults::default_port;
use super::logging::LoggingConfig;
use super::server::{ServerConfig, TimersConfig};

/// Complete server configuration, loadable from `config.json`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            timers: TimersConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
