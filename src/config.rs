//! Process configuration
//!
//! Loaded from a YAML file whose keys match the relay's historical config
//! format (`HTTPPort`, `LogLevel`, ...). Missing or zero values fall back to
//! defaults; an unknown log level is rejected.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::RelayError;
use crate::transporter::TransporterSettings;

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_TCP_PORT: u16 = 6000;
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "HTTPAddress")]
    pub http_address: String,
    #[serde(rename = "HTTPPort")]
    pub http_port: u16,
    #[serde(rename = "LogDirectory")]
    pub log_directory: String,
    #[serde(rename = "LogJSON")]
    pub log_json: bool,
    #[serde(rename = "LogLevel")]
    pub log_level: String,
    #[serde(rename = "TCPAddress")]
    pub tcp_address: String,
    #[serde(rename = "TCPPort")]
    pub tcp_port: u16,
    #[serde(rename = "WriteTimeoutSecs")]
    pub write_timeout_secs: u64,
    #[serde(rename = "MaxLineLength")]
    pub max_line_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_address: String::new(),
            http_port: DEFAULT_HTTP_PORT,
            log_directory: DEFAULT_LOG_DIRECTORY.to_string(),
            log_json: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            tcp_address: String::new(),
            tcp_port: DEFAULT_TCP_PORT,
            write_timeout_secs: 10,
            max_line_length: 4096,
        }
    }
}

impl Config {
    /// Read and validate a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml(&source)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(source: &str) -> Result<Self, RelayError> {
        let config: Config = serde_yml::from_str(source)?;
        config.normalized()
    }

    /// Apply defaults for blank or zero values and validate the log level
    pub fn normalized(mut self) -> Result<Self, RelayError> {
        let defaults = Config::default();

        if self.log_directory.is_empty() {
            self.log_directory = defaults.log_directory;
        }
        if self.log_level.is_empty() {
            self.log_level = defaults.log_level;
        } else if tracing::Level::from_str(&self.log_level).is_err() {
            return Err(RelayError::InvalidLogLevel(self.log_level));
        }
        if self.http_port == 0 {
            self.http_port = defaults.http_port;
        }
        if self.tcp_port == 0 {
            self.tcp_port = defaults.tcp_port;
        }
        if self.write_timeout_secs == 0 {
            self.write_timeout_secs = defaults.write_timeout_secs;
        }
        if self.max_line_length == 0 {
            self.max_line_length = defaults.max_line_length;
        }

        Ok(self)
    }

    /// `host:port` for the TCP listener; an empty address binds all interfaces
    pub fn tcp_bind_address(&self) -> String {
        bind_address(&self.tcp_address, self.tcp_port)
    }

    /// `host:port` for the HTTP listener; an empty address binds all interfaces
    pub fn http_bind_address(&self) -> String {
        bind_address(&self.http_address, self.http_port)
    }

    pub fn transporter_settings(&self) -> TransporterSettings {
        TransporterSettings {
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            max_line_length: self.max_line_length,
        }
    }
}

fn bind_address(host: &str, port: u16) -> String {
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    format!("{host}:{port}")
}
