//! Configuration system.
//!
//! Loads client configuration from JSON strings or files.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

/// Errors raised while loading a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Client-side session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Server host name or IP address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on the TCP handshake.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How often the consumer loop drains the inbound queue.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Nickname announced after connecting. A random one is picked when unset.
    #[serde(default)]
    pub nickname: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_tick_hz() -> u32 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            tick_hz: default_tick_hz(),
            nickname: None,
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Interval between two queue drains. A zero rate falls back to 60 Hz.
    pub fn tick_interval(&self) -> Duration {
        let hz = if self.tick_hz == 0 { 60 } else { self.tick_hz };
        Duration::from_secs_f64(1.0 / f64::from(hz))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = ClientConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ClientConfig::default());
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn partial_override() {
        let cfg =
            ClientConfig::from_json_str(r#"{"host":"10.0.0.2","nickname":"kim"}"#).unwrap();
        assert_eq!(cfg.host, "10.0.0.2");
        assert_eq!(cfg.nickname.as_deref(), Some("kim"));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn zero_tick_rate_falls_back() {
        let cfg = ClientConfig {
            tick_hz: 0,
            ..ClientConfig::default()
        };
        assert_eq!(cfg.tick_interval(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9000, "tick_hz": 20}}"#).unwrap();
        let cfg = ClientConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.tick_hz, 20);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
