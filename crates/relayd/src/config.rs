//! Daemon configuration.
//!
//! Values are layered, highest priority first:
//!
//! 1. command-line flags
//! 2. `RELAY_HOST` / `RELAY_PORT` / `RELAY_CONFIG` environment variables
//! 3. TOML config file (`--config` or `RELAY_CONFIG`)
//! 4. built-in defaults
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 29999
//! max_line_length = 65536
//! max_clients = 256
//! outbound_queue = 128
//! idle_interval_secs = 5
//! active_interval_secs = 100
//! write_timeout_secs = 10
//! shutdown_grace_ms = 2000
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_protocol::{DEFAULT_MAX_LINE_LENGTH, DEFAULT_PORT};
use serde::Deserialize;
use thiserror::Error;

use crate::heartbeat::{HeartbeatConfig, DEFAULT_ACTIVE_INTERVAL, DEFAULT_IDLE_INTERVAL};
use crate::registry::MAX_CLIENTS;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default per-peer outbound queue length, in lines.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Default socket write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for an orderly shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(2000);

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Host or address to bind
    pub host: String,

    /// TCP port to bind (0 picks a free port)
    pub port: u16,

    /// Maximum inbound line length in bytes
    pub max_line_length: usize,

    /// Maximum concurrent clients
    pub max_clients: usize,

    /// Per-peer outbound queue length
    pub outbound_queue: usize,

    /// Heartbeat periods
    pub heartbeat: HeartbeatConfig,

    /// Per-write socket timeout
    pub write_timeout: Duration,

    /// Bound on orderly shutdown
    pub shutdown_grace: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_clients: MAX_CLIENTS,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            heartbeat: HeartbeatConfig {
                idle_interval: DEFAULT_IDLE_INTERVAL,
                active_interval: DEFAULT_ACTIVE_INTERVAL,
            },
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Settings given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config_path: Option<PathBuf>,
}

/// On-disk TOML layout. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_line_length: Option<usize>,
    pub max_clients: Option<usize>,
    pub outbound_queue: Option<usize>,
    pub idle_interval_secs: Option<u64>,
    pub active_interval_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

impl FileConfig {
    /// Reads and parses a TOML config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}

impl RelayConfig {
    /// Resolves the configuration from flags, the process environment and
    /// an optional config file.
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(overrides, |key| env::var(key).ok())
    }

    /// Same as [`RelayConfig::load`] with an injectable environment lookup.
    pub fn load_with_env<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| lookup("RELAY_CONFIG").map(PathBuf::from));

        let file = match config_path {
            Some(path) => FileConfig::from_path(&path)?,
            None => FileConfig::default(),
        };

        let mut config = Self::default().merge_file(file);

        if let Some(host) = lookup("RELAY_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("RELAY_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "RELAY_PORT",
                reason: format!("not a port number: {port:?}"),
            })?;
        }

        if let Some(host) = overrides.host {
            config.host = host;
        }
        if let Some(port) = overrides.port {
            config.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies file values over `self`.
    #[must_use]
    pub fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(v) = file.max_line_length {
            self.max_line_length = v;
        }
        if let Some(v) = file.max_clients {
            self.max_clients = v;
        }
        if let Some(v) = file.outbound_queue {
            self.outbound_queue = v;
        }
        if let Some(v) = file.idle_interval_secs {
            self.heartbeat.idle_interval = Duration::from_secs(v);
        }
        if let Some(v) = file.active_interval_secs {
            self.heartbeat.active_interval = Duration::from_secs(v);
        }
        if let Some(v) = file.write_timeout_secs {
            self.write_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.shutdown_grace_ms {
            self.shutdown_grace = Duration::from_millis(v);
        }
        self
    }

    /// Rejects values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 6] = [
            ("host", self.host.trim().is_empty()),
            ("max_line_length", self.max_line_length == 0),
            ("max_clients", self.max_clients == 0),
            ("outbound_queue", self.outbound_queue == 0),
            ("idle_interval_secs", self.heartbeat.idle_interval.is_zero()),
            ("active_interval_secs", self.heartbeat.active_interval.is_zero()),
        ];

        for (field, bad) in checks {
            if bad {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be non-empty and greater than zero".to_string(),
                });
            }
        }

        if self.write_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "write_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config file {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::load_with_env(ConfigOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:29999");
        assert_eq!(config.max_line_length, 1_048_576);
    }

    #[test]
    fn test_file_values_apply() {
        let file = write_config(
            r#"
            port = 4000
            max_line_length = 128
            idle_interval_secs = 1
            active_interval_secs = 30
            shutdown_grace_ms = 500
            "#,
        );

        let overrides = ConfigOverrides {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = RelayConfig::load_with_env(overrides, env_of(&[])).unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.max_line_length, 128);
        assert_eq!(config.heartbeat.idle_interval, Duration::from_secs(1));
        assert_eq!(config.heartbeat.active_interval, Duration::from_secs(30));
        assert_eq!(config.shutdown_grace, Duration::from_millis(500));
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn test_precedence_flag_over_env_over_file() {
        let file = write_config("host = \"file-host\"\nport = 1000\n");
        let env = env_of(&[
            ("RELAY_CONFIG", file.path().to_str().unwrap()),
            ("RELAY_HOST", "env-host"),
            ("RELAY_PORT", "2000"),
        ]);

        let overrides = ConfigOverrides {
            port: Some(3000),
            ..Default::default()
        };
        let config = RelayConfig::load_with_env(overrides, env).unwrap();

        assert_eq!(config.host, "env-host");
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_bad_env_port() {
        let err = RelayConfig::load_with_env(
            ConfigOverrides::default(),
            env_of(&[("RELAY_PORT", "lots")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "RELAY_PORT", .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write_config("colour = \"blue\"\n");
        let err = FileConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let overrides = ConfigOverrides {
            config_path: Some(PathBuf::from("/nonexistent/relay.toml")),
            ..Default::default()
        };
        let err = RelayConfig::load_with_env(overrides, env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/relay.toml"));
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = RelayConfig {
            outbound_queue: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "outbound_queue", .. })
        ));

        let mut config = RelayConfig::default();
        config.heartbeat.idle_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
