//! # Configuration Management
//!
//! Centralized configuration for the world server core.
//!
//! This module provides structured configuration for the server process:
//! listen address, session limits, the known-zone table, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::error::{Result, WorldError};

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WorldConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Known zones, keyed by zone id
    #[serde(default)]
    pub zones: Vec<ZoneEntry>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorldConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| WorldError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| WorldError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| WorldError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("WORLD_PROTOCOL_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(ttl) = std::env::var("WORLD_PROTOCOL_SESSION_TTL_SECS") {
            if let Ok(val) = ttl.parse::<u64>() {
                config.server.session_ttl_secs = val;
            }
        }

        if let Ok(max) = std::env::var("WORLD_PROTOCOL_MAX_SESSIONS") {
            if let Ok(val) = max.parse::<usize>() {
                config.server.max_sessions = val;
            }
        }

        if let Ok(level) = std::env::var("WORLD_PROTOCOL_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.server.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:2002')",
                self.server.address
            ));
        }

        if self.server.max_sessions == 0 {
            errors.push("Max sessions must be greater than 0".to_string());
        }

        if self.server.session_ttl_secs == 0 {
            errors.push("Session TTL must be greater than 0".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.zone_id) {
                errors.push(format!("Duplicate zone entry for zone {}", zone.zone_id));
            }
            if zone.resource.is_empty() {
                errors.push(format!("Zone {} has an empty resource path", zone.zone_id));
            }
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorldError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }

    /// Install the global tracing subscriber with this configuration's level,
    /// overridable through `RUST_LOG`.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.logging.level.clone()));

        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "0.0.0.0:2002")
    pub address: String,

    /// Idle duration after which a session expires, in seconds
    pub session_ttl_secs: u64,

    /// Maximum number of concurrent sessions
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0:2002"),
            session_ttl_secs: 24 * 60 * 60,
            max_sessions: 4096,
        }
    }
}

/// One known zone: its id and where the parser finds its definition data.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ZoneEntry {
    pub zone_id: u16,
    pub resource: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default tracing filter directive (e.g., "info" or "world_protocol=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn toml_round_trip() {
        let toml = r#"
            [server]
            address = "127.0.0.1:3000"
            session_ttl_secs = 300
            max_sessions = 16

            [[zones]]
            zone_id = 1000
            resource = "maps/nd_avant_gardens.luz"

            [logging]
            level = "debug"
        "#;

        let config = WorldConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.address, "127.0.0.1:3000");
        assert_eq!(config.server.max_sessions, 16);
        assert_eq!(config.zones.len(), 1);
        assert_eq!(config.zones[0].zone_id, 1000);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn bad_address_fails_validation() {
        let config = WorldConfig::default_with_overrides(|c| {
            c.server.address = String::from("not-an-address");
        });
        assert!(config.validate_strict().is_err());
    }

    #[test]
    fn duplicate_zones_fail_validation() {
        let config = WorldConfig::default_with_overrides(|c| {
            c.zones = vec![
                ZoneEntry {
                    zone_id: 1000,
                    resource: "a.luz".into(),
                },
                ZoneEntry {
                    zone_id: 1000,
                    resource: "b.luz".into(),
                },
            ];
        });
        assert!(!config.validate().is_empty());
    }
}
