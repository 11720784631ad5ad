//! Connection record configuration
//!
//! Loaded from a TOML file, then overridden by `AURA_CONNECTIONS_*`
//! environment variables.

use crate::{ConnectionError, ConnectionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "AURA_CONNECTIONS_";

/// Configuration for connection records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    /// Log every saved state at info level
    pub log_state: bool,

    /// Qualify outbound message types with `https://didcomm.org/` rather than
    /// the legacy `did:sov:` prefix
    pub emit_new_didcomm_prefix: bool,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            log_state: false,
            emit_new_didcomm_prefix: true,
        }
    }
}

impl ConnectionsConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn load_from_file(path: &Path) -> ConnectionResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConnectionError::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> ConnectionResult<Self> {
        toml::from_str(content).map_err(|e| ConnectionError::config(format!("Invalid TOML: {e}")))
    }

    /// Apply `AURA_CONNECTIONS_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> ConnectionResult<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs; names without the prefix
    /// are ignored, unknown names under the prefix are rejected
    pub fn merge_with_vars<I>(&mut self, vars: I) -> ConnectionResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key.to_ascii_lowercase().as_str() {
                "log_state" => self.log_state = parse_bool(&name, &value)?,
                "emit_new_didcomm_prefix" => {
                    self.emit_new_didcomm_prefix = parse_bool(&name, &value)?;
                }
                _ => {
                    return Err(ConnectionError::config(format!(
                        "Unknown configuration variable {name}"
                    )))
                }
            }
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> ConnectionResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConnectionError::config(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
