// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of AgentSpaces.
//
// AgentSpaces is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// AgentSpaces is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with AgentSpaces. If not, see <https://www.gnu.org/licenses/>.

//! Agent configuration
//!
//! ## Configuration Hierarchy
//! 1. **CODE**: explicit [`AgentConfig`] in application code (highest priority)
//! 2. **ENV**: environment variables (`AGENTSPACES_SPACE_NAME`, etc.)
//! 3. **FILE**: TOML configuration file
//! 4. **DEFAULT**: [`AgentConfig::default`] (lowest priority)
//!
//! ## Examples
//!
//! ### From Code
//! ```rust
//! use agentspaces_agent::AgentConfig;
//!
//! let config = AgentConfig {
//!     space_name: "orders".to_string(),
//!     lazy_initialization: false,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! ### From Environment Variables
//! ```bash
//! export AGENTSPACES_SPACE_NAME=orders
//! export AGENTSPACES_OBSERVER_EXPIRATION_SECS=300
//! ```
//!
//! ### From Config File
//! ```toml
//! space_name = "orders"
//! load_space_contents_upon_startup = true
//! notification_timeout_ms = 500
//! ```

use agentspaces_tuplespace::TupleSpaceError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Space name environment variable
pub const ENV_SPACE_NAME: &str = "AGENTSPACES_SPACE_NAME";
/// Snapshot-on-startup environment variable
pub const ENV_LOAD_ON_STARTUP: &str = "AGENTSPACES_LOAD_ON_STARTUP";
/// Lazy initialization environment variable
pub const ENV_LAZY_INIT: &str = "AGENTSPACES_LAZY_INIT";
/// Observer expiration environment variable (seconds)
pub const ENV_OBSERVER_EXPIRATION_SECS: &str = "AGENTSPACES_OBSERVER_EXPIRATION_SECS";
/// Notification timeout environment variable (milliseconds)
pub const ENV_NOTIFICATION_TIMEOUT_MS: &str = "AGENTSPACES_NOTIFICATION_TIMEOUT_MS";
/// Evaluation queue capacity environment variable
pub const ENV_EVALUATION_CAPACITY: &str = "AGENTSPACES_EVALUATION_CAPACITY";

/// Coordination agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Logical space the agent joins
    pub space_name: String,

    /// Pull the store's contents into the local cache during initialization
    pub load_space_contents_upon_startup: bool,

    /// Initialize on first use instead of requiring `initialize()`
    pub lazy_initialization: bool,

    /// Evict observers not refreshed for this long (0 = never)
    pub observer_expiration_secs: u64,

    /// Cancel notifications running longer than this (0 = no limit)
    pub notification_timeout_ms: u64,

    /// Evaluation queue capacity (0 = unbounded)
    pub evaluation_queue_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            space_name: "default".to_string(),
            load_space_contents_upon_startup: true,
            lazy_initialization: true,
            observer_expiration_secs: 0,
            notification_timeout_ms: 0,
            evaluation_queue_capacity: 0,
        }
    }
}

impl AgentConfig {
    /// Configuration for a named space with every other setting defaulted
    pub fn for_space(space_name: impl Into<String>) -> Self {
        AgentConfig {
            space_name: space_name.into(),
            ..Default::default()
        }
    }

    /// Load from environment variables (ENV)
    ///
    /// Unset variables keep their default; set but malformed variables fail.
    ///
    /// ## Errors
    /// - `InvalidConfiguration` for unparsable values or an invalid result
    pub fn from_env() -> Result<Self, TupleSpaceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source using the environment variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TupleSpaceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AgentConfig::default();

        if let Some(name) = lookup(ENV_SPACE_NAME) {
            config.space_name = name;
        }
        if let Some(value) = lookup(ENV_LOAD_ON_STARTUP) {
            config.load_space_contents_upon_startup = parse_bool(ENV_LOAD_ON_STARTUP, &value)?;
        }
        if let Some(value) = lookup(ENV_LAZY_INIT) {
            config.lazy_initialization = parse_bool(ENV_LAZY_INIT, &value)?;
        }
        if let Some(value) = lookup(ENV_OBSERVER_EXPIRATION_SECS) {
            config.observer_expiration_secs = parse_number(ENV_OBSERVER_EXPIRATION_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_NOTIFICATION_TIMEOUT_MS) {
            config.notification_timeout_ms = parse_number(ENV_NOTIFICATION_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_EVALUATION_CAPACITY) {
            config.evaluation_queue_capacity = parse_number(ENV_EVALUATION_CAPACITY, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file (FILE); missing keys keep their default
    ///
    /// ## Errors
    /// - `IoError` if the file cannot be read
    /// - `SerializationError` if it is not valid TOML for this structure
    /// - `InvalidConfiguration` if the result fails validation
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TupleSpaceError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        tracing::debug!(path = %path.display(), space = %config.space_name, "loaded agent config");
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(contents: &str) -> Result<Self, TupleSpaceError> {
        let config: AgentConfig = toml::from_str(contents)
            .map_err(|e| TupleSpaceError::SerializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Environment if any variable is set, otherwise defaults (DEFAULT)
    pub fn from_env_or_default() -> Result<Self, TupleSpaceError> {
        let any_set = [
            ENV_SPACE_NAME,
            ENV_LOAD_ON_STARTUP,
            ENV_LAZY_INIT,
            ENV_OBSERVER_EXPIRATION_SECS,
            ENV_NOTIFICATION_TIMEOUT_MS,
            ENV_EVALUATION_CAPACITY,
        ]
        .iter()
        .any(|key| std::env::var(key).is_ok());

        if any_set {
            Self::from_env()
        } else {
            Ok(AgentConfig::default())
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), TupleSpaceError> {
        if self.space_name.trim().is_empty() {
            return Err(TupleSpaceError::InvalidConfiguration(
                "space_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Observer expiration window, if any
    pub fn observer_expiration(&self) -> Option<chrono::Duration> {
        (self.observer_expiration_secs > 0)
            .then(|| chrono::Duration::seconds(self.observer_expiration_secs.min(i32::MAX as u64) as i64))
    }

    /// Notification timeout, if any
    pub fn notification_timeout(&self) -> Option<Duration> {
        (self.notification_timeout_ms > 0).then(|| Duration::from_millis(self.notification_timeout_ms))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, TupleSpaceError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(TupleSpaceError::InvalidConfiguration(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<N: FromStr>(key: &str, value: &str) -> Result<N, TupleSpaceError> {
    value.trim().parse::<N>().map_err(|_| {
        TupleSpaceError::InvalidConfiguration(format!(
            "{} must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.space_name, "default");
        assert!(config.load_space_contents_upon_startup);
        assert!(config.lazy_initialization);
        assert_eq!(config.observer_expiration(), None);
        assert_eq!(config.notification_timeout(), None);
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[
            (ENV_SPACE_NAME, "orders"),
            (ENV_LAZY_INIT, "false"),
            (ENV_OBSERVER_EXPIRATION_SECS, "30"),
            (ENV_NOTIFICATION_TIMEOUT_MS, "250"),
            (ENV_EVALUATION_CAPACITY, "16"),
        ]))
        .unwrap();

        assert_eq!(config.space_name, "orders");
        assert!(!config.lazy_initialization);
        assert!(config.load_space_contents_upon_startup);
        assert_eq!(config.observer_expiration(), Some(chrono::Duration::seconds(30)));
        assert_eq!(config.notification_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.evaluation_queue_capacity, 16);
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let err = AgentConfig::from_lookup(lookup(&[(ENV_LOAD_ON_STARTUP, "maybe")])).unwrap_err();
        assert!(matches!(err, TupleSpaceError::InvalidConfiguration(_)));

        let err = AgentConfig::from_lookup(lookup(&[(ENV_EVALUATION_CAPACITY, "-1")])).unwrap_err();
        assert!(matches!(err, TupleSpaceError::InvalidConfiguration(_)));

        let err = AgentConfig::from_lookup(lookup(&[(ENV_SPACE_NAME, "  ")])).unwrap_err();
        assert!(matches!(err, TupleSpaceError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "space_name = \"jobs\"\nload_space_contents_upon_startup = false\nnotification_timeout_ms = 500"
        )
        .unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.space_name, "jobs");
        assert!(!config.load_space_contents_upon_startup);
        assert!(config.lazy_initialization);
        assert_eq!(config.notification_timeout_ms, 500);
    }

    #[test]
    fn test_from_file_errors() {
        let err = AgentConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, TupleSpaceError::IoError(_)));

        let err = AgentConfig::from_toml("space_name = 42").unwrap_err();
        assert!(matches!(err, TupleSpaceError::SerializationError(_)));
    }
}
