//! Session configuration for sqlmeta.
//!
//! Configuration is read once from TOML and handed to `sqlmeta-core`, which
//! turns it into an immutable runtime `Settings` value. Nothing in this crate
//! is consulted again after that point.

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error as ThisError;

/// Collation used when a session does not name one.
pub const DEFAULT_COLLATION: &str = "SQL_Latin1_General_CP1_CI_AS";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid collation '{0}'")]
    InvalidCollation(String),
}

///
/// Config
///
/// Root of the TOML document. Every section is optional.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub session: SessionConfig,
    pub collections: CollectionsConfig,
    pub dependency: DependencyConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let collation = self.session.collation.trim();
        if collation.is_empty() || collation.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidCollation(
                self.session.collation.clone(),
            ));
        }

        Ok(())
    }
}

///
/// SessionConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Collation name driving identity comparison (`_CI_` / `_CS_` / `_BIN`).
    pub collation: String,

    /// Objects are built offline; collections never populate from the store.
    pub design_mode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            collation: DEFAULT_COLLATION.to_string(),
            design_mode: false,
        }
    }
}

///
/// CollectionsConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionsConfig {
    /// Object kind type names (`"Column"`, `"Job"`, ...) whose collections
    /// accept members with equal identities.
    pub accept_duplicate_names: Vec<String>,
}

///
/// DependencyConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencyConfig {
    /// Reject discovery roots that live on a different server.
    pub check_server_name: bool,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            check_server_name: true,
        }
    }
}
