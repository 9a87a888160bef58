//! Server configuration: a TOML file layered under command-line overrides.
//!
//! ```toml
//! [admin]
//! host = "127.0.0.1"
//! port = 11103
//!
//! [logging]
//! verbosity = 1
//! filter = "docsync=debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
pub const DEFAULT_ADMIN_PORT: i64 = 11103;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("admin port must be between 1 and 65535, given {given}")]
    InvalidAdminPort { given: i64 },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub host: String,
    /// Kept wide so out-of-range values survive parsing and fail validation.
    pub port: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ADMIN_HOST.to_string(),
            port: DEFAULT_ADMIN_PORT,
        }
    }
}

impl AdminConfig {
    /// The port as a socket port, if it is in `1..=65535`.
    pub fn validate(&self) -> Result<u16, ConfigError> {
        match u16::try_from(self.port) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::InvalidAdminPort { given: self.port }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 0 = errors, 1 = info, 2+ = debug. Ignored when `filter` is set.
    pub verbosity: u8,
    /// An `EnvFilter` directive string.
    pub filter: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults when `path` is `None`, the file's contents otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Config::default()),
        }
    }

    /// Checked once at startup, before anything listens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.admin.validate().map(drop)
    }
}
