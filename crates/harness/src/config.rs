//! Harness configuration.
//!
//! Values come from an optional `conformance.toml` next to the feature files,
//! every field falls back to its default when absent.

use derive_more::From;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up by the command line.
pub const CONFIG_FILE_NAME: &str = "conformance.toml";

#[derive(Debug, From)]
pub enum ConfigError {
    #[from(ignore)]
    IOError(std::io::Error),

    #[from(ignore)]
    DeserializationFailed(toml::de::Error),

    #[from(ignore)]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::DeserializationFailed(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IOError(err) => write!(f, "Failed to read configuration: {err}"),
            Self::DeserializationFailed(err) => write!(f, "Invalid configuration: {err}"),
            Self::InvalidValue(msg) => write!(f, "Invalid configuration value: {msg}"),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration shared by every scenario of a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory fixture names are resolved against.
    pub fixtures_dir: PathBuf,
    /// Size of each read from a fixture while streaming a multipart body.
    pub chunk_size: usize,
    /// Number of random letters generated for the oversized path.
    pub oversized_path_length: usize,
    /// Location value that triggers oversized path generation.
    pub oversized_path_token: String,
    /// Form field name used by chunked uploads.
    pub upload_field: String,
    /// Maximum tracing level installed by the command line.
    pub log_level: String,
    /// Optional file the command line appends its trace to.
    pub log_file: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fixtures_dir: PathBuf::from("fixtures"),
            chunk_size: 1024,
            oversized_path_length: 2048,
            oversized_path_token: String::from("LONG_PATH"),
            upload_field: String::from("file"),
            log_level: String::from("debug"),
            log_file: None,
        }
    }
}

impl HarnessConfig {
    /// Reads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid TOML, or carries a
    /// zero `chunk_size`.
    pub fn from_path<V: Into<PathBuf>>(target: V) -> ConfigResult<Self> {
        let target_path = target.into();
        let config_content = std::fs::read_to_string(&target_path)?;
        let mut config: Self = toml::from_str(&config_content)?;

        // relative fixture directories are relative to the config file
        if config.fixtures_dir.is_relative() {
            if let Some(parent) = target_path.parent() {
                config.fixtures_dir = parent.join(&config.fixtures_dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads `conformance.toml` from `dir` when present, defaults otherwise.
    ///
    /// With no file the fixtures directory is `dir/fixtures`.
    ///
    /// # Errors
    ///
    /// Same as [`HarnessConfig::from_path`] when the file exists.
    pub fn discover(dir: &Path) -> ConfigResult<Self> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Self::from_path(candidate);
        }
        Ok(Self::default().fixtures_dir(dir.join("fixtures")))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "chunk_size must be greater than zero",
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    #[must_use]
    pub fn oversized_path_length(mut self, length: usize) -> Self {
        self.oversized_path_length = length;
        self
    }

    #[must_use]
    pub fn upload_field(mut self, field: impl Into<String>) -> Self {
        self.upload_field = field.into();
        self
    }
}
