//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::bytesize::ByteSizeError;

/// Configuration error type.
///
/// Every variant is raised while loading or resolving configuration, before
/// the build touches anything privileged.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A top-level key that is not a table.
    #[error("'{key}' in '{path}' is not a section (expected [{key}])")]
    NotASection { path: PathBuf, key: String },

    /// Arrays have no string form.
    #[error("[{section}] {key} in '{path}' must be a string, number or boolean")]
    UnsupportedValue {
        path: PathBuf,
        section: String,
        key: String,
    },

    /// Section does not exist.
    #[error("no section named [{0}]")]
    NoSuchSection(String),

    /// Bad `%(name)s` reference.
    #[error("[{section}] {key}: {message}")]
    Interpolation {
        section: String,
        key: String,
        message: String,
    },

    /// Value present but unusable.
    #[error("[{section}] {key} = '{value}': {message}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        message: String,
    },

    /// Value is not a byte size.
    #[error("[{section}] {key}: {source}")]
    InvalidSize {
        section: String,
        key: String,
        #[source]
        source: ByteSizeError,
    },
}

impl ConfigError {
    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse TOML error.
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// Creates an interpolation error.
    pub fn interpolation(
        section: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Interpolation {
            section: section.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section: section.into(),
            key: key.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}
