//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// The file extension is unknown or its format feature is disabled.
    #[error("unsupported config format '.{0}'")]
    UnsupportedFormat(String),

    /// The merged sources do not fit the schema.
    #[error("malformed configuration: {0}")]
    ParseError(String),

    /// A value is present but not acceptable.
    #[error("invalid configuration: {message}")]
    ValidationError { message: String },

    /// A value required by another setting is absent.
    #[error("configuration field '{field}' is required")]
    MissingField { field: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::ValidationError`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Shorthand for [`ConfigError::MissingField`].
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
