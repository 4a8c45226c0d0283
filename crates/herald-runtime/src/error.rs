//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while bootstrapping or using the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A dispatch call failed.
    #[error(transparent)]
    Mediator(#[from] herald_core::MediatorError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
