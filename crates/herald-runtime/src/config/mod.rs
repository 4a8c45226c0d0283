//! Configuration for the Herald runtime.
//!
//! Layered loading through `figment` (see [`loader`]), a serde schema
//! ([`schema`]) and post-load validation ([`validation`]).

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    HeraldConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, MediatorConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
