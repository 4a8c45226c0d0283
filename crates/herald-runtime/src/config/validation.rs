//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{HeraldConfig, LogFormat, LogOutput, LoggingConfig, MediatorConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_mediator_config(&config.mediator)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_mediator_config(config: &MediatorConfig) -> ConfigResult<()> {
    if config.source.trim().is_empty() {
        return Err(ConfigError::missing_field("mediator.source"));
    }
    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> ConfigResult<()> {
    if config.output == LogOutput::File && config.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(path) = &config.file_path
        && path.file_name().is_none()
    {
        return Err(ConfigError::validation(format!(
            "Log file path has no file name: {}",
            path.display()
        )));
    }

    if cfg!(not(feature = "json-log")) && config.format == LogFormat::Json {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    if let Some(target) = config.filters.keys().find(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter target cannot be empty: {target:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&HeraldConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_source() {
        let mut config = HeraldConfig::default();
        config.mediator.source = "  ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "mediator.source"
        ));
    }

    #[test]
    fn test_validate_file_output_without_path() {
        let mut config = HeraldConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some(PathBuf::from("logs/herald.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_filter_target() {
        let mut config = HeraldConfig::default();
        config.logging.filters.insert(String::new(), LogLevel::Debug);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
