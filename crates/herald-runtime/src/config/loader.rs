//! Layered configuration loading.
//!
//! Sources, each overriding the ones before it:
//!
//! 1. [`HeraldConfig::default`]
//! 2. values passed to [`ConfigLoader::merge`]
//! 3. `herald.{profile}.{ext}` next to the main file
//! 4. `herald.{ext}`, or the single file given to [`ConfigLoader::file`]
//! 5. `HERALD_*` environment variables, `__` separating nested keys
//!
//! `{ext}` is `toml` with the default `toml-config` feature, and `yaml` or
//! `yml` with `yaml-config`.
//!
//! ```text
//! HERALD_LOGGING__LEVEL=debug                      logging.level
//! HERALD_MEDIATOR__DEFAULT_STRATEGY=concurrent-wait mediator.default_strategy
//! ```
//!
//! ```rust,ignore
//! use herald_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("prod")
//!     .search_path("/etc/orders")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HeraldConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "HERALD_";
const PROFILE_VAR: &str = "HERALD_PROFILE";
const FILE_STEM: &str = "herald";

/// File extensions searched for, in order, among the compiled-in formats.
const EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

/// Selects the `herald.{profile}.*` overlay file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// The name used in overlay file names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Case-insensitive; `prod` and `dev` are accepted as aliases.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `HERALD_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder over a [`Figment`] that knows where Herald looks for its files.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    explicit_file: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            explicit_file: None,
            use_env: true,
        }
    }
}

impl ConfigLoader {
    /// Creates a loader for the profile named by `HERALD_PROFILE`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the overlay profile, overriding `HERALD_PROFILE`.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search.
    ///
    /// With none given, the working directory and `<config dir>/herald`
    /// (`~/.config/herald` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ignores `HERALD_*` variables.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Layers `config` just above the built-in defaults.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<HeraldConfig> {
        let profile = self.profile.clone();
        let config: HeraldConfig = self.into_figment()?.extract()?;
        validate_config(&config)?;

        debug!(
            %profile,
            source = %config.mediator.source,
            default_strategy = %config.mediator.default_strategy,
            level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn into_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(HeraldConfig::default()))
            .merge(self.overrides.clone());

        figment = match &self.explicit_file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                merge_file(figment, path)?
            }
            None => self.discover_files(figment)?,
        };

        if self.use_env {
            trace!(prefix = ENV_PREFIX, "Applying environment overrides");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(FILE_STEM)))
            .collect()
    }

    /// Merges the profile overlay and main file from the first directory and
    /// extension that has either. The main file is merged last.
    fn discover_files(&self, mut figment: Figment) -> ConfigResult<Figment> {
        let dirs = self.search_dirs();

        for dir in &dirs {
            for ext in EXTENSIONS {
                let overlay = dir.join(format!("{FILE_STEM}.{}.{ext}", self.profile));
                let main = dir.join(format!("{FILE_STEM}.{ext}"));
                if !overlay.exists() && !main.exists() {
                    continue;
                }
                for path in [overlay, main].iter().filter(|path| path.exists()) {
                    info!(path = %path.display(), "Loading configuration file");
                    figment = merge_file(figment, path)?;
                }
                return Ok(figment);
            }
        }

        warn!(paths = ?dirs, "No configuration file found, using defaults");
        Ok(figment)
    }
}

/// Merges one file, picking the provider from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<HeraldConfig> {
    ConfigLoader::new().load()
}

/// Loads one file plus environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<HeraldConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;
    use herald_core::PublishStrategy;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config, HeraldConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("HERALD_PROFILE", "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("HERALD_MEDIATOR__SOURCE", "orders");
            jail.set_env("HERALD_MEDIATOR__DEFAULT_STRATEGY", "concurrent-wait");
            jail.set_env("HERALD_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.mediator.source, "orders");
            assert_eq!(
                config.mediator.default_strategy,
                PublishStrategy::ConcurrentWait
            );
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/herald.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_merge_is_applied() {
        Jail::expect_with(|jail| {
            let mut overrides = HeraldConfig::default();
            overrides.mediator.source = "merged".to_string();

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .merge(overrides)
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.mediator.source, "merged");
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_and_profile() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "herald.toml",
                r#"
                    [mediator]
                    source = "base"

                    [logging]
                    level = "warn"
                "#,
            )?;
            jail.create_file(
                "herald.production.toml",
                r#"
                    [mediator]
                    source = "production"
                    default_strategy = "sequential-stop"
                "#,
            )?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            // The base file is merged last.
            assert_eq!(config.mediator.source, "base");
            assert_eq!(
                config.mediator.default_strategy,
                PublishStrategy::SequentialStop
            );
            assert_eq!(config.logging.level, LogLevel::Warn);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_file_fails_validation() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "herald.toml",
                r#"
                    [logging]
                    output = "file"
                "#,
            )?;

            let result = ConfigLoader::new()
                .file(jail.directory().join("herald.toml"))
                .without_env()
                .load();

            assert!(matches!(result, Err(ConfigError::MissingField { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("herald.ini", "source = x")?;
            let result = ConfigLoader::new()
                .file(jail.directory().join("herald.ini"))
                .without_env()
                .load();
            assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"));
            Ok(())
        });
    }
}
