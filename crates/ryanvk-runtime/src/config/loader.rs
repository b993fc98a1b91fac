//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `ryanvk.toml`
//! - `yaml-config`: enables `ryanvk.yaml` / `ryanvk.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic values passed to [`ConfigLoader::merge`]
//! 3. Profile-specific config file (`ryanvk.{profile}.toml`)
//! 4. Main config file (`ryanvk.toml`)
//! 5. Environment variables (`RYANVK_*`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `RYANVK_` prefix with `__` as the nesting separator:
//!
//! - `RYANVK_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `RYANVK_LOGGING__FORMAT=pretty` → `logging.format = "pretty"`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./deploy/ryanvk.toml")
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
use super::schema::RyanvkConfig;

const ENV_PREFIX: &str = "RYANVK_";
const APP_NAME: &str = "ryanvk";

/// Extensions this build can read, in search order.
const EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `RYANVK_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("RYANVK_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a directory to search for `ryanvk.*` files.
    ///
    /// Without any search path the current directory and the user config
    /// directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges values on top of the built-in defaults.
    pub fn merge(mut self, config: RyanvkConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<RyanvkConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: RyanvkConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            protocols = config.protocols.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RyanvkConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_file(figment, &path)?;
        } else {
            let files = self.locate();
            if files.is_empty() {
                warn!("No configuration file found, using defaults");
            }
            for path in &files {
                info!(path = %path.display(), "Loading configuration file");
                figment = Self::merge_file(figment, path)?;
            }
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Merges one file, picking the provider by extension.
    fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            ext => Err(ConfigError::UnsupportedFormat(ext.to_owned())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(APP_NAME)))
            .collect()
    }

    /// Files to merge from the first search path holding any `ryanvk.*`
    /// file, lowest priority first: the profile variant, then the main file.
    fn locate(&self) -> Vec<PathBuf> {
        let profile = self.profile.as_str();
        for dir in self.resolve_search_paths() {
            for ext in EXTENSIONS {
                let files: Vec<PathBuf> = [
                    dir.join(format!("{APP_NAME}.{profile}.{ext}")),
                    dir.join(format!("{APP_NAME}.{ext}")),
                ]
                .into_iter()
                .filter(|path| path.is_file())
                .collect();
                if !files.is_empty() {
                    debug!(directory = %dir.display(), profile, "Found configuration files");
                    return files;
                }
            }
        }
        Vec::new()
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<RyanvkConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<RyanvkConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config, RyanvkConfig::default());
            assert_eq!(config.logging.level.as_str(), "info");
            Ok(())
        });
    }

    #[test]
    #[cfg(feature = "toml-config")]
    fn file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ryanvk.toml",
                r#"
                [logging]
                level = "debug"
                format = "pretty"

                [[protocols]]
                name = "qq"
                collectors = [{ namespace = "qq" }, { namespace = "qq", identify = "extra" }]
                "#,
            )?;
            jail.set_env("RYANVK_LOGGING__LEVEL", "warn");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert_eq!(config.protocols.len(), 1);
            assert_eq!(config.protocols[0].collectors[1].to_string(), "qq/extra");
            Ok(())
        });
    }

    #[test]
    #[cfg(feature = "toml-config")]
    fn profile_file_is_layered_under_main_file() {
        Jail::expect_with(|jail| {
            jail.create_file("ryanvk.production.toml", "[logging]\nthread_ids = true\n")?;
            jail.create_file("ryanvk.toml", "[logging]\nlevel = \"error\"\n")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert!(config.logging.thread_ids);
            assert_eq!(config.logging.level, LogLevel::Error);
            Ok(())
        });
    }

    #[test]
    #[cfg(feature = "toml-config")]
    fn first_search_path_with_files_wins() {
        Jail::expect_with(|jail| {
            let first = jail.directory().join("first");
            let second = jail.directory().join("second");
            std::fs::create_dir(&first).map_err(|e| e.to_string())?;
            std::fs::create_dir(&second).map_err(|e| e.to_string())?;
            std::fs::write(first.join("ryanvk.staging.toml"), "[logging]\nlevel = \"debug\"\n")
                .map_err(|e| e.to_string())?;
            std::fs::write(second.join("ryanvk.toml"), "[logging]\nlevel = \"error\"\n")
                .map_err(|e| e.to_string())?;

            let config = ConfigLoader::new()
                .profile("staging")
                .search_path(&first)
                .search_path(&second)
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/ryanvk.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("ryanvk.ini", "level = debug")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("ryanvk.ini"))
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
            Ok(())
        });
    }

    #[test]
    fn profile_names_are_normalised() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }
}
