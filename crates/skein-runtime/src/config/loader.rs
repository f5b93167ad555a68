//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`skein.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`skein.yaml`, `skein.yml`, etc.)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`skein.{profile}.toml`)
//! 3. Main config file (`skein.toml`)
//! 4. Environment variables (`SKEIN_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `SKEIN_` prefix with `__` as separator:
//!
//! - `SKEIN_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `SKEIN_PLUGINS__SCAN_INTERVAL_SECS=30` → `plugins.scan_interval_secs = 30`
//!
//! # Example
//!
//! ```rust,ignore
//! use skein_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/skein.toml")
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
use super::schema::SkeinConfig;
use super::validation::validate_config;

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

    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Reads `SKEIN_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("SKEIN_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Overrides the search.
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

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("skein")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically, above every other source.
    pub fn merge(mut self, config: SkeinConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads the configuration without validating it.
    pub fn load(self) -> ConfigResult<SkeinConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;
        let config: SkeinConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            connections = config.connections.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates.
    pub fn load_validated(self) -> ConfigResult<SkeinConfig> {
        let config = self.load()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SkeinConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with SKEIN_ prefix");
            figment = figment.merge(Env::prefixed("SKEIN_").split("__"));
        }

        let overrides = std::mem::take(&mut self.figment);
        Ok(figment.merge(overrides))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_owned())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("skein"));
        }
        paths
    }

    /// Tries `search_paths × base_names`, merging a profile-specific variant
    /// before the base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["skein.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["skein.yaml", "skein.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads from the current and user config directories.
pub fn load_config() -> ConfigResult<SkeinConfig> {
    ConfigLoader::new()
        .with_current_dir()
        .with_user_config_dir()
        .load_validated()
}

/// Loads one specific file (plus environment overrides).
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<SkeinConfig> {
    ConfigLoader::new().file(path).load_validated()
}

// =============================================================================
// Tests
// =============================================================================
