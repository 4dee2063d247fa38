//! Configuration for the loader.
//!
//! Layered, lowest to highest priority:
//!
//! 1. **Compiled defaults**
//! 2. **User config file** - `~/.config/tweet-loader/config.toml`
//! 3. **Environment variables** - `TWEET_LOADER_*`, plus `NO_COLOR`
//! 4. **CLI arguments**, applied by the binary
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/.local/share/tweet-loader/tweets.db"
//!
//! [load]
//! print_every = 1000
//! reverse_order = true
//!
//! [output]
//! colors = true
//! quiet = false
//! ```

use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub load: LoadConfig,
    pub output: OutputConfig,
}

/// Store location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `TWEET_LOADER_DB`
    pub db: Option<PathBuf>,
}

/// Loader behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Print a progress line every this many records (0 disables).
    /// Environment variable: `TWEET_LOADER_PRINT_EVERY`
    pub print_every: usize,

    /// Visit archives and entries newest-name first.
    /// Environment variable: `TWEET_LOADER_NO_REVERSE` turns this off.
    pub reverse_order: bool,
}

/// Console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub colors: bool,
    /// Suppress progress output.
    pub quiet: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            print_every: 1000,
            reverse_order: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            colors: true,
            quiet: false,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the user file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ConfigError`] if the user config file exists
    /// but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::user_config_path() {
            if let Some(user_config) = Self::load_from_file(&path)? {
                config.merge(user_config);
            }
        }

        config.apply_env_overrides();

        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Load configuration from a specific file; `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ConfigError`] if the file cannot be read or
    /// is not valid TOML for this structure.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| LoaderError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = toml::from_str(&content).map_err(|e| LoaderError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!("Loaded config from: {}", path.display());
        Ok(Some(config))
    }

    /// Path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tweet-loader").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup.
    fn apply_overrides_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = var("TWEET_LOADER_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }

        if let Some(every) = var("TWEET_LOADER_PRINT_EVERY") {
            match every.parse() {
                Ok(n) => self.load.print_every = n,
                Err(_) => warn!("Ignoring invalid TWEET_LOADER_PRINT_EVERY: {every}"),
            }
        }
        if var("TWEET_LOADER_NO_REVERSE").is_some() {
            self.load.reverse_order = false;
        }

        if var("NO_COLOR").is_some() {
            self.output.colors = false;
        }
        if var("TWEET_LOADER_QUIET").is_some() {
            self.output.quiet = true;
        }
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.db.is_some() {
            self.paths.db = other.paths.db;
        }
        self.load = other.load;
        self.output = other.output;
    }

    /// Database path, falling back to the platform data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .clone()
            .unwrap_or_else(crate::default_db_path)
    }

    /// Write `content` to the user config file, creating its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined or the
    /// file cannot be written.
    pub fn write_user_config(content: &str) -> Result<PathBuf> {
        let config_path = Self::user_config_path().ok_or_else(|| {
            LoaderError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, content)?;
        info!("Saved config to: {}", config_path.display());
        Ok(config_path)
    }

    /// Render as TOML.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Contents of a fresh config file.
    #[must_use]
    pub fn default_config_content() -> String {
        Self::default().to_toml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.load.print_every, 1000);
        assert!(config.load.reverse_order);
        assert!(config.output.colors);
        assert!(!config.output.quiet);
        assert_eq!(config.paths.db, None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[load]\nprint_every = 50\n").unwrap();

        let config = Config::load_from_file(&path).unwrap().unwrap();
        assert_eq!(config.load.print_every, 50);
        assert!(config.load.reverse_order);
        assert!(config.output.colors);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[load]\nprint_every = \"often\"\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, LoaderError::ConfigError { .. }));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        let mut other = Config::default();
        other.load.reverse_order = false;
        other.paths.db = Some(PathBuf::from("/custom/tweets.db"));

        base.merge(other);

        assert!(!base.load.reverse_order);
        assert_eq!(base.db_path(), PathBuf::from("/custom/tweets.db"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TWEET_LOADER_DB", "/tmp/env.db"),
            ("TWEET_LOADER_PRINT_EVERY", "10"),
            ("TWEET_LOADER_NO_REVERSE", "1"),
            ("NO_COLOR", "1"),
        ]);
        let mut config = Config::default();
        config.apply_overrides_from(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.paths.db, Some(PathBuf::from("/tmp/env.db")));
        assert_eq!(config.load.print_every, 10);
        assert!(!config.load.reverse_order);
        assert!(!config.output.colors);
    }

    #[test]
    fn test_invalid_env_number_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides_from(|key| {
            (key == "TWEET_LOADER_PRINT_EVERY").then(|| "lots".to_string())
        });
        assert_eq!(config.load.print_every, 1000);
    }

    #[test]
    fn test_default_config_content() {
        let content = Config::default_config_content();
        assert!(content.contains("[load]"));
        assert!(content.contains("print_every = 1000"));
        assert!(content.contains("[output]"));
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
