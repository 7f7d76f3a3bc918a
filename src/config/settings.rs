//! Application settings

use crate::cli::exit_codes::ExitCodes;
use crate::cli::redirect::{OpenMode, Redirect, RedirectFile};
use crate::cli::traceback::ErrorBoundary;
use crate::core::sitepackage::Locator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user config directory on this platform
    #[error("could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`AppConfig`]
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// Serialization failed
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output redirection defaults
    pub redirect: RedirectConfig,
    /// Error boundary defaults
    pub traceback: TracebackConfig,
    /// Package lookup overrides
    pub packages: PackagesConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load config from the default location.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load config from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to the default location.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save config to `path`, creating parent directories
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Redirect wrapper with the configured streams
    pub fn redirect(&self) -> Redirect {
        Redirect::new()
            .with_stdout(self.redirect.stdout)
            .with_stderr(self.redirect.stderr)
            .with_errors(self.redirect.errors)
    }

    /// Value parser for `--redirect` with the configured file options
    pub fn redirect_file(&self) -> RedirectFile {
        RedirectFile::new()
            .mode(self.redirect.mode)
            .lazy(self.redirect.lazy)
            .atomic(self.redirect.atomic)
    }

    /// Error boundary with the configured exit code; `traceback` is the
    /// command-line flag
    pub fn boundary(&self, traceback: bool) -> ErrorBoundary {
        ErrorBoundary::new()
            .with_exit_code(self.traceback.exit_code)
            .with_traceback(traceback || self.traceback.always)
    }

    /// Package locator for this process with configured overrides
    pub fn locator(&self) -> Locator {
        let mut locator = Locator::from_env();
        if let Some(prefix) = &self.packages.prefix {
            locator = locator.with_prefix(prefix);
        }
        if let Some(cargo_home) = &self.packages.cargo_home {
            locator = locator.with_cargo_home(cargo_home);
        }
        locator
    }
}

/// Output redirection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Redirect standard output
    pub stdout: bool,
    /// Redirect standard error
    pub stderr: bool,
    /// Append a report to the file when the command fails
    pub errors: bool,
    /// How the file is opened
    pub mode: OpenMode,
    /// Replace the file atomically when done
    pub atomic: bool,
    /// Create the file only when the command runs
    pub lazy: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: false,
            errors: true,
            mode: OpenMode::Append,
            atomic: false,
            lazy: false,
        }
    }
}

/// Error boundary settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracebackConfig {
    /// Exit code for failed commands
    pub exit_code: i32,
    /// Always print the full trace
    pub always: bool,
}

impl Default for TracebackConfig {
    fn default() -> Self {
        Self {
            exit_code: ExitCodes::UNHANDLED,
            always: false,
        }
    }
}

/// Package lookup overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// Install prefix holding `share/<package>`
    pub prefix: Option<PathBuf>,
    /// Cargo home holding the install records
    pub cargo_home: Option<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.traceback.exit_code, 3);
        assert_eq!(config.redirect(), Redirect::new());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[redirect]\nstderr = true\nmode = \"truncate\"\n\n[traceback]\nexit_code = 9\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.redirect.stdout);
        assert!(config.redirect.stderr);
        assert_eq!(config.redirect.mode, OpenMode::Truncate);
        assert_eq!(config.boundary(false).exit_code, 9);
        assert!(!config.boundary(false).traceback);
        assert!(config.boundary(true).traceback);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.packages.cargo_home = Some(dir.path().join("cargo"));
        config.traceback.always = true;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.locator().cargo_home(), Some(dir.path().join("cargo").as_path()));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[traceback]\nexit_code = \"three\"\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("invalid config file"));
    }
}
