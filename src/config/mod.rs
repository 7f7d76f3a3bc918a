//! Configuration module
//!
//! Handles the defaults applied to the CLI wrappers

mod settings;

pub use settings::{
    AppConfig, ConfigError, LoggingConfig, PackagesConfig, RedirectConfig, TracebackConfig,
};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "clapx", "clapx").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default configuration file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
