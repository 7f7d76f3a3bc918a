//! # clapx
//!
//! Extensions for [`clap`] command lines:
//! - `--redirect FILE` sends console output to a file, with a failure
//!   report appended when the command errors or panics
//! - `--traceback` error boundary turning errors and panics into exit codes
//! - `--version` printing the program version and homepage
//! - `--icon` printing the path of an icon shipped with an installed package
//!
//! ## Example
//!
//! ```rust,no_run
//! use clap::{Args, Command, FromArgMatches};
//! use clapx::{ErrorBoundary, Redirect, RedirectArgs};
//!
//! let cmd = RedirectArgs::augment_args(Command::new("demo"));
//! let matches = cmd.get_matches();
//! let args = RedirectArgs::from_arg_matches(&matches).unwrap();
//!
//! let result = ErrorBoundary::new().run(|| {
//!     Redirect::new().run(args.redirect.as_ref(), || -> anyhow::Result<()> {
//!         println!("hello");
//!         Ok(())
//!     })
//! });
//! result.exit();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{
    CliResult, ErrorBoundary, ExitCodes, IntoExitCode, OpenMode, PackageIcon, Redirect,
    RedirectArgs, RedirectFile, RedirectTarget, TracebackArgs, VersionArgs, VersionInfo,
};
pub use crate::config::AppConfig;
pub use crate::core::metadata::PackageMetadata;
pub use crate::core::sitepackage::{module_name, sitepackage_dir, Locator, PackageError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
