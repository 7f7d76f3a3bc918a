//! CLI Module
//!
//! Options and wrappers for clap-based command lines:
//! - Output redirection to a file
//! - Error boundary mapping errors and panics to exit codes
//! - Version and package icon options

pub mod exit_codes;
pub mod icon;
pub mod params;
pub mod redirect;
pub mod traceback;
pub mod version;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use icon::{IconError, PackageIcon};
pub use params::{param_id, ParamDecls, ParamError};
pub use redirect::{OpenMode, Redirect, RedirectArgs, RedirectError, RedirectFile, RedirectTarget};
pub use traceback::{ErrorBoundary, IntoExitCode, TracebackArgs};
pub use version::{version_arg, VersionArgs, VersionInfo};
