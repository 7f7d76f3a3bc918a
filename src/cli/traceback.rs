//! Error boundary
//!
//! Runs a command, turning errors and panics that escape it into an exit
//! status. A short `Error: ...` line is printed by default; with
//! `--traceback` the full cause chain and backtrace are printed instead.

use std::io::{self, Write};

use clap::{Arg, ArgAction, ArgMatches, Args};
use tracing::debug;

use super::exit_codes::{CliResult, ExitCodes};
use super::params::{ParamDecls, ParamError};
use crate::core::panic;

const TRACEBACK_HELP: &str = "Show the full traceback in case of an error.";

/// Values a command may return to choose its exit status
pub trait IntoExitCode {
    /// The exit status
    fn into_exit_code(self) -> i32;
}

impl IntoExitCode for () {
    fn into_exit_code(self) -> i32 {
        ExitCodes::SUCCESS
    }
}

impl IntoExitCode for i32 {
    fn into_exit_code(self) -> i32 {
        self
    }
}

impl IntoExitCode for u8 {
    fn into_exit_code(self) -> i32 {
        i32::from(self)
    }
}

impl<T: IntoExitCode> IntoExitCode for Option<T> {
    fn into_exit_code(self) -> i32 {
        self.map_or(ExitCodes::SUCCESS, IntoExitCode::into_exit_code)
    }
}

impl IntoExitCode for CliResult {
    fn into_exit_code(self) -> i32 {
        self.code()
    }
}

/// `--traceback` flag for derive-based CLIs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Args)]
pub struct TracebackArgs {
    /// Show the full traceback in case of an error.
    #[arg(long, global = true)]
    pub traceback: bool,
}

impl TracebackArgs {
    /// Error boundary honoring the flag
    pub fn boundary(&self) -> ErrorBoundary {
        ErrorBoundary::new().with_traceback(self.traceback)
    }
}

/// Maps errors and panics from a command to an exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBoundary {
    /// Status used when the command fails
    pub exit_code: i32,
    /// Print the full trace instead of a one-line message
    pub traceback: bool,
}

impl Default for ErrorBoundary {
    fn default() -> Self {
        Self {
            exit_code: ExitCodes::UNHANDLED,
            traceback: false,
        }
    }
}

impl ErrorBoundary {
    /// Boundary with exit code 3 and no traceback
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure exit code
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Enable or disable the full trace
    pub fn with_traceback(mut self, traceback: bool) -> Self {
        self.traceback = traceback;
        self
    }

    /// A `--traceback`-style flag under custom names.
    ///
    /// # Errors
    ///
    /// Fails on invalid declarations, see [`ParamDecls::parse`].
    pub fn arg(decls: &[&str]) -> Result<Arg, ParamError> {
        Ok(ParamDecls::parse(decls)?
            .to_arg()
            .action(ArgAction::SetTrue)
            .help(TRACEBACK_HELP))
    }

    /// Enable the trace when the flag `id` was given
    pub fn with_matches(self, matches: &ArgMatches, id: &str) -> Self {
        let requested = matches.try_get_one::<bool>(id).ok().flatten().copied();
        self.with_traceback(self.traceback || requested.unwrap_or(false))
    }

    /// Run `f`, reporting failures on stderr.
    pub fn run<T, E, F>(&self, f: F) -> CliResult
    where
        F: FnOnce() -> Result<T, E>,
        T: IntoExitCode,
        E: Into<anyhow::Error>,
    {
        self.run_with_output(&mut io::stderr(), f)
    }

    /// Run `f`, reporting failures to `out`.
    pub fn run_with_output<W, T, E, F>(&self, out: &mut W, f: F) -> CliResult
    where
        W: Write,
        F: FnOnce() -> Result<T, E>,
        T: IntoExitCode,
        E: Into<anyhow::Error>,
    {
        let report = match panic::catch(f) {
            Ok(Ok(value)) => return CliResult::Exited(value.into_exit_code()),
            Ok(Err(err)) => self.error_report(&err.into()),
            Err(caught) => {
                if self.traceback {
                    format!("Error: {}", caught.report)
                } else {
                    format!("Error: {}", caught.report.summary())
                }
            }
        };

        let _ = writeln!(out, "{}", report);
        let _ = out.flush();
        debug!(code = self.exit_code, "command failed");
        CliResult::failed(self.exit_code, report)
    }

    fn error_report(&self, err: &anyhow::Error) -> String {
        if self.traceback {
            format!("Error: {:?}", err)
        } else {
            format!("Error: {:#}", err)
        }
    }

    /// Exit with this boundary's code on Ctrl-C.
    ///
    /// # Errors
    ///
    /// Fails if a Ctrl-C handler is already installed in this process.
    pub fn install_interrupt_handler(&self) -> Result<(), ctrlc::Error> {
        let code = self.exit_code;
        ctrlc::set_handler(move || {
            eprintln!("Error: interrupted");
            std::process::exit(code);
        })
    }
}
