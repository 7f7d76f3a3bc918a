//! Console output redirection
//!
//! Adds a `--redirect <FILE>` option and a wrapper that sends the process's
//! stdout (and optionally stderr) to that file while a command runs. The
//! original streams are restored on every exit path, including panics, and
//! failures can be written into the file as a report.

use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::builder::TypedValueParser;
use clap::{Arg, ArgMatches, Args, Command};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::params::{invalid_value, ParamDecls, ParamError};
use crate::core::panic;
use crate::core::stdio::{StdioGuard, Streams};

const REDIRECT_HELP: &str = "Redirect console output to file.";

/// How the redirect file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Keep existing content, write at the end
    #[default]
    Append,
    /// Start from an empty file
    Truncate,
}

/// Redirection errors
#[derive(Debug, Error)]
pub enum RedirectError {
    /// Target is a directory
    #[error("'{}' is a directory", .0.display())]
    Directory(PathBuf),

    /// Atomic replacement requested together with append mode
    #[error("atomic writes cannot append to '{}'", .0.display())]
    AtomicAppend(PathBuf),

    /// Target cannot be opened
    #[error("cannot open '{}': {source}", path.display())]
    Open {
        /// Target path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Atomic replacement failed
    #[error("cannot replace '{}': {source}", path.display())]
    Persist {
        /// Target path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Descriptor redirection is not available on this platform
    #[error("standard stream redirection is not supported on this platform")]
    Unsupported,

    /// The standard streams could not be swapped
    #[error("failed to redirect standard streams: {0}")]
    Swap(#[source] io::Error),
}

impl From<io::Error> for RedirectError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::Unsupported {
            Self::Unsupported
        } else {
            Self::Swap(err)
        }
    }
}

/// A parsed `--redirect` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    path: PathBuf,
    mode: OpenMode,
    atomic: bool,
}

impl RedirectTarget {
    /// Append to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: OpenMode::Append,
            atomic: false,
        }
    }

    /// Set the open mode
    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Write to a temporary file and move it over the target when done
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open mode
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Atomic replacement?
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    /// Check the target without touching it.
    ///
    /// # Errors
    ///
    /// [`RedirectError::Directory`] or [`RedirectError::AtomicAppend`].
    pub fn validate(&self) -> Result<(), RedirectError> {
        if self.path.is_dir() {
            return Err(RedirectError::Directory(self.path.clone()));
        }
        if self.atomic && self.mode == OpenMode::Append {
            return Err(RedirectError::AtomicAppend(self.path.clone()));
        }
        Ok(())
    }

    /// Open the target for writing.
    ///
    /// # Errors
    ///
    /// Fails when validation fails or the file (or, for atomic targets, the
    /// temporary file next to it) cannot be created.
    pub fn open(&self) -> Result<RedirectSink, RedirectError> {
        self.validate()?;

        let inner = if self.atomic {
            let dir = match self.path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let tmp = NamedTempFile::new_in(dir).map_err(|source| self.open_error(source))?;
            // The replacement keeps the permissions of the file it replaces.
            if let Ok(existing) = fs::metadata(&self.path) {
                tmp.as_file()
                    .set_permissions(existing.permissions())
                    .map_err(|source| self.open_error(source))?;
            }
            Sink::Atomic(tmp)
        } else {
            let mut options = OpenOptions::new();
            options.create(true);
            match self.mode {
                OpenMode::Append => options.append(true),
                OpenMode::Truncate => options.write(true).truncate(true),
            };
            Sink::Direct(options.open(&self.path).map_err(|source| self.open_error(source))?)
        };

        Ok(RedirectSink {
            path: self.path.clone(),
            inner,
        })
    }

    fn open_error(&self, source: io::Error) -> RedirectError {
        RedirectError::Open {
            path: self.path.clone(),
            source,
        }
    }
}

enum Sink {
    Direct(File),
    Atomic(NamedTempFile),
}

/// An opened redirect target
pub struct RedirectSink {
    path: PathBuf,
    inner: Sink,
}

impl RedirectSink {
    /// The file the streams are pointed at
    pub fn file(&self) -> &File {
        match &self.inner {
            Sink::Direct(file) => file,
            Sink::Atomic(tmp) => tmp.as_file(),
        }
    }

    /// Append a timestamped failure report
    fn write_report(&self, report: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = self.file();
        let written = writeln!(file, "--- {} command failed ---\n{}", stamp, report)
            .and_then(|()| file.flush());
        if let Err(e) = written {
            warn!("failed to write error report to {}: {}", self.path.display(), e);
        }
    }

    /// Flush, and for atomic targets move the temporary file into place.
    ///
    /// # Errors
    ///
    /// [`RedirectError::Persist`] when the atomic rename fails.
    pub fn finish(self) -> Result<(), RedirectError> {
        match self.inner {
            Sink::Direct(mut file) => file.flush().map_err(|source| RedirectError::Persist {
                path: self.path,
                source,
            }),
            Sink::Atomic(tmp) => tmp
                .persist(&self.path)
                .map(drop)
                .map_err(|e| RedirectError::Persist {
                    path: self.path,
                    source: e.error,
                }),
        }
    }
}

impl fmt::Debug for RedirectSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectSink")
            .field("path", &self.path)
            .field("atomic", &matches!(self.inner, Sink::Atomic(_)))
            .finish()
    }
}

/// Value parser for redirect targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedirectFile {
    mode: OpenMode,
    lazy: bool,
    atomic: bool,
}

impl RedirectFile {
    /// Append mode, opened at parse time
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open mode
    #[must_use]
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Postpone creating the file until the command runs
    #[must_use]
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Replace the file atomically when the command is done
    #[must_use]
    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    fn check(&self, target: &RedirectTarget) -> Result<(), RedirectError> {
        target.validate()?;
        if self.lazy || self.atomic {
            return Ok(());
        }
        // Create the file now so unwritable targets are usage errors.
        target.open().map(drop)
    }
}

impl TypedValueParser for RedirectFile {
    type Value = RedirectTarget;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let target = RedirectTarget::new(value)
            .with_mode(self.mode)
            .with_atomic(self.atomic);

        match self.check(&target) {
            Ok(()) => Ok(target),
            Err(e) => Err(invalid_value(cmd, arg, value, &e)),
        }
    }
}

/// `--redirect <FILE>` option for derive-based CLIs
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct RedirectArgs {
    /// Redirect console output to file.
    #[arg(long, global = true, value_name = "FILE", value_parser = RedirectFile::new())]
    pub redirect: Option<RedirectTarget>,
}

/// Redirects console streams around a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    /// Redirect standard output
    pub stdout: bool,
    /// Redirect standard error
    pub stderr: bool,
    /// Write a report into the file when the call fails
    pub errors: bool,
}

impl Default for Redirect {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: false,
            errors: true,
        }
    }
}

impl Redirect {
    /// Stdout only, with error reports
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirect standard output?
    pub fn with_stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }

    /// Redirect standard error?
    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    /// Write failure reports?
    pub fn with_errors(mut self, errors: bool) -> Self {
        self.errors = errors;
        self
    }

    /// Streams selected for redirection
    pub fn streams(&self) -> Streams {
        Streams::new(self.stdout, self.stderr)
    }

    /// A redirect option under custom names.
    ///
    /// # Errors
    ///
    /// Fails on invalid declarations, see [`ParamDecls::parse`].
    pub fn arg(decls: &[&str], parser: RedirectFile) -> Result<Arg, ParamError> {
        Ok(ParamDecls::parse(decls)?
            .to_arg()
            .value_name("FILE")
            .help(REDIRECT_HELP)
            .value_parser(parser))
    }

    /// The target given for option `id`, if any
    pub fn target(matches: &ArgMatches, id: &str) -> Option<RedirectTarget> {
        matches
            .try_get_one::<RedirectTarget>(id)
            .ok()
            .flatten()
            .cloned()
    }

    /// Run `f` with the selected streams pointed at `target`.
    ///
    /// Without a target `f` runs untouched. Otherwise the streams are
    /// restored and flushed before this returns, whether `f` succeeds,
    /// fails or panics; a panic is re-raised afterwards.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error unchanged, or a [`RedirectError`] (converted into
    /// `E`) when the target cannot be opened or the streams cannot be
    /// swapped.
    pub fn run<T, E, F>(&self, target: Option<&RedirectTarget>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RedirectError> + fmt::Debug,
    {
        let Some(target) = target else {
            return f();
        };

        let sink = target.open()?;
        let outcome = {
            let _guard = StdioGuard::redirect(sink.file(), self.streams())
                .map_err(RedirectError::from)?;
            debug!(path = %target.path().display(), "console output redirected");
            panic::catch(f)
        };
        debug!("console output restored");

        if self.errors {
            match &outcome {
                Ok(Err(e)) => sink.write_report(&format!("Error: {:?}", e)),
                Err(caught) => sink.write_report(&format!("Error: {}", caught.report)),
                Ok(Ok(_)) => {}
            }
        }

        let finished = sink.finish();
        match outcome {
            Ok(Ok(value)) => finished.map(|()| value).map_err(E::from),
            Ok(Err(e)) => {
                if let Err(finish_err) = finished {
                    warn!("{}", finish_err);
                }
                Err(e)
            }
            Err(caught) => {
                if let Err(finish_err) = finished {
                    warn!("{}", finish_err);
                }
                caught.resume()
            }
        }
    }
}
