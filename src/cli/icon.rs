//! Package icon option
//!
//! `--icon` prints the absolute path of an icon shipped with a package and
//! exits, so scripts and installers can pick it up. Self-contained binaries
//! that embed their icon report the executable itself.

use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{Arg, Command};
use thiserror::Error;
use tracing::debug;

use super::params::{invalid_value, ParamDecls, ParamError};
use crate::core::sitepackage::{Locator, PackageError};

/// Argument id of the icon option
pub const ICON_ID: &str = "icon";

const ICON_HELP: &str = "Show path to the package icon.";

/// Icon lookup errors
#[derive(Debug, Error)]
pub enum IconError {
    /// No package to look the icon up in
    #[error("'package_name' name is missing.")]
    MissingPackage,

    /// No file name configured or given
    #[error("no icon file name given")]
    MissingFilename,

    /// Package directory lookup failed
    #[error(transparent)]
    Package(#[from] PackageError),

    /// The icon file does not exist
    #[error("cannot resolve '{}': {source}", path.display())]
    Resolve {
        /// Icon path inside the package
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The running executable cannot be located
    #[error("cannot locate the running executable: {0}")]
    Executable(#[source] io::Error),
}

/// Value parser that resolves a package icon.
///
/// The flag value `"true"` (option given without a value) selects the
/// configured file name, `"false"` yields `None`, anything else is used as
/// the file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIcon {
    filename: Option<String>,
    package: Option<String>,
    exit_code: Option<i32>,
    frozen: bool,
    locator: Option<Locator>,
}

impl PackageIcon {
    /// Icon with this file name, relative to the package directory
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::default()
        }
    }

    /// Distribution name of the package holding the icon
    #[must_use]
    pub fn package(mut self, name: impl Into<String>) -> Self {
        self.package = Some(name.into());
        self
    }

    /// Print the path to stderr and exit with `code` once resolved
    #[must_use]
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Report the running executable instead of a file in the package
    #[must_use]
    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    /// Search packages with this locator instead of [`Locator::from_env`]
    #[must_use]
    pub fn locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Absolute path of the icon.
    ///
    /// `filename` overrides the configured file name.
    ///
    /// # Errors
    ///
    /// See [`IconError`].
    pub fn resolve(&self, filename: Option<&str>) -> Result<PathBuf, IconError> {
        if self.frozen {
            let exe = env::current_exe().map_err(IconError::Executable)?;
            return exe
                .canonicalize()
                .map_err(|source| IconError::Resolve { path: exe, source });
        }

        let package = self.package.as_deref().ok_or(IconError::MissingPackage)?;
        let filename = filename
            .or(self.filename.as_deref())
            .ok_or(IconError::MissingFilename)?;

        let dir = match &self.locator {
            Some(locator) => locator.package_dir(package)?,
            None => Locator::from_env().package_dir(package)?,
        };
        let path = dir.join(filename);
        debug!("resolving icon {}", path.display());
        path.canonicalize()
            .map_err(|source| IconError::Resolve { path, source })
    }

    /// `--icon[=FILE]` option using this parser
    pub fn arg(self) -> Arg {
        self.decorate(Arg::new(ICON_ID).long("icon"))
    }

    /// The icon option under custom names.
    ///
    /// # Errors
    ///
    /// Fails on invalid declarations, see [`ParamDecls::parse`].
    pub fn arg_with(self, decls: &[&str]) -> Result<Arg, ParamError> {
        Ok(self.decorate(ParamDecls::parse(decls)?.to_arg()))
    }

    fn decorate(self, arg: Arg) -> Arg {
        arg.num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_name("FILE")
            .help(ICON_HELP)
            .value_parser(self)
    }
}

impl TypedValueParser for PackageIcon {
    type Value = Option<PathBuf>;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let text = value.to_string_lossy();
        let filename = match text.as_ref() {
            "false" => return Ok(None),
            "true" => None,
            other => Some(other),
        };

        let icon = self
            .resolve(filename)
            .map_err(|e| invalid_value(cmd, arg, value, &e))?;

        if let Some(code) = self.exit_code {
            eprintln!("{}", icon.display());
            std::process::exit(code);
        }
        Ok(Some(icon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, Locator, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("share").join("demo");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("demo.png"), b"png").unwrap();
        fs::write(dir.join("alt.png"), b"png").unwrap();
        let locator = Locator::new().with_prefix(tmp.path());
        let icon = dir.join("demo.png").canonicalize().unwrap();
        (tmp, locator, icon)
    }

    fn command(icon: PackageIcon) -> Command {
        Command::new("demo").arg(icon.arg())
    }

    #[test]
    fn test_flag_resolves_default_icon() {
        let (_tmp, locator, expected) = fixture();
        let cmd = command(PackageIcon::new("demo.png").package("demo").locator(locator));

        let m = cmd.clone().try_get_matches_from(["demo", "--icon"]).unwrap();
        let icon = m.get_one::<Option<PathBuf>>(ICON_ID).unwrap();
        assert_eq!(icon.as_deref(), Some(expected.as_path()));

        let m = cmd.try_get_matches_from(["demo"]).unwrap();
        assert!(m.get_one::<Option<PathBuf>>(ICON_ID).is_none());
    }

    #[test]
    fn test_value_overrides_filename() {
        let (_tmp, locator, expected) = fixture();
        let cmd = command(PackageIcon::new("demo.png").package("demo").locator(locator));

        let m = cmd.try_get_matches_from(["demo", "--icon=alt.png"]).unwrap();
        let icon = m.get_one::<Option<PathBuf>>(ICON_ID).unwrap().clone().unwrap();
        assert_eq!(icon, expected.with_file_name("alt.png"));
    }

    #[test]
    fn test_missing_icon_is_usage_error() {
        let (_tmp, locator, _) = fixture();
        let cmd = command(PackageIcon::new("nope.png").package("demo").locator(locator));

        let err = cmd.try_get_matches_from(["demo", "--icon"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn test_missing_package() {
        let err = PackageIcon::new("demo.png").resolve(None).unwrap_err();
        assert_eq!(err.to_string(), "'package_name' name is missing.");
    }

    #[test]
    fn test_frozen_reports_executable() {
        let icon = PackageIcon::new("demo.png").frozen(true).resolve(None).unwrap();
        let exe = env::current_exe().unwrap().canonicalize().unwrap();
        assert_eq!(icon, exe);
    }

    #[test]
    fn test_custom_names() {
        let (_tmp, locator, expected) = fixture();
        let arg = PackageIcon::new("demo.png")
            .package("demo")
            .locator(locator)
            .arg_with(&["-i", "--show-icon"])
            .unwrap();

        let m = Command::new("demo").arg(arg).try_get_matches_from(["demo", "-i"]).unwrap();
        let icon = m.get_one::<Option<PathBuf>>("show_icon").unwrap();
        assert_eq!(icon.as_deref(), Some(expected.as_path()));
    }
}
