//! Version option
//!
//! A `--version` flag that prints the program name, version and project
//! homepage:
//!
//! ```text
//! clapx, version 0.1.0
//! https://github.com/clapx/clapx
//! ```

use clap::{Arg, ArgAction, ArgMatches, Args, Command};

use crate::core::metadata::PackageMetadata;
use crate::core::sitepackage::PackageError;

/// Argument id of the version flag
pub const VERSION_ID: &str = "version";

const VERSION_HELP: &str = "Show the version and exit.";

/// The `-V/--version` flag.
///
/// The flag is exclusive, so it works even when required arguments are
/// missing.
pub fn version_arg() -> Arg {
    Arg::new(VERSION_ID)
        .short('V')
        .long("version")
        .action(ArgAction::SetTrue)
        .exclusive(true)
        .help(VERSION_HELP)
}

/// `-V/--version` flag for derive-based CLIs.
///
/// The parent command needs `#[command(disable_version_flag = true)]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Args)]
pub struct VersionArgs {
    /// Show the version and exit.
    #[arg(short = 'V', long, exclusive = true)]
    pub version: bool,
}

impl VersionArgs {
    /// The version message, if the flag was given
    pub fn handle(&self, info: &VersionInfo, prog: &str) -> Option<String> {
        self.version.then(|| info.message(prog))
    }
}

/// What `--version` prints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    metadata: PackageMetadata,
    url: Option<String>,
}

impl VersionInfo {
    /// Version info for a package
    pub fn new(metadata: PackageMetadata) -> Self {
        Self {
            metadata,
            url: None,
        }
    }

    /// Use this URL instead of the package homepage
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Version info of an installed package.
    ///
    /// # Errors
    ///
    /// [`PackageError::MetadataNotFound`] when the package is not installed.
    pub fn lookup(distribution: &str) -> Result<Self, PackageError> {
        PackageMetadata::lookup(distribution).map(Self::new)
    }

    /// Package metadata
    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// Explicit URL, else homepage, else repository
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_else(|| self.metadata.url())
    }

    /// `"{prog}, version {version}"`, plus the URL on a second line when
    /// one is known
    pub fn message(&self, prog: &str) -> String {
        let mut message = format!("{}, version {}", prog, self.metadata.version);
        let url = self.url();
        if !url.is_empty() {
            message.push('\n');
            message.push_str(url);
        }
        message
    }

    /// Replace clap's version flag with ours
    pub fn augment(&self, cmd: Command) -> Command {
        cmd.version(self.metadata.version.clone())
            .disable_version_flag(true)
            .arg(version_arg())
    }

    /// The version message, if `--version` was given
    pub fn handle(&self, matches: &ArgMatches, prog: &str) -> Option<String> {
        let requested = matches
            .try_get_one::<bool>(VERSION_ID)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false);
        requested.then(|| self.message(prog))
    }

    /// Print the version message and exit with status 0 if requested
    pub fn exit_if_requested(&self, matches: &ArgMatches, prog: &str) {
        if let Some(message) = self.handle(matches, prog) {
            println!("{}", message);
            std::process::exit(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::FromArgMatches;

    fn info() -> VersionInfo {
        VersionInfo::new(PackageMetadata::new("demo", "1.2.3").with_homepage("https://demo.dev"))
    }

    #[test]
    fn test_message() {
        assert_eq!(info().message("demo"), "demo, version 1.2.3\nhttps://demo.dev");
        assert_eq!(
            info().with_url("https://other").message("prog"),
            "prog, version 1.2.3\nhttps://other"
        );

        let bare = VersionInfo::new(PackageMetadata::new("demo", "0.1.0"));
        assert_eq!(bare.message("demo"), "demo, version 0.1.0");
    }

    #[test]
    fn test_version_ignores_required_args() {
        let cmd = info().augment(Command::new("demo").arg(Arg::new("input").required(true)));

        let m = cmd.clone().try_get_matches_from(["demo", "--version"]).unwrap();
        assert_eq!(
            info().handle(&m, "demo").as_deref(),
            Some("demo, version 1.2.3\nhttps://demo.dev")
        );

        let m = cmd.clone().try_get_matches_from(["demo", "file.txt"]).unwrap();
        assert_eq!(info().handle(&m, "demo"), None);

        let err = cmd.try_get_matches_from(["demo", "-V", "file.txt"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_derive_args() {
        let cmd = VersionArgs::augment_args(Command::new("demo").disable_version_flag(true));
        let m = cmd.try_get_matches_from(["demo", "-V"]).unwrap();
        let args = VersionArgs::from_arg_matches(&m).unwrap();
        assert!(args.handle(&info(), "demo").is_some());
    }

    #[test]
    fn test_lookup_unknown_package() {
        let err = VersionInfo::lookup("nonexisting-clapx-test-package").unwrap_err();
        assert_eq!(
            err.to_string(),
            "No package metadata was found for nonexisting-clapx-test-package"
        );
    }
}
