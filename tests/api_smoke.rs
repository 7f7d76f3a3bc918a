use clap::{Args, Command, FromArgMatches};
use clapx::{ErrorBoundary, PackageError, RedirectArgs, TracebackArgs, VersionInfo};

#[test]
fn version_from_own_metadata() {
    let info = VersionInfo::new(clapx::package_metadata!());
    assert_eq!(
        info.message("tool"),
        format!("tool, version {}\nhttps://github.com/clapx/clapx", clapx::VERSION)
    );
}

#[test]
fn derive_args_compose() {
    let cmd = TracebackArgs::augment_args(RedirectArgs::augment_args(Command::new("tool")));
    let m = cmd.try_get_matches_from(["tool", "--traceback"]).unwrap();

    let redirect = RedirectArgs::from_arg_matches(&m).unwrap();
    let traceback = TracebackArgs::from_arg_matches(&m).unwrap();
    assert!(redirect.redirect.is_none());
    assert_eq!(traceback.boundary(), ErrorBoundary::new().with_traceback(true));
}

#[test]
fn unknown_package_is_not_found() {
    let err = clapx::sitepackage_dir("nonexistent-clapx-smoke-package").unwrap_err();
    assert!(matches!(err, PackageError::NotFound { .. }));
    assert!(err
        .to_string()
        .starts_with("'nonexistent-clapx-smoke-package' is not a package or not installed"));
}
