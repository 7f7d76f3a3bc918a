//! Installed package directory lookup
//!
//! Given a distribution name, find the directory an installed package lives
//! in. Three strategies are tried in order:
//!
//! 1. Direct resource lookup in `<prefix>/share/<name>`
//! 2. The cargo install record, pointing into the unpacked registry sources
//! 3. Editable (`cargo install --path`) installs, resolved to the source tree

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::install::{normalize_name, InstallManifest, InstalledPackage, PackageSource};
use super::metadata::{parse_manifest, PackageMetadata};

/// Errors from package lookup
#[derive(Debug, Error)]
pub enum PackageError {
    /// Every strategy failed; `cause` holds the last failure
    #[error("'{name}' is not a package or not installed")]
    NotFound {
        /// Requested distribution name
        name: String,
        /// Why the last strategy failed
        #[source]
        cause: Option<Box<PackageError>>,
    },

    /// Package not present in the install record
    #[error("no install record for '{0}'")]
    NotInstalled(String),

    /// Metadata lookup failed
    #[error("No package metadata was found for {name}")]
    MetadataNotFound {
        /// Requested distribution name
        name: String,
        /// Underlying lookup failure
        #[source]
        source: Box<PackageError>,
    },

    /// Installed from a source that has no local checkout we can find
    #[error("'{name}' was installed from {origin}, which has no local package directory")]
    Unlocatable {
        /// Requested distribution name
        name: String,
        /// Recorded source id
        origin: String,
    },

    /// Neither `CARGO_HOME` nor a home directory is available
    #[error("could not determine the cargo home directory")]
    NoCargoHome,

    /// The running executable has no usable install prefix
    #[error("could not determine the install prefix")]
    NoPrefix,

    /// Filesystem error
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Install record is not valid JSON
    #[error("invalid install record {}: {source}", path.display())]
    Record {
        /// Record path
        path: PathBuf,
        /// Parse error
        source: serde_json::Error,
    },

    /// `Cargo.toml` is not valid TOML
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        /// Manifest path
        path: PathBuf,
        /// Parse error
        source: toml::de::Error,
    },

    /// Manifest without a `[package]` table
    #[error("no [package] table in {}", .0.display())]
    NoPackage(PathBuf),

    /// Editable install root without any package in it
    #[error("no package found under {}", .0.display())]
    NoPackageDir(PathBuf),
}

/// Where to look for installed packages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    prefix: Option<PathBuf>,
    cargo_home: Option<PathBuf>,
}

impl Locator {
    /// Locator with no search roots
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator for the running process: prefix from the executable's
    /// location (`<prefix>/bin/<exe>`), cargo home from `CARGO_HOME` or
    /// `~/.cargo`.
    pub fn from_env() -> Self {
        Self {
            prefix: exe_prefix(),
            cargo_home: cargo_home(),
        }
    }

    /// Override the install prefix
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Override the cargo home
    pub fn with_cargo_home(mut self, cargo_home: impl Into<PathBuf>) -> Self {
        self.cargo_home = Some(cargo_home.into());
        self
    }

    /// Install prefix, if known
    pub fn prefix(&self) -> Option<&Path> {
        self.prefix.as_deref()
    }

    /// Cargo home, if known
    pub fn cargo_home(&self) -> Option<&Path> {
        self.cargo_home.as_deref()
    }

    /// Directory of an installed package.
    ///
    /// # Errors
    ///
    /// [`PackageError::NotFound`] when no strategy finds the package; its
    /// source is the failure of the last strategy tried.
    pub fn package_dir(&self, name: &str) -> Result<PathBuf, PackageError> {
        match self.resource_dir(name) {
            Ok(dir) => return Ok(dir),
            Err(e) => debug!("resource lookup for '{}' failed: {}", name, e),
        }

        let record = self.installed(name).map_err(|e| not_found(name, Some(e)))?;

        if let Some(dir) = self.registry_dir(&record) {
            return Ok(dir);
        }
        debug!("no registry sources for '{}'", name);

        self.editable_dir(&record).map_err(|e| not_found(name, Some(e)))
    }

    /// Library identifier of an installed package, as used in `use` paths.
    ///
    /// # Errors
    ///
    /// Fails like [`Locator::package_dir`], or when the package manifest
    /// cannot be parsed.
    pub fn module_name(&self, name: &str) -> Result<String, PackageError> {
        let dir = self.package_dir(name)?;
        let manifest_path = dir.join("Cargo.toml");

        let module = if manifest_path.is_file() {
            let manifest = parse_manifest(&manifest_path)?;
            let lib_name = manifest.lib.and_then(|lib| lib.name);
            lib_name
                .or(manifest.package.map(|p| p.name))
                .ok_or(PackageError::NoPackage(manifest_path))?
        } else {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| PackageError::NoPackageDir(dir.clone()))?
        };

        Ok(module.replace('-', "_"))
    }

    /// Metadata of an installed package.
    ///
    /// Read from the package's `Cargo.toml` when one exists, otherwise from
    /// the install record.
    ///
    /// # Errors
    ///
    /// [`PackageError::MetadataNotFound`] when the package cannot be found.
    pub fn metadata(&self, name: &str) -> Result<PackageMetadata, PackageError> {
        let wrap = |source: PackageError| PackageError::MetadataNotFound {
            name: name.to_string(),
            source: Box::new(source),
        };

        match self.package_dir(name) {
            Ok(dir) => {
                let manifest = dir.join("Cargo.toml");
                if manifest.is_file() {
                    return PackageMetadata::from_manifest_or(&manifest, || {
                        self.installed(name).ok().map(|record| record.version)
                    })
                    .map_err(wrap);
                }
                let record = self.installed(name).map_err(wrap)?;
                Ok(PackageMetadata::new(record.name, record.version))
            }
            Err(e) => Err(wrap(e)),
        }
    }

    fn resource_dir(&self, name: &str) -> Result<PathBuf, PackageError> {
        let prefix = self.prefix.as_deref().ok_or(PackageError::NoPrefix)?;
        let dir = prefix.join("share").join(name);
        if dir.is_dir() {
            debug!("found '{}' in {}", name, dir.display());
            return Ok(dir);
        }
        Err(not_found(name, None))
    }

    fn installed(&self, name: &str) -> Result<InstalledPackage, PackageError> {
        let home = self.cargo_home.as_deref().ok_or(PackageError::NoCargoHome)?;
        let manifest = InstallManifest::load(home)?;
        manifest
            .find(name)
            .cloned()
            .ok_or_else(|| PackageError::NotInstalled(name.to_string()))
    }

    fn registry_dir(&self, record: &InstalledPackage) -> Option<PathBuf> {
        if !matches!(record.source, PackageSource::Registry(_)) {
            return None;
        }
        let src = self.cargo_home.as_deref()?.join("registry").join("src");
        let wanted = record.source_dir_name();

        sorted_subdirs(&src)
            .into_iter()
            .filter(|index| !is_tests_dir(index))
            .map(|index| index.join(&wanted))
            .find(|dir| dir.join("Cargo.toml").is_file())
    }

    fn editable_dir(&self, record: &InstalledPackage) -> Result<PathBuf, PackageError> {
        let path = match &record.source {
            PackageSource::Path(path) => path,
            PackageSource::Registry(url) | PackageSource::Git(url) | PackageSource::Other(url) => {
                return Err(PackageError::Unlocatable {
                    name: record.name.clone(),
                    origin: url.clone(),
                })
            }
        };

        let root = path.canonicalize().map_err(|source| PackageError::Io {
            path: path.clone(),
            source,
        })?;

        let root_manifest = root.join("Cargo.toml");
        if root_manifest.is_file() {
            if let Ok(manifest) = parse_manifest(&root_manifest) {
                if manifest.package.is_some() {
                    debug!("editable install of '{}' at {}", record.name, root.display());
                    return Ok(root);
                }
            }
        }

        let members: Vec<PathBuf> = sorted_subdirs(&root)
            .into_iter()
            .filter(|dir| !is_tests_dir(dir) && dir.join("Cargo.toml").is_file())
            .collect();

        let wanted = normalize_name(&record.name);
        let matching = members.iter().find(|dir| {
            parse_manifest(&dir.join("Cargo.toml"))
                .ok()
                .and_then(|m| m.package)
                .is_some_and(|p| normalize_name(&p.name) == wanted)
        });

        matching
            .or(members.first())
            .cloned()
            .ok_or(PackageError::NoPackageDir(root))
    }
}

/// Directory of an installed package, searched from the running process.
///
/// # Errors
///
/// See [`Locator::package_dir`].
pub fn sitepackage_dir(distribution_name: &str) -> Result<PathBuf, PackageError> {
    Locator::from_env().package_dir(distribution_name)
}

/// Library identifier to `use` for a given distribution name.
///
/// # Errors
///
/// See [`Locator::module_name`].
pub fn module_name(distribution_name: &str) -> Result<String, PackageError> {
    Locator::from_env().module_name(distribution_name)
}

fn not_found(name: &str, cause: Option<PackageError>) -> PackageError {
    PackageError::NotFound {
        name: name.to_string(),
        cause: cause.map(Box::new),
    }
}

fn exe_prefix() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    exe.parent()?.parent().map(Path::to_path_buf)
}

fn cargo_home() -> Option<PathBuf> {
    match env::var_os("CARGO_HOME") {
        Some(home) if !home.is_empty() => Some(PathBuf::from(home)),
        _ => directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".cargo")),
    }
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn is_tests_dir(dir: &Path) -> bool {
    dir.file_name()
        .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case("tests"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::fs;

    fn write_manifest(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("Cargo.toml"), body).unwrap();
    }

    fn write_record(cargo_home: &Path, key: &str) {
        fs::create_dir_all(cargo_home).unwrap();
        let json = serde_json::json!({ "installs": { key: { "bins": [] } } });
        fs::write(cargo_home.join(".crates2.json"), json.to_string()).unwrap();
    }

    #[test]
    fn test_resource_dir_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let share = tmp.path().join("share").join("demo");
        fs::create_dir_all(&share).unwrap();

        let locator = Locator::new().with_prefix(tmp.path());
        assert_eq!(locator.package_dir("demo").unwrap(), share);
        assert_eq!(locator.module_name("demo").unwrap(), "demo");
    }

    #[test]
    fn test_resource_file_is_not_a_package() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("share")).unwrap();
        fs::write(tmp.path().join("share").join("demo"), "").unwrap();

        let locator = Locator::new().with_prefix(tmp.path());
        let err = locator.package_dir("demo").unwrap_err();
        assert_eq!(err.to_string(), "'demo' is not a package or not installed");
        // no cargo home configured: the install record step failed last
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("cargo home"));
    }

    #[test]
    fn test_registry_install() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("cargo");
        write_record(
            &home,
            "fancy-tool 1.4.0 (registry+https://github.com/rust-lang/crates.io-index)",
        );
        let src = home
            .join("registry/src/index.crates.io-6f17d22bba15001f")
            .join("fancy-tool-1.4.0");
        write_manifest(
            &src,
            "[package]\nname = \"fancy-tool\"\nversion = \"1.4.0\"\nhomepage = \"https://fancy.dev\"\n\n[lib]\nname = \"fancy\"\n",
        );

        let locator = Locator::new().with_cargo_home(&home);
        assert_eq!(locator.package_dir("fancy_tool").unwrap(), src);
        assert_eq!(locator.module_name("fancy-tool").unwrap(), "fancy");

        let meta = locator.metadata("fancy-tool").unwrap();
        assert_eq!(meta.version, "1.4.0");
        assert_eq!(meta.url(), "https://fancy.dev");
    }

    #[cfg(unix)]
    #[test]
    fn test_editable_install() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        write_manifest(&project, "[workspace]\nmembers = [\"app\", \"tests\"]\n");
        write_manifest(&project.join("tests"), "[package]\nname = \"tests\"\n");
        write_manifest(
            &project.join("app"),
            "[package]\nname = \"my-app\"\nversion = \"0.2.0\"\n",
        );

        let home = tmp.path().join("cargo");
        write_record(
            &home,
            &format!("my-app 0.2.0 (path+file://{})", project.display()),
        );

        let locator = Locator::new().with_cargo_home(&home);
        let dir = locator.package_dir("my-app").unwrap();
        assert_eq!(dir, project.join("app").canonicalize().unwrap());
        assert_eq!(locator.module_name("my-app").unwrap(), "my_app");
    }

    #[test]
    fn test_metadata_version_from_install_record() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        write_manifest(
            &project,
            "[workspace]\nmembers = [\"app\"]\n\n[workspace.package]\nversion = \"1.7.0\"\n",
        );
        write_manifest(
            &project.join("app"),
            "[package]\nname = \"my-app\"\nversion.workspace = true\nhomepage = \"https://my.app\"\n",
        );

        let home = tmp.path().join("cargo");
        write_record(
            &home,
            &format!("my-app 1.7.0 (path+file://{})", project.display()),
        );

        let meta = Locator::new().with_cargo_home(&home).metadata("my-app").unwrap();
        assert_eq!(meta.name, "my-app");
        assert_eq!(meta.version, "1.7.0");
        assert_eq!(meta.url(), "https://my.app");
    }

    #[cfg(unix)]
    #[test]
    fn test_editable_install_missing_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("cargo");
        write_record(&home, "gone 0.1.0 (path+file:///definitely/not/here)");

        let locator = Locator::new().with_cargo_home(&home);
        let err = locator.package_dir("gone").unwrap_err();
        assert!(matches!(err, PackageError::NotFound { .. }));
        let cause = err.source().unwrap();
        assert!(cause.to_string().starts_with("failed to read /definitely/not/here"));
    }

    #[test]
    fn test_git_install_is_unlocatable() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("cargo");
        write_record(&home, "from-git 0.1.0 (git+https://example.com/r.git#abc)");

        let err = Locator::new()
            .with_cargo_home(&home)
            .package_dir("from-git")
            .unwrap_err();
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("has no local package directory"));
    }

    #[test]
    fn test_module_name_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("cargo");
        write_record(&home, "other 0.1.0 (registry+https://x)");

        let locator = Locator::new().with_prefix(tmp.path()).with_cargo_home(&home);
        let err = locator.module_name("nonexistent-package").unwrap_err();
        assert!(matches!(err, PackageError::NotFound { .. }));

        let err = locator.metadata("nonexistent-package").unwrap_err();
        assert_eq!(
            err.to_string(),
            "No package metadata was found for nonexistent-package"
        );
    }
}
