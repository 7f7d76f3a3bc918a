//! Cargo install records
//!
//! `cargo install` keeps a JSON ledger of everything it installed in
//! `$CARGO_HOME/.crates2.json`. Keys look like
//! `"ripgrep 14.1.0 (registry+https://github.com/rust-lang/crates.io-index)"`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use super::sitepackage::PackageError;

/// File name of the install ledger inside the cargo home
pub const INSTALL_RECORD: &str = ".crates2.json";

#[derive(Debug, Deserialize)]
struct Crates2 {
    #[serde(default)]
    installs: BTreeMap<String, InstallInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct InstallInfo {
    #[serde(default)]
    bins: Vec<String>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    profile: Option<String>,
}

/// Where an installed package came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// A registry, usually crates.io
    Registry(String),
    /// A local path (`cargo install --path`)
    Path(PathBuf),
    /// A git repository
    Git(String),
    /// Anything else cargo may record
    Other(String),
}

impl PackageSource {
    /// Parse a cargo source id such as `path+file:///home/me/proj`.
    pub fn parse(source: &str) -> Self {
        if let Some(url) = source.strip_prefix("registry+") {
            Self::Registry(url.to_string())
        } else if let Some(url) = source.strip_prefix("sparse+") {
            Self::Registry(url.to_string())
        } else if let Some(url) = source.strip_prefix("git+") {
            Self::Git(url.to_string())
        } else if let Some(url) = source.strip_prefix("path+") {
            match file_url_to_path(url) {
                Some(path) => Self::Path(path),
                None => Self::Other(source.to_string()),
            }
        } else {
            Self::Other(source.to_string())
        }
    }

    /// Is this a local path install?
    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_))
    }
}

/// One entry of the install ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Package name as published
    pub name: String,
    /// Installed version
    pub version: String,
    /// Origin of the package
    pub source: PackageSource,
    /// Binaries cargo placed in `$CARGO_HOME/bin`
    pub bins: Vec<String>,
    /// Features enabled at install time
    pub features: Vec<String>,
    /// Build profile
    pub profile: Option<String>,
}

impl InstalledPackage {
    fn from_entry(key: &str, info: InstallInfo) -> Option<Self> {
        let (name, rest) = key.split_once(' ')?;
        let (version, source) = rest.split_once(' ')?;
        let source = source.strip_prefix('(')?.strip_suffix(')')?;
        Some(Self {
            name: name.to_string(),
            version: version.to_string(),
            source: PackageSource::parse(source),
            bins: info.bins,
            features: info.features,
            profile: info.profile,
        })
    }

    /// Name of the unpacked registry source directory, `<name>-<version>`
    pub fn source_dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Parsed `.crates2.json`
#[derive(Debug, Clone, Default)]
pub struct InstallManifest {
    packages: Vec<InstalledPackage>,
}

impl InstallManifest {
    /// Parse the ledger from its JSON text.
    ///
    /// Entries whose key does not follow cargo's `name version (source)`
    /// shape are skipped.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let crates: Crates2 = serde_json::from_str(json)?;
        let packages = crates
            .installs
            .into_iter()
            .filter_map(|(key, info)| {
                let parsed = InstalledPackage::from_entry(&key, info);
                if parsed.is_none() {
                    tracing::debug!("skipping malformed install record key '{}'", key);
                }
                parsed
            })
            .collect();
        Ok(Self { packages })
    }

    /// Load `<cargo_home>/.crates2.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Io`] when the file cannot be read and
    /// [`PackageError::Record`] when it is not valid JSON.
    pub fn load(cargo_home: &Path) -> Result<Self, PackageError> {
        let path = cargo_home.join(INSTALL_RECORD);
        let content = std::fs::read_to_string(&path).map_err(|source| PackageError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| PackageError::Record { path, source })
    }

    /// Find an installed package, ignoring case and `-`/`_` differences.
    pub fn find(&self, name: &str) -> Option<&InstalledPackage> {
        let wanted = normalize_name(name);
        self.packages
            .iter()
            .find(|p| normalize_name(&p.name) == wanted)
    }

    /// All recorded packages
    pub fn packages(&self) -> &[InstalledPackage] {
        &self.packages
    }
}

/// Canonical form used for package name comparisons
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

/// Turn a `file://` URL into a filesystem path, decoding `%XX` escapes.
pub fn file_url_to_path(url: &str) -> Option<PathBuf> {
    let url = Url::parse(url).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEDGER: &str = r#"{
        "installs": {
            "ripgrep 14.1.0 (registry+https://github.com/rust-lang/crates.io-index)": {
                "version_req": null,
                "bins": ["rg"],
                "features": [],
                "all_features": false,
                "no_default_features": false,
                "profile": "release",
                "target": "x86_64-unknown-linux-gnu",
                "rustc": "rustc 1.80.0"
            },
            "my-tool 0.3.0 (path+file:///home/me/my%20tool)": {
                "bins": ["my-tool"]
            },
            "garbage": {}
        }
    }"#;

    #[test]
    fn test_parse_ledger() {
        let manifest = InstallManifest::parse(LEDGER).unwrap();
        assert_eq!(manifest.packages().len(), 2);

        let rg = manifest.find("ripgrep").unwrap();
        assert_eq!(rg.version, "14.1.0");
        assert_eq!(rg.bins, vec!["rg".to_string()]);
        assert_eq!(rg.source_dir_name(), "ripgrep-14.1.0");
        assert!(matches!(rg.source, PackageSource::Registry(_)));
    }

    #[test]
    fn test_find_normalizes_names() {
        let manifest = InstallManifest::parse(LEDGER).unwrap();
        assert!(manifest.find("my_tool").is_some());
        assert!(manifest.find("My-Tool").is_some());
        assert!(manifest.find("nonexistent").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_path_source_is_decoded() {
        let manifest = InstallManifest::parse(LEDGER).unwrap();
        let tool = manifest.find("my-tool").unwrap();
        assert_eq!(tool.source, PackageSource::Path(PathBuf::from("/home/me/my tool")));
        assert!(tool.source.is_path());
    }

    #[test]
    fn test_source_kinds() {
        assert!(matches!(
            PackageSource::parse("git+https://github.com/a/b#abc"),
            PackageSource::Git(_)
        ));
        assert!(matches!(
            PackageSource::parse("sparse+https://index.crates.io/"),
            PackageSource::Registry(_)
        ));
        assert!(matches!(PackageSource::parse("weird"), PackageSource::Other(_)));
    }

    #[test]
    fn test_not_a_file_url() {
        assert!(file_url_to_path("http://example.com").is_none());
        assert!(file_url_to_path("not a url").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url_hosts() {
        assert_eq!(
            file_url_to_path("file://localhost/tmp/x"),
            Some(PathBuf::from("/tmp/x"))
        );
        assert_eq!(file_url_to_path("file:///tmp/a%20b"), Some(PathBuf::from("/tmp/a b")));
        assert!(file_url_to_path("file://remote-host/tmp/x").is_none());
    }
}
