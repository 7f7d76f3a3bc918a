//! Package metadata
//!
//! Name, version and project URLs of a package, either captured at compile
//! time with [`package_metadata!`](crate::package_metadata) or read from an
//! installed package's `Cargo.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::sitepackage::{Locator, PackageError};

/// Metadata describing one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// `package.homepage`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// `package.repository`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl PackageMetadata {
    /// Create metadata without URLs
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            homepage: None,
            repository: None,
        }
    }

    /// Build from the strings cargo exposes through `CARGO_PKG_*`.
    ///
    /// Cargo sets unset fields to the empty string; those become `None`.
    pub fn from_cargo_env(name: &str, version: &str, homepage: &str, repository: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            homepage: non_empty(homepage),
            repository: non_empty(repository),
        }
    }

    /// Set the homepage
    pub fn with_homepage(mut self, url: impl Into<String>) -> Self {
        self.homepage = Some(url.into());
        self
    }

    /// Set the repository
    pub fn with_repository(mut self, url: impl Into<String>) -> Self {
        self.repository = Some(url.into());
        self
    }

    /// Homepage, else repository, else empty
    pub fn url(&self) -> &str {
        self.homepage
            .as_deref()
            .or(self.repository.as_deref())
            .unwrap_or("")
    }

    /// Read the `[package]` table of a `Cargo.toml`.
    ///
    /// Fields inherited from a workspace (`version.workspace = true`) are
    /// treated as absent; a missing version reads as `"0.0.0"`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid TOML, or has no
    /// `[package]` table.
    pub fn from_manifest(path: &Path) -> Result<Self, PackageError> {
        Self::from_manifest_or(path, || None)
    }

    /// Like [`PackageMetadata::from_manifest`], taking the version from
    /// `fallback` when the manifest has none of its own.
    ///
    /// # Errors
    ///
    /// See [`PackageMetadata::from_manifest`].
    pub fn from_manifest_or(
        path: &Path,
        fallback: impl FnOnce() -> Option<String>,
    ) -> Result<Self, PackageError> {
        let package = read_manifest(path)?;
        let version = package
            .version
            .and_then(Field::into_value)
            .or_else(fallback)
            .unwrap_or_else(|| "0.0.0".to_string());
        Ok(Self {
            name: package.name,
            version,
            homepage: package.homepage.and_then(Field::into_value),
            repository: package.repository.and_then(Field::into_value),
        })
    }

    /// Look up an installed package by distribution name.
    ///
    /// # Errors
    ///
    /// [`PackageError::MetadataNotFound`] when no package of that name can be
    /// located.
    pub fn lookup(distribution: &str) -> Result<Self, PackageError> {
        Locator::from_env().metadata(distribution)
    }
}

/// Capture the calling crate's metadata at compile time.
///
/// ```
/// let meta = clapx::package_metadata!();
/// assert_eq!(meta.name, "clapx");
/// ```
#[macro_export]
macro_rules! package_metadata {
    () => {
        $crate::PackageMetadata::from_cargo_env(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_HOMEPAGE"),
            env!("CARGO_PKG_REPOSITORY"),
        )
    };
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// A manifest field that is either a literal or `{ workspace = true }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Field {
    Value(String),
    #[allow(dead_code)]
    Inherited { workspace: bool },
}

impl Field {
    fn into_value(self) -> Option<String> {
        match self {
            Field::Value(v) => Some(v),
            Field::Inherited { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ManifestPackage {
    pub name: String,
    #[serde(default)]
    pub version: Option<Field>,
    #[serde(default)]
    pub homepage: Option<Field>,
    #[serde(default)]
    pub repository: Option<Field>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ManifestLib {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Manifest {
    pub package: Option<ManifestPackage>,
    #[serde(default)]
    pub lib: Option<ManifestLib>,
}

pub(crate) fn parse_manifest(path: &Path) -> Result<Manifest, PackageError> {
    let content = std::fs::read_to_string(path).map_err(|source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| PackageError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

fn read_manifest(path: &Path) -> Result<ManifestPackage, PackageError> {
    parse_manifest(path)?
        .package
        .ok_or_else(|| PackageError::NoPackage(path.to_path_buf()))
}
