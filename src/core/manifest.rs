//! Package manifest (`release.toml`) loading and parsing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::constraint::{parse_version_lenient, ConstraintError, DependencySpec};

/// Name of the manifest file that rides with every package.
pub const MANIFEST_FILE_NAME: &str = "release.toml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid version `{version}` in manifest at {path}")]
    InvalidVersion { path: PathBuf, version: String },
}

/// A parsed `release.toml`. Immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageManifest {
    /// Semantic version of the package, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Requirement strings, e.g. `raibo_msgs>=1.0.0,<2.0.0`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// OS-level packages the build environment must provide.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub system_packages: BTreeSet<String>,
}

impl PackageManifest {
    /// Load and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the manifest inside `dir`, returning `None` if the file is absent.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>, ManifestError> {
        let path = dir.join(MANIFEST_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// The declared version parsed as semver, if any.
    ///
    /// A declared but unparsable version is an error; tags like `v1.2` are
    /// accepted leniently.
    pub fn version(&self, path: &Path) -> Result<Option<Version>, ManifestError> {
        match &self.version {
            None => Ok(None),
            Some(raw) => parse_version_lenient(raw)
                .map(Some)
                .ok_or_else(|| ManifestError::InvalidVersion {
                    path: path.to_path_buf(),
                    version: raw.clone(),
                }),
        }
    }

    /// Parse every dependency requirement string.
    pub fn dependency_specs(&self) -> Result<Vec<DependencySpec>, ConstraintError> {
        self.dependencies
            .iter()
            .map(|token| DependencySpec::parse(token))
            .collect()
    }

    /// Serialize and write the manifest into `dir`.
    pub fn save_to_dir(&self, dir: &Path) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(dir.join(MANIFEST_FILE_NAME), text)?;
        Ok(())
    }
}
