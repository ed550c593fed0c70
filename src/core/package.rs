//! Resolved package records.

use std::fmt;

use semver::Version;

use crate::core::manifest::PackageManifest;

/// Where a resolved package came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Already unpacked under `install/`.
    Cache,
    /// A source checkout under `src/`, built locally.
    LocalSource,
    /// Downloaded from the release feed this run.
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Origin::Cache => "cache",
            Origin::LocalSource => "source",
            Origin::Remote => "remote",
        };
        f.write_str(s)
    }
}

/// A package pinned to a concrete version and origin.
///
/// `version` is `None` for cache or source hits that carry no manifest,
/// which the resolver accepts when the requirement is unconstrained.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Option<Version>,
    pub origin: Origin,
    pub manifest: Option<PackageManifest>,
}

impl ResolvedPackage {
    pub fn display_version(&self) -> String {
        match &self.version {
            Some(v) => v.to_string(),
            None => "unversioned".to_string(),
        }
    }
}
