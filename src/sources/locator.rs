//! Source probing in fixed priority order: cache, then local source, then
//! the remote release feed.

use std::path::Path;

use semver::Version;
use thiserror::Error;
use tracing::debug;

use crate::core::constraint::ConstraintSet;
use crate::core::manifest::{ManifestError, PackageManifest};
use crate::core::variant::Variant;
use crate::core::workspace::Workspace;
use crate::sources::feed::{FeedError, ReleaseFeed};
use crate::sources::remote::{RemoteCandidate, RemoteCatalog};
use crate::util::config::WorkspaceConfig;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("package `{name}` at version {found} conflicts with requirement `{requirement}`")]
    Conflict {
        name: String,
        found: String,
        requirement: String,
    },

    #[error("no repository registered for package `{name}`")]
    MissingRepository { name: String },

    #[error("repository URL for package `{name}` is invalid: {reason}")]
    BadRepositoryUrl { name: String, reason: String },

    #[error("no version of `{name}` satisfies `{requirement}`")]
    NoSatisfyingVersion { name: String, requirement: String },

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// A cache or source directory accepted for a requirement.
#[derive(Debug, Clone)]
pub struct LocalHit {
    pub version: Option<Version>,
    pub manifest: Option<PackageManifest>,
}

/// Result of probing all sources for one requirement.
#[derive(Debug, Clone)]
pub enum Candidate {
    Cache(LocalHit),
    LocalSource(LocalHit),
    Remote(RemoteCandidate),
}

enum Probe {
    Absent,
    Hit(LocalHit),
    Mismatch { found: String },
}

/// Check a package directory against a requirement.
///
/// A directory with no manifest is acceptable only for an unconstrained
/// requirement. A manifest whose version cannot be parsed behaves the same
/// as a missing version.
fn probe_dir(dir: &Path, constraint: &ConstraintSet) -> Result<Probe, ManifestError> {
    if !dir.is_dir() {
        return Ok(Probe::Absent);
    }

    let manifest = PackageManifest::load_from_dir(dir)?;

    let version = match &manifest {
        None => None,
        Some(m) => match m.version(dir) {
            Ok(v) => v,
            Err(err) => {
                debug!("ignoring stored version in `{}`: {err}", dir.display());
                None
            }
        },
    };

    match version {
        Some(v) if constraint.satisfies(&v) => Ok(Probe::Hit(LocalHit {
            version: Some(v),
            manifest,
        })),
        Some(v) => Ok(Probe::Mismatch {
            found: v.to_string(),
        }),
        None if constraint.is_unconstrained() => Ok(Probe::Hit(LocalHit {
            version: None,
            manifest,
        })),
        None => Ok(Probe::Mismatch {
            found: "unversioned".to_string(),
        }),
    }
}

/// Probes the three sources in priority order for one requirement.
pub struct SourceLocator<'a> {
    workspace: &'a Workspace,
    catalog: RemoteCatalog<'a>,
    variant: &'a Variant,
}

impl<'a> SourceLocator<'a> {
    pub fn new(
        workspace: &'a Workspace,
        config: &'a WorkspaceConfig,
        feed: &'a dyn ReleaseFeed,
        variant: &'a Variant,
    ) -> Self {
        SourceLocator {
            workspace,
            catalog: RemoteCatalog::new(config, feed),
            variant,
        }
    }

    pub fn catalog(&self) -> &RemoteCatalog<'a> {
        &self.catalog
    }

    /// Resolve one requirement to a candidate.
    ///
    /// An invalid cache entry falls through to the next source. A local
    /// source checkout that fails the requirement is a hard conflict and
    /// never falls through to remote.
    pub fn locate(&self, name: &str, constraint: &ConstraintSet) -> Result<Candidate, LocateError> {
        let cache_dir = self.workspace.installed_dir(name, self.variant);
        match probe_dir(&cache_dir, constraint)? {
            Probe::Hit(hit) => {
                debug!("{name}: satisfied from cache");
                return Ok(Candidate::Cache(hit));
            }
            Probe::Mismatch { found } => {
                debug!("{name}: cached {found} does not satisfy `{constraint}`, falling through");
            }
            Probe::Absent => {}
        }

        let source_dir = self.workspace.package_source_dir(name);
        match probe_dir(&source_dir, constraint)? {
            Probe::Hit(hit) => {
                debug!("{name}: satisfied from local source");
                return Ok(Candidate::LocalSource(hit));
            }
            Probe::Mismatch { found } => {
                return Err(LocateError::Conflict {
                    name: name.to_string(),
                    found,
                    requirement: constraint.to_string(),
                });
            }
            Probe::Absent => {}
        }

        let candidate = self.catalog.best_release(name, constraint, self.variant)?;
        debug!("{name}: satisfied from remote release {}", candidate.tag);
        Ok(Candidate::Remote(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::BuildConfig;
    use crate::core::workspace::CONFIG_FILE_NAME;
    use crate::sources::feed::stub::StubFeed;
    use crate::util::config::RepositoryEntry;
    use tempfile::TempDir;

    fn variant() -> Variant {
        Variant {
            os_family: "ubuntu".to_string(),
            os_version: "22.04".to_string(),
            arch: "x86_64".to_string(),
            build_config: BuildConfig::Release,
        }
    }

    fn workspace(dir: &TempDir) -> Workspace {
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        Workspace::find(dir.path()).unwrap()
    }

    fn write_manifest(dir: &Path, version: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("release.toml"),
            format!("version = \"{version}\"\n"),
        )
        .unwrap();
    }

    fn config_with(package: &str) -> WorkspaceConfig {
        let mut config = WorkspaceConfig::default();
        config.repositories.insert(
            package.to_string(),
            RepositoryEntry {
                url: format!("git@github.com:acme/{package}.git"),
            },
        );
        config
    }

    #[test]
    fn test_cache_wins_over_remote_without_network() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let variant = variant();
        write_manifest(&ws.installed_dir("raibo", &variant), "1.0.0");

        // Remote has a newer version, but the cache hit must short-circuit.
        let feed = StubFeed::new().with_release("raibo", "v2.0.0", false, &variant);
        let config = config_with("raibo");
        let locator = SourceLocator::new(&ws, &config, &feed, &variant);

        let candidate = locator.locate("raibo", &ConstraintSet::any()).unwrap();
        assert!(matches!(candidate, Candidate::Cache(_)));
        assert_eq!(feed.list_calls(), 0);
        assert_eq!(feed.download_calls(), 0);
    }

    #[test]
    fn test_invalid_cache_falls_through_to_source() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let variant = variant();
        write_manifest(&ws.installed_dir("raibo", &variant), "0.5.0");
        write_manifest(&ws.package_source_dir("raibo"), "1.2.0");

        let feed = StubFeed::new();
        let config = WorkspaceConfig::default();
        let locator = SourceLocator::new(&ws, &config, &feed, &variant);

        let constraint = ConstraintSet::parse(">=1.0.0").unwrap();
        let candidate = locator.locate("raibo", &constraint).unwrap();
        match candidate {
            Candidate::LocalSource(hit) => {
                assert_eq!(hit.version, Some(semver::Version::new(1, 2, 0)));
            }
            other => panic!("expected local source hit, got {other:?}"),
        }
    }

    #[test]
    fn test_source_mismatch_is_hard_conflict() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let variant = variant();
        write_manifest(&ws.package_source_dir("raibo"), "1.0.0");

        // A satisfying remote release exists but must not be consulted.
        let feed = StubFeed::new().with_release("raibo", "v2.0.0", false, &variant);
        let config = config_with("raibo");
        let locator = SourceLocator::new(&ws, &config, &feed, &variant);

        let constraint = ConstraintSet::parse(">=2.0.0").unwrap();
        let err = locator.locate("raibo", &constraint).unwrap_err();
        match err {
            LocateError::Conflict { name, found, .. } => {
                assert_eq!(name, "raibo");
                assert_eq!(found, "1.0.0");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(feed.list_calls(), 0);
    }

    #[test]
    fn test_manifest_less_dir_needs_unconstrained_requirement() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let variant = variant();
        std::fs::create_dir_all(ws.installed_dir("raibo", &variant)).unwrap();

        let feed = StubFeed::new();
        let config = WorkspaceConfig::default();
        let locator = SourceLocator::new(&ws, &config, &feed, &variant);

        let candidate = locator.locate("raibo", &ConstraintSet::any()).unwrap();
        match candidate {
            Candidate::Cache(hit) => assert!(hit.version.is_none()),
            other => panic!("expected cache hit, got {other:?}"),
        }
    }

    #[test]
    fn test_total_miss_without_repository() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let variant = variant();

        let feed = StubFeed::new();
        let config = WorkspaceConfig::default();
        let locator = SourceLocator::new(&ws, &config, &feed, &variant);

        let err = locator.locate("ghost", &ConstraintSet::any()).unwrap_err();
        assert!(matches!(err, LocateError::MissingRepository { .. }));
    }
}
