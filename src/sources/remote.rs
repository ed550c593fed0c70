//! Remote release lookup.

use semver::Version;
use tracing::debug;

use crate::core::constraint::{parse_version_lenient, ConstraintSet};
use crate::core::variant::Variant;
use crate::sources::feed::{Asset, FeedError, Release, ReleaseFeed};
use crate::sources::locator::LocateError;
use crate::util::config::{RepoSlug, WorkspaceConfig};

/// A remote release selected for installation.
#[derive(Debug, Clone)]
pub struct RemoteCandidate {
    pub version: Version,
    pub tag: String,
    pub asset: Asset,
    pub owner: String,
}

/// Release-feed view of the registered repositories.
pub struct RemoteCatalog<'a> {
    config: &'a WorkspaceConfig,
    feed: &'a dyn ReleaseFeed,
}

impl<'a> RemoteCatalog<'a> {
    pub fn new(config: &'a WorkspaceConfig, feed: &'a dyn ReleaseFeed) -> Self {
        RemoteCatalog { config, feed }
    }

    fn slug_for(&self, package: &str) -> Result<RepoSlug, LocateError> {
        match self.config.repository_for(package) {
            None => Err(LocateError::MissingRepository {
                name: package.to_string(),
            }),
            Some(Err(err)) => Err(LocateError::BadRepositoryUrl {
                name: package.to_string(),
                reason: err.to_string(),
            }),
            Some(Ok(slug)) => Ok(slug),
        }
    }

    fn releases_for(&self, package: &str) -> Result<(RepoSlug, Vec<Release>), LocateError> {
        let slug = self.slug_for(package)?;
        let token = self.config.token_for(&slug.owner);
        let releases = self.feed.list_releases(&slug.owner, &slug.repo, token)?;
        Ok((slug, releases))
    }

    /// Best release of `package` that has an artifact for `variant` and
    /// satisfies `constraint`.
    ///
    /// Prereleases are skipped unless the configured channel allows them.
    pub fn best_release(
        &self,
        package: &str,
        constraint: &ConstraintSet,
        variant: &Variant,
    ) -> Result<RemoteCandidate, LocateError> {
        let (slug, releases) = self.releases_for(package)?;

        let mut candidates = Vec::new();
        for release in &releases {
            let Some(version) = parse_version_lenient(&release.tag) else {
                debug!("{package}: skipping unparsable tag `{}`", release.tag);
                continue;
            };
            let wanted = variant.asset_file_name(package, &release.tag);
            if release.assets.iter().any(|a| a.name == wanted) {
                candidates.push((version, release.prerelease));
            }
        }

        let best = constraint
            .select_best(&candidates, self.config.allows_prerelease())
            .ok_or_else(|| LocateError::NoSatisfyingVersion {
                name: package.to_string(),
                requirement: constraint.to_string(),
            })?;

        // Map the winning version back onto its release and asset.
        for release in releases {
            if parse_version_lenient(&release.tag) != Some(best.clone()) {
                continue;
            }
            let wanted = variant.asset_file_name(package, &release.tag);
            if let Some(asset) = release.assets.into_iter().find(|a| a.name == wanted) {
                return Ok(RemoteCandidate {
                    version: best,
                    tag: release.tag,
                    asset,
                    owner: slug.owner,
                });
            }
        }

        Err(LocateError::NoSatisfyingVersion {
            name: package.to_string(),
            requirement: constraint.to_string(),
        })
    }

    /// Versions of `package` that publish an artifact for either build
    /// configuration of `variant`. Used by the index command.
    pub fn available_versions(
        &self,
        package: &str,
        variant: &Variant,
    ) -> Result<Vec<(Version, bool)>, LocateError> {
        let (_, releases) = self.releases_for(package)?;
        let counterpart = variant.counterpart();

        let mut versions = Vec::new();
        for release in releases {
            let Some(version) = parse_version_lenient(&release.tag) else {
                continue;
            };
            let primary = variant.asset_file_name(package, &release.tag);
            let other = counterpart.asset_file_name(package, &release.tag);
            if release
                .assets
                .iter()
                .any(|a| a.name == primary || a.name == other)
            {
                versions.push((version, release.prerelease));
            }
        }
        versions.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(versions)
    }

    /// Download the selected candidate's artifact into memory.
    pub fn download(&self, candidate: &RemoteCandidate) -> Result<Vec<u8>, FeedError> {
        let token = self.config.token_for(&candidate.owner);
        self.feed.download_asset(&candidate.asset, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::BuildConfig;
    use crate::sources::feed::stub::StubFeed;
    use crate::util::config::RepositoryEntry;

    fn variant() -> Variant {
        Variant {
            os_family: "ubuntu".to_string(),
            os_version: "22.04".to_string(),
            arch: "x86_64".to_string(),
            build_config: BuildConfig::Release,
        }
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
    fn test_best_release_picks_highest_with_asset() {
        let variant = variant();
        let feed = StubFeed::new().with_release("raibo", "v1.0.0", false, &variant);
        let feed = feed.with_release("raibo", "v1.4.0", false, &variant);
        // Highest version has no compatible asset and must be skipped.
        let feed = feed.with_bare_release("raibo", "v2.0.0", false);

        let config = config_with("raibo");
        let catalog = RemoteCatalog::new(&config, &feed);

        let candidate = catalog
            .best_release("raibo", &ConstraintSet::any(), &variant)
            .unwrap();
        assert_eq!(candidate.version, Version::new(1, 4, 0));
        assert_eq!(candidate.tag, "v1.4.0");
    }

    #[test]
    fn test_prereleases_need_devel_channel() {
        let variant = variant();
        let feed = StubFeed::new()
            .with_release("raibo", "v1.0.0", false, &variant)
            .with_release("raibo", "v2.0.0-rc.1", true, &variant);

        let mut config = config_with("raibo");
        let catalog = RemoteCatalog::new(&config, &feed);
        let stable = catalog
            .best_release("raibo", &ConstraintSet::any(), &variant)
            .unwrap();
        assert_eq!(stable.version, Version::new(1, 0, 0));

        config.channel = crate::util::config::Channel::Devel;
        let catalog = RemoteCatalog::new(&config, &feed);
        let devel = catalog
            .best_release("raibo", &ConstraintSet::any(), &variant)
            .unwrap();
        assert_eq!(devel.version.to_string(), "2.0.0-rc.1");
    }

    #[test]
    fn test_unregistered_package_is_missing_repository() {
        let feed = StubFeed::new();
        let config = WorkspaceConfig::default();
        let catalog = RemoteCatalog::new(&config, &feed);

        let err = catalog
            .best_release("ghost", &ConstraintSet::any(), &variant())
            .unwrap_err();
        assert!(matches!(err, LocateError::MissingRepository { .. }));
    }

    #[test]
    fn test_no_matching_version() {
        let variant = variant();
        let feed = StubFeed::new().with_release("raibo", "v1.0.0", false, &variant);
        let config = config_with("raibo");
        let catalog = RemoteCatalog::new(&config, &feed);

        let constraint = ConstraintSet::parse(">=2.0.0").unwrap();
        let err = catalog
            .best_release("raibo", &constraint, &variant)
            .unwrap_err();
        assert!(matches!(err, LocateError::NoSatisfyingVersion { .. }));
    }
}
