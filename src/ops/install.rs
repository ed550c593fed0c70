//! Install resolution.
//!
//! A [`ResolverSession`] owns the whole state of one resolution run: the
//! breadth-first work queue, the per-name outcome map, and the aggregate
//! success flag. One session per run; the workspace assumes a single writer.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info, warn};

use crate::core::constraint::DependencySpec;
use crate::core::manifest::PackageManifest;
use crate::core::package::{Origin, ResolvedPackage};
use crate::core::variant::Variant;
use crate::core::workspace::Workspace;
use crate::sources::feed::ReleaseFeed;
use crate::sources::locator::{Candidate, LocalHit, LocateError, SourceLocator};
use crate::util::config::WorkspaceConfig;
use crate::util::fs;

/// Final state of one package in a resolution run.
#[derive(Debug, Clone)]
pub enum Outcome {
    Satisfied(ResolvedPackage),
    Conflict {
        found: String,
        requirement: String,
    },
    Failed {
        reason: String,
    },
}

/// Aggregate result of a resolution run.
#[derive(Debug, Default)]
pub struct InstallReport {
    outcomes: BTreeMap<String, Outcome>,
    success: bool,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.outcomes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn outcome_for(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.get(name)
    }
}

/// One resolution run over a workspace.
pub struct ResolverSession<'a> {
    workspace: &'a Workspace,
    locator: SourceLocator<'a>,
    variant: &'a Variant,
    queue: VecDeque<DependencySpec>,
    outcomes: BTreeMap<String, Outcome>,
    success: bool,
}

impl<'a> ResolverSession<'a> {
    pub fn new(
        workspace: &'a Workspace,
        config: &'a WorkspaceConfig,
        feed: &'a dyn ReleaseFeed,
        variant: &'a Variant,
    ) -> Self {
        ResolverSession {
            workspace,
            locator: SourceLocator::new(workspace, config, feed, variant),
            variant,
            queue: VecDeque::new(),
            outcomes: BTreeMap::new(),
            success: true,
        }
    }

    /// Resolve the requested requirement strings plus every source checkout
    /// in the workspace.
    ///
    /// Failures are per-package; the run continues past them and they only
    /// clear the aggregate success flag. The install tree is mutated
    /// incrementally and is not rolled back on failure.
    pub fn run(mut self, requested: &[String]) -> anyhow::Result<InstallReport> {
        for token in requested {
            match DependencySpec::parse(token) {
                Ok(spec) => self.queue.push_back(spec),
                Err(err) => self.fail(token.trim(), err.to_string()),
            }
        }
        for name in self.workspace.discover_source_packages()? {
            self.queue.push_back(DependencySpec {
                name,
                constraint: Default::default(),
            });
        }

        while let Some(spec) = self.queue.pop_front() {
            self.resolve_one(&spec);
        }

        Ok(InstallReport {
            outcomes: self.outcomes,
            success: self.success,
        })
    }

    fn resolve_one(&mut self, spec: &DependencySpec) {
        if self.outcomes.contains_key(&spec.name) {
            // First resolution wins; later requirements for the same name
            // are not re-checked.
            debug!("{}: already resolved, skipping", spec.name);
            return;
        }

        match self.locator.locate(&spec.name, &spec.constraint) {
            Ok(Candidate::Cache(hit)) => self.accept_local(spec, Origin::Cache, hit),
            Ok(Candidate::LocalSource(hit)) => self.accept_local(spec, Origin::LocalSource, hit),
            Ok(Candidate::Remote(candidate)) => self.install_remote(spec, candidate),
            Err(LocateError::Conflict {
                name,
                found,
                requirement,
            }) => {
                warn!("{name}: version {found} conflicts with `{requirement}`");
                self.outcomes
                    .insert(name, Outcome::Conflict { found, requirement });
                self.success = false;
            }
            Err(err) => self.fail(&spec.name, err.to_string()),
        }
    }

    fn accept_local(&mut self, spec: &DependencySpec, origin: Origin, hit: LocalHit) {
        let package = ResolvedPackage {
            name: spec.name.clone(),
            version: hit.version,
            origin,
            manifest: hit.manifest,
        };
        info!("{} {} ({origin})", package.name, package.display_version());

        if let Some(manifest) = &package.manifest {
            self.enqueue_dependencies(manifest);
        }
        self.outcomes
            .insert(spec.name.clone(), Outcome::Satisfied(package));
    }

    fn install_remote(
        &mut self,
        spec: &DependencySpec,
        candidate: crate::sources::remote::RemoteCandidate,
    ) {
        info!(
            "{} {}: downloading {}",
            spec.name, candidate.version, candidate.asset.name
        );

        let bar = indicatif::ProgressBar::new_spinner().with_message(candidate.asset.name.clone());
        let data = match self.locator.catalog().download(&candidate) {
            Ok(data) => data,
            Err(err) => {
                bar.finish_and_clear();
                self.fail(&spec.name, err.to_string());
                return;
            }
        };
        bar.finish_and_clear();

        let dest = self.workspace.installed_dir(&spec.name, self.variant);
        let unpack = fs::remove_dir_all_if_exists(&dest).and_then(|_| {
            fs::extract_tar_gz(&data, &dest)
        });
        if let Err(err) = unpack {
            self.fail(&spec.name, format!("{err:#}"));
            return;
        }

        // The manifest rides with the artifact; synthesize one from the tag
        // when a package publishes without it, so the cache stays
        // self-describing.
        let manifest = match PackageManifest::load_from_dir(&dest) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                let manifest = PackageManifest {
                    version: Some(candidate.version.to_string()),
                    ..Default::default()
                };
                if let Err(err) = manifest.save_to_dir(&dest) {
                    self.fail(&spec.name, format!("{err:#}"));
                    return;
                }
                manifest
            }
            Err(err) => {
                self.fail(&spec.name, err.to_string());
                return;
            }
        };

        self.enqueue_dependencies(&manifest);
        self.outcomes.insert(
            spec.name.clone(),
            Outcome::Satisfied(ResolvedPackage {
                name: spec.name.clone(),
                version: Some(candidate.version),
                origin: Origin::Remote,
                manifest: Some(manifest),
            }),
        );
    }

    fn enqueue_dependencies(&mut self, manifest: &PackageManifest) {
        for token in &manifest.dependencies {
            match DependencySpec::parse(token) {
                Ok(spec) => self.queue.push_back(spec),
                Err(err) => self.fail(token.trim(), err.to_string()),
            }
        }
    }

    fn fail(&mut self, name: &str, reason: String) {
        warn!("{name}: {reason}");
        self.outcomes
            .insert(name.to_string(), Outcome::Failed { reason });
        self.success = false;
    }
}
