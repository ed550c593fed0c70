//! Offline consistency validation.
//!
//! Two parallel phases with a collect barrier between them. Phase 1 parses
//! every discovered manifest; the collected results build a read-only
//! package database. Phase 2 classifies each dependency against that
//! database and never reads another package's phase-2 output.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rayon::prelude::*;
use semver::Version;
use walkdir::WalkDir;

use crate::core::constraint::DependencySpec;
use crate::core::manifest::{PackageManifest, MANIFEST_FILE_NAME};
use crate::core::variant::Variant;
use crate::core::workspace::Workspace;

/// Where a validated manifest was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestOrigin {
    Source,
    Installed,
}

impl ManifestOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestOrigin::Source => "source",
            ManifestOrigin::Installed => "installed",
        }
    }
}

/// Classification of one dependency requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepStatus {
    Ok,
    Missing,
    WrongVersion { found: String },
    InvalidSpec,
}

/// One package's validation result.
#[derive(Debug, Clone)]
pub struct ValidationRow {
    pub name: String,
    pub version: Option<Version>,
    pub origin: ManifestOrigin,
    /// Set when the manifest itself failed to parse; `deps` is empty then.
    pub error: Option<String>,
    pub deps: Vec<(String, DepStatus)>,
}

impl ValidationRow {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.deps.iter().all(|(_, s)| *s == DepStatus::Ok)
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub rows: Vec<ValidationRow>,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.rows.iter().all(ValidationRow::is_ok)
    }

    pub fn row(&self, name: &str) -> Option<&ValidationRow> {
        self.rows.iter().find(|r| r.name == name)
    }
}

struct Target {
    name: String,
    manifest_path: PathBuf,
    origin: ManifestOrigin,
}

struct Parsed {
    name: String,
    version: Option<Version>,
    origin: ManifestOrigin,
    error: Option<String>,
    deps: Vec<String>,
}

/// Everything phase 2 reads. Built once from the phase-1 rows.
struct PackageDb {
    versions: BTreeMap<String, Option<Version>>,
}

impl PackageDb {
    fn build(parsed: &[Parsed]) -> Self {
        let mut versions = BTreeMap::new();
        for row in parsed.iter().filter(|r| r.error.is_none()) {
            versions
                .entry(row.name.clone())
                .or_insert_with(|| row.version.clone());
        }
        PackageDb { versions }
    }

    fn classify(&self, token: &str) -> (String, DepStatus) {
        let status = match DependencySpec::parse(token) {
            Err(_) => DepStatus::InvalidSpec,
            Ok(spec) => match self.versions.get(&spec.name) {
                None => DepStatus::Missing,
                Some(Some(version)) if spec.constraint.satisfies(version) => DepStatus::Ok,
                Some(Some(version)) => DepStatus::WrongVersion {
                    found: version.to_string(),
                },
                Some(None) if spec.constraint.is_unconstrained() => DepStatus::Ok,
                Some(None) => DepStatus::WrongVersion {
                    found: "unversioned".to_string(),
                },
            },
        };
        (token.to_string(), status)
    }
}

/// Validate every discovered package manifest in the workspace.
pub fn validate_workspace(workspace: &Workspace, variant: &Variant) -> anyhow::Result<ValidationReport> {
    let targets = discover_targets(workspace, variant)?;

    let parsed: Vec<Parsed> = targets.par_iter().map(parse_target).collect();

    let db = PackageDb::build(&parsed);

    let rows = parsed
        .par_iter()
        .map(|p| ValidationRow {
            name: p.name.clone(),
            version: p.version.clone(),
            origin: p.origin,
            error: p.error.clone(),
            deps: p.deps.iter().map(|token| db.classify(token)).collect(),
        })
        .collect();

    Ok(ValidationReport { rows })
}

fn parse_target(target: &Target) -> Parsed {
    match PackageManifest::load(&target.manifest_path) {
        Err(err) => Parsed {
            name: target.name.clone(),
            version: None,
            origin: target.origin,
            error: Some(err.to_string()),
            deps: Vec::new(),
        },
        Ok(manifest) => {
            let (version, error) = match manifest.version(&target.manifest_path) {
                Ok(v) => (v, None),
                Err(err) => (None, Some(err.to_string())),
            };
            Parsed {
                name: target.name.clone(),
                version,
                origin: target.origin,
                error,
                deps: manifest.dependencies.clone(),
            }
        }
    }
}

/// Source checkouts first, then installed trees for names not already seen.
fn discover_targets(workspace: &Workspace, variant: &Variant) -> anyhow::Result<Vec<Target>> {
    let mut targets = Vec::new();

    for name in workspace.discover_source_packages()? {
        let path = workspace.package_source_dir(&name).join(MANIFEST_FILE_NAME);
        if path.is_file() {
            targets.push(Target {
                name,
                manifest_path: path,
                origin: ManifestOrigin::Source,
            });
        }
    }

    for name in workspace.discover_installed_packages()? {
        if targets.iter().any(|t| t.name == name) {
            continue;
        }
        if let Some(path) = find_installed_manifest(workspace, &name, variant) {
            targets.push(Target {
                name,
                manifest_path: path,
                origin: ManifestOrigin::Installed,
            });
        }
    }

    Ok(targets)
}

/// Prefer the current variant's manifest; fall back to any variant of the
/// package that has one.
fn find_installed_manifest(
    workspace: &Workspace,
    name: &str,
    variant: &Variant,
) -> Option<PathBuf> {
    let exact = workspace
        .installed_dir(name, variant)
        .join(MANIFEST_FILE_NAME);
    if exact.is_file() {
        return Some(exact);
    }

    WalkDir::new(workspace.install_root().join(name))
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME)
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::BuildConfig;
    use crate::core::workspace::CONFIG_FILE_NAME;
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

    fn write_source_manifest(ws: &Workspace, name: &str, body: &str) {
        let dir = ws.package_source_dir(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE_NAME), body).unwrap();
    }

    fn status_of<'a>(row: &'a ValidationRow, token: &str) -> &'a DepStatus {
        &row.deps.iter().find(|(t, _)| t == token).unwrap().1
    }

    #[test]
    fn test_classification_matrix() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        write_source_manifest(&ws, "x", "version = \"1.2.0\"\n");
        write_source_manifest(
            &ws,
            "consumer",
            r#"
version = "0.1.0"
dependencies = ["x>=1.0.0", "x>=2.0.0", "missing_pkg", "x>>oops"]
"#,
        );

        let report = validate_workspace(&ws, &variant()).unwrap();
        assert!(!report.is_consistent());

        let row = report.row("consumer").unwrap();
        assert_eq!(*status_of(row, "x>=1.0.0"), DepStatus::Ok);
        assert_eq!(
            *status_of(row, "x>=2.0.0"),
            DepStatus::WrongVersion {
                found: "1.2.0".to_string()
            }
        );
        assert_eq!(*status_of(row, "missing_pkg"), DepStatus::Missing);
        assert_eq!(*status_of(row, "x>>oops"), DepStatus::InvalidSpec);

        assert!(report.row("x").unwrap().is_ok());
    }

    #[test]
    fn test_consistent_workspace() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        write_source_manifest(&ws, "base", "version = \"1.0.0\"\n");
        write_source_manifest(
            &ws,
            "app",
            "version = \"2.0.0\"\ndependencies = [\"base>=1.0.0,<2.0.0\"]\n",
        );

        let report = validate_workspace(&ws, &variant()).unwrap();
        assert!(report.is_consistent());
    }

    #[test]
    fn test_installed_manifests_cover_unseen_names() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let variant = variant();

        write_source_manifest(&ws, "app", "dependencies = [\"libfoo>=1.0.0\"]\n");

        let installed = ws.installed_dir("libfoo", &variant);
        std::fs::create_dir_all(&installed).unwrap();
        std::fs::write(installed.join(MANIFEST_FILE_NAME), "version = \"1.4.0\"\n").unwrap();

        let report = validate_workspace(&ws, &variant).unwrap();
        assert!(report.is_consistent());

        let row = report.row("libfoo").unwrap();
        assert_eq!(row.origin, ManifestOrigin::Installed);
    }

    #[test]
    fn test_source_shadows_installed_copy() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let variant = variant();

        write_source_manifest(&ws, "libfoo", "version = \"2.0.0\"\n");
        let installed = ws.installed_dir("libfoo", &variant);
        std::fs::create_dir_all(&installed).unwrap();
        std::fs::write(installed.join(MANIFEST_FILE_NAME), "version = \"1.0.0\"\n").unwrap();

        let report = validate_workspace(&ws, &variant).unwrap();
        let row = report.row("libfoo").unwrap();
        assert_eq!(row.origin, ManifestOrigin::Source);
        assert_eq!(row.version, Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_broken_manifest_is_an_error_row_not_a_crash() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);

        write_source_manifest(&ws, "broken", "version = [oops");
        write_source_manifest(&ws, "ok_pkg", "version = \"1.0.0\"\n");

        let report = validate_workspace(&ws, &variant()).unwrap();
        assert!(!report.is_consistent());
        assert!(report.row("broken").unwrap().error.is_some());
        assert!(report.row("ok_pkg").unwrap().is_ok());
    }
}
