//! Build-unit discovery and build-order computation.
//!
//! A build unit is any directory under `src/` that contains a
//! `CMakeLists.txt`; the scan does not descend beneath one. Dependency
//! edges come from `caravel_find_package(...)` calls in the unit's build
//! description, pruned to the discovered set.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Marker file that makes a directory a build unit.
pub const BUILD_FILE_NAME: &str = "CMakeLists.txt";

static FIND_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"caravel_find_package\s*\(([^)]*)\)").expect("static regex")
});

/// CMake argument keywords that are not package names.
const CMAKE_KEYWORDS: &[&str] = &["REQUIRED", "VERSION", "CONFIG", "COMPONENTS", "QUIET", "EXACT"];

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("dependency cycle in the build graph involving `{unit}`")]
    CyclicDependency { unit: String },

    #[error("invalid target pattern `{pattern}`")]
    BadPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// One compilable directory and its edges to other units.
#[derive(Debug, Clone)]
pub struct BuildUnit {
    pub name: String,
    pub path: PathBuf,
    pub deps: BTreeSet<String>,
}

/// The discovered unit set. Keyed by name, so iteration order is stable
/// regardless of how the filesystem enumerated the directories.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    units: BTreeMap<String, BuildUnit>,
}

impl BuildGraph {
    /// Scan `src_root` for build units, skipping names in `ignore`.
    pub fn discover(src_root: &Path, ignore: &[String]) -> Result<Self> {
        let mut units = BTreeMap::new();
        if src_root.is_dir() {
            scan_dir(src_root, ignore, &mut units)?;
        }

        // Edges only exist between discovered units.
        let known: BTreeSet<String> = units.keys().cloned().collect();
        for unit in units.values_mut() {
            unit.deps.retain(|dep| known.contains(dep));
        }

        Ok(BuildGraph { units })
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn unit(&self, name: &str) -> Option<&BuildUnit> {
        self.units.get(name)
    }

    pub fn units(&self) -> impl Iterator<Item = &BuildUnit> {
        self.units.values()
    }

    /// Restrict to the units matching the name-glob `patterns` plus
    /// everything they transitively depend on. Empty patterns keep all.
    pub fn restrict_to(&self, patterns: &[String]) -> Result<BuildGraph, GraphError> {
        if patterns.is_empty() {
            return Ok(self.clone());
        }

        let globs = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|source| GraphError::BadPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut queue: VecDeque<&str> = self
            .units
            .keys()
            .filter(|name| globs.iter().any(|g| g.matches(name)))
            .map(String::as_str)
            .collect();

        let mut selected = BTreeSet::new();
        while let Some(name) = queue.pop_front() {
            if !selected.insert(name.to_string()) {
                continue;
            }
            for dep in &self.units[name].deps {
                queue.push_back(dep);
            }
        }

        let units = self
            .units
            .iter()
            .filter(|(name, _)| selected.contains(*name))
            .map(|(name, unit)| (name.clone(), unit.clone()))
            .collect();

        Ok(BuildGraph { units })
    }

    /// Topologically ordered units, dependencies first.
    ///
    /// The order is deterministic for a given unit set. A cycle aborts the
    /// whole computation; no partial order is returned.
    pub fn build_order(&self) -> Result<Vec<&BuildUnit>, GraphError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = HashMap::new();

        for name in self.units.keys() {
            indices.insert(name.as_str(), graph.add_node(name.as_str()));
        }
        for unit in self.units.values() {
            for dep in &unit.deps {
                // dep -> dependent, so dependencies sort first
                graph.add_edge(indices[dep.as_str()], indices[unit.name.as_str()], ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| GraphError::CyclicDependency {
            unit: graph[cycle.node_id()].to_string(),
        })?;

        Ok(order.into_iter().map(|ix| &self.units[graph[ix]]).collect())
    }

    /// Render the top-level build description handed to the external build
    /// driver: one `add_subdirectory` per unit, in build order.
    pub fn render_build_manifest(&self) -> Result<String, GraphError> {
        let mut out = String::from("cmake_minimum_required(VERSION 3.16)\nproject(workspace)\n\n");
        for unit in self.build_order()? {
            out.push_str(&format!("add_subdirectory({})\n", unit.name));
        }
        Ok(out)
    }
}

fn scan_dir(dir: &Path, ignore: &[String], units: &mut BTreeMap<String, BuildUnit>) -> Result<()> {
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to scan `{}`", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if ignore.contains(&name) {
            debug!("skipping ignored unit `{name}`");
            continue;
        }

        let path = entry.path();
        let build_file = path.join(BUILD_FILE_NAME);
        if build_file.is_file() {
            let deps = parse_dependencies(&build_file)?;
            units.insert(name.clone(), BuildUnit { name, path, deps });
        } else {
            // Not a unit itself; keep looking below.
            scan_dir(&path, ignore, units)?;
        }
    }
    Ok(())
}

/// Extract dependency names from `caravel_find_package` calls.
fn parse_dependencies(build_file: &Path) -> Result<BTreeSet<String>> {
    let text = std::fs::read_to_string(build_file)
        .with_context(|| format!("failed to read `{}`", build_file.display()))?;

    let mut deps = BTreeSet::new();
    for caps in FIND_PACKAGE.captures_iter(&text) {
        let name = caps[1]
            .split_whitespace()
            .find(|token| {
                !CMAKE_KEYWORDS.contains(token) && !token.starts_with(|c: char| c.is_ascii_digit())
            });
        if let Some(name) = name {
            deps.insert(name.to_string());
        }
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add_unit(root: &Path, name: &str, deps: &[&str]) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let mut body = format!("project({name})\n");
        for dep in deps {
            body.push_str(&format!("caravel_find_package({dep} REQUIRED)\n"));
        }
        std::fs::write(dir.join(BUILD_FILE_NAME), body).unwrap();
    }

    fn order_names(graph: &BuildGraph) -> Vec<String> {
        graph
            .build_order()
            .unwrap()
            .into_iter()
            .map(|u| u.name.clone())
            .collect()
    }

    #[test]
    fn test_discovery_stops_beneath_a_unit() {
        let dir = TempDir::new().unwrap();
        add_unit(dir.path(), "outer", &[]);
        // A nested build file below a recognized unit is not a unit.
        add_unit(&dir.path().join("outer"), "inner", &[]);
        add_unit(&dir.path().join("group"), "nested", &[]);

        let graph = BuildGraph::discover(dir.path(), &[]).unwrap();
        assert!(graph.unit("outer").is_some());
        assert!(graph.unit("inner").is_none());
        assert!(graph.unit("nested").is_some());
    }

    #[test]
    fn test_ignore_list_and_unknown_deps() {
        let dir = TempDir::new().unwrap();
        add_unit(dir.path(), "a", &["b", "system_lib"]);
        add_unit(dir.path(), "b", &[]);
        add_unit(dir.path(), "skipme", &[]);

        let ignore = vec!["skipme".to_string()];
        let graph = BuildGraph::discover(dir.path(), &ignore).unwrap();

        assert!(graph.unit("skipme").is_none());
        // Names outside the discovered set are dropped silently.
        let a = graph.unit("a").unwrap();
        assert_eq!(a.deps.iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_keyword_arguments_are_stripped() {
        let dir = TempDir::new().unwrap();
        let unit = dir.path().join("app");
        std::fs::create_dir_all(&unit).unwrap();
        std::fs::write(
            unit.join(BUILD_FILE_NAME),
            "caravel_find_package(VERSION 3.1 libfoo REQUIRED CONFIG)\n",
        )
        .unwrap();
        add_unit(dir.path(), "libfoo", &[]);

        let graph = BuildGraph::discover(dir.path(), &[]).unwrap();
        let app = graph.unit("app").unwrap();
        assert_eq!(app.deps.iter().collect::<Vec<_>>(), vec!["libfoo"]);
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        // Create in several orders; the computed order must not change.
        for creation in [["a", "b", "c"], ["c", "a", "b"], ["b", "c", "a"]] {
            let dir = TempDir::new().unwrap();
            for name in creation {
                match name {
                    "a" => add_unit(dir.path(), "a", &["b"]),
                    "b" => add_unit(dir.path(), "b", &["c"]),
                    _ => add_unit(dir.path(), "c", &[]),
                }
            }
            let graph = BuildGraph::discover(dir.path(), &[]).unwrap();
            assert_eq!(order_names(&graph), vec!["c", "b", "a"]);
        }
    }

    #[test]
    fn test_cycle_is_fatal_and_names_a_member() {
        let dir = TempDir::new().unwrap();
        add_unit(dir.path(), "a", &["b"]);
        add_unit(dir.path(), "b", &["a"]);

        let graph = BuildGraph::discover(dir.path(), &[]).unwrap();
        match graph.build_order() {
            Err(GraphError::CyclicDependency { unit }) => {
                assert!(unit == "a" || unit == "b");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_restrict_to_transitive_closure() {
        let dir = TempDir::new().unwrap();
        add_unit(dir.path(), "app", &["mid"]);
        add_unit(dir.path(), "mid", &["base"]);
        add_unit(dir.path(), "base", &[]);
        add_unit(dir.path(), "unrelated", &[]);

        let graph = BuildGraph::discover(dir.path(), &[]).unwrap();
        let restricted = graph.restrict_to(&["app".to_string()]).unwrap();

        assert_eq!(restricted.len(), 3);
        assert!(restricted.unit("unrelated").is_none());
        assert_eq!(order_names(&restricted), vec!["base", "mid", "app"]);
    }

    #[test]
    fn test_restrict_glob_patterns() {
        let dir = TempDir::new().unwrap();
        add_unit(dir.path(), "raibo_msgs", &[]);
        add_unit(dir.path(), "raibo_core", &["raibo_msgs"]);
        add_unit(dir.path(), "tools", &[]);

        let graph = BuildGraph::discover(dir.path(), &[]).unwrap();
        let restricted = graph.restrict_to(&["raibo_*".to_string()]).unwrap();

        assert_eq!(restricted.len(), 2);
        assert!(restricted.unit("tools").is_none());
    }

    #[test]
    fn test_render_build_manifest() {
        let dir = TempDir::new().unwrap();
        add_unit(dir.path(), "app", &["base"]);
        add_unit(dir.path(), "base", &[]);

        let graph = BuildGraph::discover(dir.path(), &[]).unwrap();
        let rendered = graph.render_build_manifest().unwrap();

        let base_at = rendered.find("add_subdirectory(base)").unwrap();
        let app_at = rendered.find("add_subdirectory(app)").unwrap();
        assert!(base_at < app_at);
    }
}
