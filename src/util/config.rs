//! Workspace configuration (`caravel.toml`).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Release channel. `Devel` makes prerelease versions eligible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Devel,
}

/// One registered remote repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub url: String,
}

/// `owner/repo` pair extracted from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

/// Parsed workspace configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub channel: Channel,

    /// Package names excluded from build-unit discovery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,

    /// Package name -> remote repository.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub repositories: HashMap<String, RepositoryEntry>,

    /// Owner -> access token; `default` applies to any other owner.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tokens: HashMap<String, String>,
}

impl WorkspaceConfig {
    /// Load the configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at `{}`", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config at `{}`", path.display()))
    }

    /// Load the configuration, or fall back to defaults if the file is
    /// missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(WorkspaceConfig::default())
        }
    }

    pub fn allows_prerelease(&self) -> bool {
        self.channel == Channel::Devel
    }

    /// The repository slug registered for a package, if any.
    pub fn repository_for(&self, package: &str) -> Option<Result<RepoSlug>> {
        self.repositories
            .get(package)
            .map(|entry| parse_repo_slug(&entry.url))
    }

    /// Token for an owner, falling back to the `default` entry.
    pub fn token_for(&self, owner: &str) -> Option<&str> {
        self.tokens
            .get(owner)
            .or_else(|| self.tokens.get("default"))
            .map(String::as_str)
    }
}

/// Extract `owner/repo` from either an ssh (`git@host:owner/repo.git`) or
/// an https repository URL.
pub fn parse_repo_slug(url: &str) -> Result<RepoSlug> {
    let ssh = Regex::new(r"^[A-Za-z0-9_.-]+@[A-Za-z0-9_.-]+:([^/]+)/(.+?)(?:\.git)?$")
        .expect("static regex");
    if let Some(caps) = ssh.captures(url) {
        return Ok(RepoSlug {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
        });
    }

    let parsed = Url::parse(url).with_context(|| format!("unrecognized repository URL `{url}`"))?;
    let mut segments = parsed
        .path_segments()
        .with_context(|| format!("repository URL `{url}` has no path"))?
        .filter(|s| !s.is_empty());

    let owner = segments
        .next()
        .with_context(|| format!("repository URL `{url}` is missing an owner"))?;
    let repo = segments
        .next()
        .with_context(|| format!("repository URL `{url}` is missing a repository name"))?;

    Ok(RepoSlug {
        owner: owner.to_string(),
        repo: repo.trim_end_matches(".git").to_string(),
    })
}
