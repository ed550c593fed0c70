pub mod completions;
pub mod graph;
pub mod index;
pub mod install;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};

use caravel::core::workspace::Workspace;
use caravel::util::config::WorkspaceConfig;

/// Locate the enclosing workspace and load its configuration.
pub fn open_workspace() -> Result<(Workspace, WorkspaceConfig)> {
    let cwd: PathBuf = std::env::current_dir().context("failed to read the current directory")?;
    let workspace = Workspace::find(&cwd)?;
    let config = WorkspaceConfig::load_or_default(&workspace.config_path())?;
    Ok((workspace, config))
}
