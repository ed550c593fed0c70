use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use caravel::graph::BuildGraph;

use crate::cli::GraphBuildArgs;
use crate::commands::open_workspace;

pub fn execute(args: &GraphBuildArgs) -> Result<ExitCode> {
    let (workspace, config) = open_workspace()?;

    let graph = BuildGraph::discover(&workspace.src_dir(), &config.ignore)?;
    if graph.is_empty() {
        info!("no build units found under `{}`", workspace.src_dir().display());
        return Ok(ExitCode::SUCCESS);
    }

    let selected = graph.restrict_to(&args.patterns)?;
    let order = selected.build_order()?;

    info!("{} of {} unit(s) selected", selected.len(), graph.len());
    for (position, unit) in order.iter().enumerate() {
        println!("{:>3}. {}", position + 1, unit.name);
    }

    if let Some(path) = &args.emit {
        let rendered = selected.render_build_manifest()?;
        std::fs::write(path, rendered)
            .with_context(|| format!("failed to write `{}`", path.display()))?;
        info!("wrote build description to `{}`", path.display());
    }

    Ok(ExitCode::SUCCESS)
}
