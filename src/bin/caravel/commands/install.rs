use std::process::ExitCode;

use anyhow::Result;
use tracing::{info, warn};

use caravel::ops::install::{Outcome, ResolverSession};
use caravel::sources::feed::HttpReleaseFeed;

use crate::cli::InstallArgs;
use crate::commands::open_workspace;

pub fn execute(args: &InstallArgs) -> Result<ExitCode> {
    let (workspace, config) = open_workspace()?;
    let variant = args.variant.resolve();
    info!("target variant: {variant}");

    let feed = HttpReleaseFeed::new()?;
    let session = ResolverSession::new(&workspace, &config, &feed, &variant);
    let report = session.run(&args.specs)?;

    let mut failed = 0usize;
    for (name, outcome) in report.outcomes() {
        match outcome {
            Outcome::Satisfied(package) => {
                println!(
                    "  {name} {} ({})",
                    package.display_version(),
                    package.origin
                );
            }
            Outcome::Conflict { found, requirement } => {
                failed += 1;
                println!("  {name} CONFLICT: found {found}, required `{requirement}`");
            }
            Outcome::Failed { reason } => {
                failed += 1;
                println!("  {name} FAILED: {reason}");
            }
        }
    }

    if report.is_success() {
        info!("all packages resolved");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("{failed} package(s) failed to resolve");
        Ok(ExitCode::FAILURE)
    }
}
