use std::process::ExitCode;

use anyhow::Result;
use tracing::{info, warn};

use caravel::ops::validate::{validate_workspace, DepStatus};

use crate::cli::ValidateLocalArgs;
use crate::commands::open_workspace;

pub fn execute(args: &ValidateLocalArgs) -> Result<ExitCode> {
    let (workspace, _config) = open_workspace()?;
    let variant = args.variant.resolve();

    let report = validate_workspace(&workspace, &variant)?;
    if report.rows.is_empty() {
        info!("nothing to validate");
        return Ok(ExitCode::SUCCESS);
    }

    let name_width = report
        .rows
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);

    for row in &report.rows {
        let version = row
            .version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<name_width$}  {:<10}  {}",
            row.name,
            version,
            row.origin.as_str()
        );

        if let Some(error) = &row.error {
            println!("{:<name_width$}    ! {error}", "");
            continue;
        }

        for (spec, status) in &row.deps {
            let rendered = match status {
                DepStatus::Ok => continue,
                DepStatus::Missing => format!("{spec}: missing"),
                DepStatus::WrongVersion { found } => {
                    format!("{spec}: wrong version (found {found})")
                }
                DepStatus::InvalidSpec => format!("{spec}: invalid requirement"),
            };
            println!("{:<name_width$}    ! {rendered}", "");
        }
    }

    if report.is_consistent() {
        info!("{} package(s) consistent", report.rows.len());
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("workspace is inconsistent");
        Ok(ExitCode::FAILURE)
    }
}
