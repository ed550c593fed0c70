use std::process::ExitCode;

use anyhow::Result;
use rayon::prelude::*;
use tracing::info;

use caravel::sources::feed::HttpReleaseFeed;
use caravel::sources::remote::RemoteCatalog;

use crate::cli::IndexReleaseArgs;
use crate::commands::open_workspace;

pub fn execute(args: &IndexReleaseArgs) -> Result<ExitCode> {
    let (_, config) = open_workspace()?;
    let variant = args.variant.resolve();

    let mut packages: Vec<&str> = match &args.package {
        Some(name) => vec![name.as_str()],
        None => config.repositories.keys().map(String::as_str).collect(),
    };
    packages.sort_unstable();

    if packages.is_empty() {
        info!("no repositories registered");
        return Ok(ExitCode::SUCCESS);
    }

    let feed = HttpReleaseFeed::new()?;
    let catalog = RemoteCatalog::new(&config, &feed);

    // One feed query per package, fanned out over the rayon pool.
    let listings: Vec<_> = packages
        .par_iter()
        .map(|name| (*name, catalog.available_versions(name, &variant)))
        .collect();

    let mut failed = false;
    for (name, listing) in listings {
        match listing {
            Ok(versions) if versions.is_empty() => {
                println!("{name}: no compatible artifacts");
            }
            Ok(versions) => {
                let rendered: Vec<String> = versions
                    .iter()
                    .map(|(version, prerelease)| {
                        if *prerelease {
                            format!("{version} (prerelease)")
                        } else {
                            version.to_string()
                        }
                    })
                    .collect();
                println!("{name}: {}", rendered.join(", "));
            }
            Err(err) => {
                failed = true;
                println!("{name}: {err}");
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
