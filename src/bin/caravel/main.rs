mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, GraphCommand, IndexCommand, ValidateCommand};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "caravel=debug"
    } else {
        "caravel=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .without_time()
        .init();

    match &cli.command {
        Commands::Install(args) => commands::install::execute(args),
        Commands::Graph(GraphCommand::Build(args)) => commands::graph::execute(args),
        Commands::Validate(ValidateCommand::Local(args)) => commands::validate::execute(args),
        Commands::Index(IndexCommand::Release(args)) => commands::index::execute(args),
        Commands::Completions { shell } => commands::completions::execute(*shell),
    }
}
