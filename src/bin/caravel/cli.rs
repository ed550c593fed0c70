use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use caravel::core::variant::{normalize_arch, BuildConfig, Variant};

#[derive(Parser)]
#[command(
    name = "caravel",
    version,
    about = "Package manager and build orchestrator for multi-repository native workspaces"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and install packages into the workspace
    Install(InstallArgs),

    /// Build-graph operations
    #[command(subcommand)]
    Graph(GraphCommand),

    /// Consistency checks over the resolved workspace
    #[command(subcommand)]
    Validate(ValidateCommand),

    /// Remote release listings
    #[command(subcommand)]
    Index(IndexCommand),

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Target-variant selection, shared by every command that touches the
/// install tree. Defaults come from host detection.
#[derive(Args)]
pub struct VariantArgs {
    /// Build configuration to install or inspect
    #[arg(long, value_enum, default_value_t = BuildConfig::Release)]
    pub build_type: BuildConfig,

    /// Override the detected OS family
    #[arg(long)]
    pub os: Option<String>,

    /// Override the detected OS version
    #[arg(long)]
    pub os_version: Option<String>,

    /// Override the detected architecture
    #[arg(long)]
    pub arch: Option<String>,
}

impl VariantArgs {
    pub fn resolve(&self) -> Variant {
        let mut variant = Variant::detect(self.build_type);
        if let Some(os) = &self.os {
            variant.os_family = os.clone();
        }
        if let Some(os_version) = &self.os_version {
            variant.os_version = os_version.clone();
        }
        if let Some(arch) = &self.arch {
            variant.arch = normalize_arch(arch);
        }
        variant
    }
}

#[derive(Args)]
pub struct InstallArgs {
    /// Requirement strings, e.g. `raibo_msgs>=1.0.0,<2.0.0`
    pub specs: Vec<String>,

    #[command(flatten)]
    pub variant: VariantArgs,
}

#[derive(Subcommand)]
pub enum GraphCommand {
    /// Compute the build order for the workspace's source units
    Build(GraphBuildArgs),
}

#[derive(Args)]
pub struct GraphBuildArgs {
    /// Unit-name glob patterns; everything when omitted
    pub patterns: Vec<String>,

    /// Write the generated top-level build description to this path
    #[arg(long)]
    pub emit: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ValidateCommand {
    /// Check that the resolved package set is internally consistent
    Local(ValidateLocalArgs),
}

#[derive(Args)]
pub struct ValidateLocalArgs {
    #[command(flatten)]
    pub variant: VariantArgs,
}

#[derive(Subcommand)]
pub enum IndexCommand {
    /// List remote versions with artifacts compatible with this variant
    Release(IndexReleaseArgs),
}

#[derive(Args)]
pub struct IndexReleaseArgs {
    /// Limit the listing to one package
    pub package: Option<String>,

    #[command(flatten)]
    pub variant: VariantArgs,
}
