//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use dockhand::ops::DEFAULT_BUILDER;

/// dockhand - containerized builds driven by a per-project manifest
#[derive(Parser)]
#[command(name = "dockhand")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the project's builders and images
    Build(BuildArgs),

    /// Enter a builder's container interactively
    Dev(DevArgs),

    /// Show project, builder and image details
    Info,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(subcommand)]
    pub command: Option<BuildCommands>,

    /// Run the publish phase and push images
    #[arg(short, long)]
    pub publish_artifacts: bool,

    /// Build the working tree including uncommitted changes
    #[arg(short, long)]
    pub uncommitted: bool,

    /// Only run this builder (skips image builds)
    #[arg(short, long)]
    pub builder: Option<String>,

    /// Don't fail when a relayed ENV var is missing
    #[arg(short, long)]
    pub norequire_envs: bool,

    /// Skip non-essential steps and foreign architectures
    #[arg(short, long)]
    pub fast: bool,
}

#[derive(Subcommand)]
pub enum BuildCommands {
    /// Build in CI, detecting publish and branch settings from the environment
    InCiAutodetectSettings,
}

#[derive(Args)]
pub struct DevArgs {
    /// Builder to enter
    #[arg(default_value = DEFAULT_BUILDER)]
    pub builder: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
