//! Command-line argument definitions

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::completions::CompletionsArgs;
use crate::cli::commands::drift::DriftArgs;
use crate::cli::commands::restricted::RestrictedArgs;

/// Release-engineering checks for restricted branches and compliance manifests
#[derive(Parser, Debug)]
#[command(name = "relcheck", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Configuration file (default: ./relcheck.yaml, then the user config directory)
    #[arg(long, global = true, env = "RELCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a Gerrit change to a restricted branch is approved
    Restricted(RestrictedArgs),

    /// Verify a compliance manifest against built dependency packages
    Drift(DriftArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
