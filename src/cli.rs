use clap::{Parser, Subcommand, ValueEnum};

use crate::version::BumpPart;

#[derive(Parser, Debug)]
#[command(
    name = "verset",
    about = "Version synchronizer - keep runtime and release versions consistent across project files",
    version
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub path: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply new values to version keys and every file mirroring them
    Update {
        /// Changes to apply, as KEY=VALUE pairs
        #[arg(value_name = "KEY=VALUE", required = true)]
        changes: Vec<String>,

        /// Preview the plan and per-file diffs without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Increment one component of a semver key and propagate the result
    Bump {
        /// Version key to bump
        key: String,

        /// Component to increment
        #[arg(value_enum)]
        part: BumpPartArg,

        /// Preview the plan and per-file diffs without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check every mirrored occurrence against the version store
    Validate,

    /// Show current keys, kinds, values, and target counts
    Show,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BumpPartArg {
    Major,
    Minor,
    Patch,
}

impl From<BumpPartArg> for BumpPart {
    fn from(part: BumpPartArg) -> Self {
        match part {
            BumpPartArg::Major => BumpPart::Major,
            BumpPartArg::Minor => BumpPart::Minor,
            BumpPartArg::Patch => BumpPart::Patch,
        }
    }
}
