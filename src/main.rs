mod cli;
mod error;
mod pattern;
mod planner;
mod registry;
mod store;
mod validate;
mod version;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var("VERSET_VERBOSE", "1");
        }
    }

    let result = match cli.command {
        Commands::Update {
            changes,
            dry_run,
            yes,
        } => workflow::execute_update(&cli.path, &changes, dry_run, yes),
        Commands::Bump {
            key,
            part,
            dry_run,
            yes,
        } => workflow::execute_bump(&cli.path, &key, part.into(), dry_run, yes),
        Commands::Validate => workflow::execute_validate(&cli.path),
        Commands::Show => workflow::execute_show(&cli.path),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
