use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use crate::error::{Result, VersetError};
use crate::planner::{ApplySummary, Plan, UpdatePlanner};
use crate::validate::ChangeSet;
use crate::version::BumpPart;

/// Execute the update workflow: set new values for one or more keys and
/// rewrite every file mirroring them
pub fn execute_update<P: AsRef<Path>>(
    project_path: P,
    change_args: &[String],
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    println!(
        "{}",
        "Synchronizing versions across the project...".cyan().bold()
    );

    println!("\n{}", "1. Loading version store...".yellow());
    let mut planner = UpdatePlanner::new(project_path)?;
    println!(
        "{}",
        format!("✓ {} version keys loaded", planner.store().keys().len()).green()
    );

    println!("\n{}", "2. Planning changes...".yellow());
    let changes = parse_changes(change_args)?;
    let plan = planner.plan(&changes)?;
    print_plan(&plan);
    println!("{}", "✓ Plan validated".green());

    finish_plan(&mut planner, plan, dry_run, yes, 3)
}

/// Execute the bump workflow: increment one component of a semver key and
/// propagate the result like an update
pub fn execute_bump<P: AsRef<Path>>(
    project_path: P,
    key: &str,
    part: BumpPart,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    println!("{}", format!("Bumping {key}...").cyan().bold());

    println!("\n{}", "1. Loading version store...".yellow());
    let mut planner = UpdatePlanner::new(project_path)?;
    println!(
        "{}",
        format!("✓ {} version keys loaded", planner.store().keys().len()).green()
    );

    println!("\n{}", "2. Computing next version...".yellow());
    let next = planner.bumped_value(key, part)?;
    println!(
        "   • {} {} → {}",
        key.white().bold(),
        planner.store().get(key)?.red(),
        next.green().bold()
    );

    println!("\n{}", "3. Planning changes...".yellow());
    let changes: ChangeSet = [(key.to_string(), next)].into();
    let plan = planner.plan(&changes)?;
    print_plan(&plan);
    println!("{}", "✓ Plan validated".green());

    finish_plan(&mut planner, plan, dry_run, yes, 4)
}

/// Execute the validate workflow: check every stored value and every
/// mirrored occurrence without changing anything
pub fn execute_validate<P: AsRef<Path>>(project_path: P) -> Result<()> {
    println!("{}", "Checking version consistency...".cyan().bold());

    println!("\n{}", "1. Loading version store...".yellow());
    let planner = UpdatePlanner::new(project_path)?;
    println!(
        "{}",
        format!("✓ {} version keys loaded", planner.store().keys().len()).green()
    );

    println!("\n{}", "2. Scanning registered targets...".yellow());
    let findings = planner.scan();
    println!("{}", "✓ Scan completed".green());

    if findings.is_empty() {
        println!("\n{}", "✨ All versions are consistent!".green().bold());
        return Ok(());
    }

    println!(
        "\n{}",
        format!("Found {} problem(s):", findings.len()).red().bold()
    );
    for finding in &findings {
        println!("  • {finding}");
    }

    Err(VersetError::ValidationFailed(findings.len()))
}

/// Execute the show workflow: list every tracked key with its kind, value,
/// and registered targets
pub fn execute_show<P: AsRef<Path>>(project_path: P) -> Result<()> {
    println!("{}", "Listing tracked versions...".cyan().bold());

    println!("\n{}", "1. Loading version store...".yellow());
    let planner = UpdatePlanner::new(project_path)?;
    println!("{}", "✓ Store loaded".green());

    println!("\n{}", "📦 Versions:".cyan().bold());
    let snapshot = planner.snapshot();
    let mut mirrored = 0;
    for (key, value) in &snapshot {
        let kind = planner.store().kind_of(key);
        let targets = planner.registry().targets_for(key);
        mirrored += targets.len();

        let detail = match targets.len() {
            0 => format!("({}, store only)", kind.as_str()),
            n => format!("({}, {} target{})", kind.as_str(), n, plural(n)),
        };
        println!(
            "  • {} = {} {}",
            key.white().bold(),
            value.green(),
            detail.dimmed()
        );
        for target in targets {
            println!(
                "      {} {}",
                target.path.display().to_string().bright_cyan(),
                format!("({})", target.format.as_str()).dimmed()
            );
        }
    }

    println!("\n{}", "Summary:".cyan().bold());
    println!(
        "  {} version key{}",
        snapshot.len().to_string().yellow(),
        plural(snapshot.len())
    );
    println!(
        "  {} mirrored location{}",
        mirrored.to_string().yellow(),
        plural(mirrored)
    );

    Ok(())
}

/// Split KEY=VALUE arguments into a ChangeSet, rejecting malformed pairs
/// and keys given more than once.
fn parse_changes(args: &[String]) -> Result<ChangeSet> {
    let mut changes = ChangeSet::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(VersetError::InvalidChange(format!(
                "{arg:?} is not of the form KEY=VALUE"
            )));
        };

        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Err(VersetError::InvalidChange(format!(
                "{arg:?} is not of the form KEY=VALUE"
            )));
        }

        if changes.insert(key.to_string(), value.to_string()).is_some() {
            return Err(VersetError::InvalidChange(format!(
                "{key} given more than once"
            )));
        }
    }
    Ok(changes)
}

/// Preview, confirm, and apply a validated plan. `step` continues the
/// caller's numbering.
fn finish_plan(
    planner: &mut UpdatePlanner,
    plan: Plan,
    dry_run: bool,
    yes: bool,
    step: usize,
) -> Result<()> {
    if plan.is_noop() {
        println!(
            "\n{}",
            "✨ Everything is already in sync, nothing to do!".green().bold()
        );
        return Ok(());
    }

    if dry_run {
        println!(
            "\n{}",
            format!("{step}. Dry run, rendering diffs...").yellow()
        );
        print_plan_diffs(&plan);
        planner.finish_dry_run();
        println!(
            "\n{}",
            "✨ Dry run complete, no files were written!".green().bold()
        );
        return Ok(());
    }

    if !yes && !confirm_apply(&plan)? {
        println!("\n{}", "Update cancelled by user.".yellow());
        return Ok(());
    }

    println!("\n{}", format!("{step}. Applying plan...").yellow());
    let summary = planner.apply(plan)?;
    println!(
        "{}",
        "✓ Store and targets written, consistency verified".green()
    );

    print_apply_summary(&summary);

    println!(
        "\n{}",
        "✨ Versions synchronized successfully!".green().bold()
    );
    Ok(())
}

fn print_plan(plan: &Plan) {
    let verbose = std::env::var("VERSET_VERBOSE").is_ok();

    for (key, (old, new)) in &plan.key_changes {
        if old == new {
            println!("   • {} {}", key.white().bold(), "(unchanged)".dimmed());
        } else {
            println!(
                "   • {} {} → {}",
                key.white().bold(),
                old.red(),
                new.green().bold()
            );
        }

        for edit in plan.edits.iter().filter(|e| &e.key == key) {
            if verbose {
                eprintln!(
                    "[VERBOSE] {}: locator {:?} matched {:?} in {}",
                    edit.key,
                    edit.locator,
                    edit.previous,
                    edit.path.display()
                );
            }
            if edit.changed {
                println!(
                    "     {}: {} → {}",
                    edit.path.display().to_string().bright_cyan(),
                    edit.previous.red(),
                    edit.rendered.green()
                );
            } else {
                println!(
                    "     {}: {}",
                    edit.path.display().to_string().bright_cyan(),
                    "already up to date".dimmed()
                );
            }
        }
    }
}

/// Per-file line diffs for the dry run. Edits to the same file compose, so
/// the diff runs from the first edit's original to the last edit's result.
fn print_plan_diffs(plan: &Plan) {
    let mut files: BTreeMap<&Path, (&str, &str)> = BTreeMap::new();
    for edit in &plan.edits {
        files
            .entry(edit.path.as_path())
            .and_modify(|(_, new)| *new = edit.new_content.as_str())
            .or_insert((edit.old_content.as_str(), edit.new_content.as_str()));
    }

    for (path, (old, new)) in files {
        if old == new {
            println!(
                "\n{} {}",
                path.display().to_string().bright_cyan(),
                "(already up to date)".dimmed()
            );
            continue;
        }

        println!("\n{}", path.display().to_string().bright_cyan().bold());
        let diff = TextDiff::from_lines(old, new);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Delete => {
                    println!("{}", format!("  - {}", change.value().trim_end()).red());
                }
                ChangeTag::Insert => {
                    println!("{}", format!("  + {}", change.value().trim_end()).green());
                }
                ChangeTag::Equal => {}
            }
        }
    }
}

fn confirm_apply(plan: &Plan) -> Result<bool> {
    let changed_keys = plan
        .key_changes
        .values()
        .filter(|(old, new)| old != new)
        .count();
    let changed_files = plan.changed_paths().len();

    loop {
        print!(
            "\n{}",
            format!(
                "Apply {changed_keys} change{} to the store and {changed_files} target file{}? [Y/n]: ",
                plural(changed_keys),
                plural(changed_files)
            )
            .bold()
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        match input.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("{}", "Please answer with y(es) or n(o).".red()),
        }
    }
}

fn print_apply_summary(summary: &ApplySummary) {
    println!("\n{}", "Update summary:".cyan().bold());
    for (key, (old, new)) in &summary.key_changes {
        if old == new {
            continue;
        }
        println!(
            "  • {} {} → {}",
            key.white().bold(),
            old.red(),
            new.green()
        );
    }

    if !summary.files_written.is_empty() {
        println!("\n{}", "Files updated:".cyan());
        for path in &summary.files_written {
            println!("  • {}", path.display());
        }
    }

    if !summary.files_unchanged.is_empty() {
        println!("\n{}", "Already carried the new values:".cyan());
        for path in &summary.files_unchanged {
            println!("  • {}", path.display().to_string().dimmed());
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
