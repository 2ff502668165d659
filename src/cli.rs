//! Command-line interface module for umv.
//!
//! This module ties the whole flow together:
//! - Scan the source tree into entries
//! - Show the listing in the user's editor
//! - Reconcile the edited listing into operations
//! - Build the conflict-free execution plan
//! - Execute the plan (or just show it for a dry run)
//!
//! Every reconciliation and planning error aborts here, before any
//! filesystem mutation has happened.

use std::path::{Path, PathBuf, absolute};

use tempfile::TempDir;

use crate::config::Config;
use crate::editor;
use crate::execute::Executor;
use crate::listing::{decode, encode};
use crate::output::OutputFormatter;
use crate::plan::{Plan, PlanBuilder};
use crate::reconcile::{CaseSensitivity, Reconciler};
use crate::scan::Scanner;

/// Everything one invocation needs to run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory whose contents are listed and restructured.
    pub source: PathBuf,
    /// Directory edited paths are resolved against.
    pub target: PathBuf,
    /// Editor command override.
    pub editor: Option<String>,
    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
    /// Show the plan without executing it.
    pub dry_run: bool,
    /// Emit the plan or report as JSON instead of styled text.
    pub json: bool,
}

/// Runs one full listing-edit cycle.
///
/// # Errors
///
/// Returns a rendered message for every failure: configuration problems,
/// scan errors, editor failures, malformed edits, unresolvable plans, and
/// execution halts. All of these except the execution halt occur before any
/// filesystem mutation.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use umv::cli::{RunOptions, run};
///
/// let options = RunOptions {
///     source: PathBuf::from("/data/inbox"),
///     target: PathBuf::from("/data/sorted"),
///     editor: None,
///     config_path: None,
///     dry_run: true,
///     json: false,
/// };
/// match run(&options) {
///     Ok(()) => println!("Plan shown"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run(options: &RunOptions) -> Result<(), String> {
    let source = resolve_dir(&options.source)?;
    let target =
        absolute(&options.target).map_err(|e| format!("Invalid target path: {}", e))?;

    let config = Config::load(options.config_path.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let filters = config
        .compile_filters()
        .map_err(|e| format!("Error compiling filters: {}", e))?;
    let case = if config.listing.case_insensitive {
        CaseSensitivity::Insensitive
    } else {
        CaseSensitivity::Sensitive
    };

    let entries = Scanner::new(filters)
        .scan(&source)
        .map_err(|e| e.to_string())?;
    if entries.is_empty() {
        OutputFormatter::plain("No files found to restructure.");
        return Ok(());
    }

    let editor_command = editor::resolve_command(
        options.editor.as_deref(),
        config.listing.editor.as_deref(),
    )
    .map_err(|e| e.to_string())?;

    let listing = encode(&entries);
    let edited = editor::edit_text(&editor_command, &listing).map_err(|e| e.to_string())?;
    let lines = decode(&edited, entries.len()).map_err(|e| e.to_string())?;

    let operations = Reconciler::new(&source, &target, case)
        .reconcile(&entries, &lines)
        .map_err(|e| e.to_string())?;

    // Holds staged archive members for the lifetime of the run.
    let staging = TempDir::new().map_err(|e| format!("Failed to create staging area: {}", e))?;
    let plan = PlanBuilder::new(staging.path(), case)
        .build(&operations)
        .map_err(|e| e.to_string())?;

    if options.dry_run {
        return show_plan(&plan, options.json);
    }

    if plan.is_empty() {
        OutputFormatter::plain("Nothing to do.");
        return Ok(());
    }

    let report = Executor::new(!options.json).execute(&plan);
    if options.json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to render report: {}", e))?;
        println!("{}", rendered);
    } else {
        OutputFormatter::report_summary(&report);
    }

    match &report.failure {
        Some(failure) => Err(format!(
            "Execution halted at step {}: {}",
            failure.rank + 1,
            failure.error
        )),
        None => Ok(()),
    }
}

fn show_plan(plan: &Plan, json: bool) -> Result<(), String> {
    if json {
        let rendered = serde_json::to_string_pretty(plan)
            .map_err(|e| format!("Failed to render plan: {}", e))?;
        println!("{}", rendered);
        return Ok(());
    }

    if plan.is_empty() {
        OutputFormatter::dry_run_notice("Nothing to do.");
        return Ok(());
    }
    OutputFormatter::dry_run_notice("The following steps would be executed:");
    OutputFormatter::plan_listing(plan);
    OutputFormatter::plan_summary(plan);
    OutputFormatter::plain("\nNo files were modified.");
    Ok(())
}

fn resolve_dir(path: &Path) -> Result<PathBuf, String> {
    let resolved = absolute(path).map_err(|e| format!("Invalid source path: {}", e))?;
    if !resolved.is_dir() {
        return Err(format!(
            "{} does not exist or is not a directory",
            resolved.display()
        ));
    }
    Ok(resolved)
}
