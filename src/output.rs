//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored
//! status lines, progress tracking, and plan and report rendering. This
//! module abstracts away output details, making it easy to change formatting
//! globally.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::execute::ExecutionReport;
use crate::plan::{Plan, StepAction};

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for plan execution
/// - Plan and execution report rendering
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates and returns a progress bar for plan execution.
    ///
    /// # Arguments
    ///
    /// * `total` - Total number of steps to execute
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints every step of a plan, one line per step in execution order.
    pub fn plan_listing(plan: &Plan) {
        for step in &plan.steps {
            println!(" {:>3}. {}", step.ordering_rank + 1, step.action);
        }
    }

    /// Prints a summary table with step counts per action.
    pub fn plan_summary(plan: &Plan) {
        let mut moves = 0usize;
        let mut deletes = 0usize;
        let mut extractions = 0usize;
        let mut stashes = 0usize;
        for step in &plan.steps {
            match step.action {
                StepAction::MoveFile { .. } => moves += 1,
                StepAction::DeleteFile { .. } => deletes += 1,
                StepAction::ExtractMember { .. } => extractions += 1,
                StepAction::RenameToTemp { .. } => stashes += 1,
            }
        }

        Self::header("PLAN SUMMARY");
        let rows = [
            ("Moves", moves),
            ("Deletions", deletes),
            ("Extractions", extractions),
            ("Cycle breakers", stashes),
        ];
        for (label, count) in rows {
            if count > 0 {
                println!(
                    "{:<14} | {} {}",
                    label,
                    count.to_string().green(),
                    if count == 1 { "step" } else { "steps" }
                );
            }
        }
        println!(
            "{:<14} | {} {}",
            "Total".bold(),
            plan.len().to_string().green().bold(),
            if plan.len() == 1 { "step" } else { "steps" }
        );
    }

    /// Prints what happened during an execution run.
    pub fn report_summary(report: &ExecutionReport) {
        if report.succeeded() {
            Self::success(&format!(
                "Completed {} {}",
                report.completed.len(),
                if report.completed.len() == 1 {
                    "step"
                } else {
                    "steps"
                }
            ));
        } else {
            Self::error(&format!(
                "Halted after {} completed {}",
                report.completed.len(),
                if report.completed.len() == 1 {
                    "step"
                } else {
                    "steps"
                }
            ));
        }

        for skipped in &report.skipped_deletes {
            Self::warning(&format!("already absent: {}", skipped.display()));
        }

        if let Some(failure) = &report.failure {
            Self::error(&format!(
                "Step {} failed: {}",
                failure.rank + 1,
                failure.error
            ));
            if !report.completed.is_empty() {
                Self::plain("Completed steps before the failure:");
                for record in &report.completed {
                    println!("   {:>3}. {}", record.rank + 1, record.description);
                }
            }
            Self::plain("No steps were rolled back. Fix the cause and re-run from a fresh scan.");
        }
    }
}
