//! Console output for the CLI.
//!
//! Every user-facing line the CLI prints goes through [`OutputFormatter`], so colors and
//! layout can change in one place. Status lines produced by the organizer itself go
//! through the logger instead (see `logging`).

use crate::file_organizer::PassReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use autofiler::output::OutputFormatter;
    /// OutputFormatter::success("Added watch folder: /home/user/Downloads");
    /// ```
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

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a spinner shown while the monitor waits for its next pass.
    ///
    /// ```no_run
    /// use autofiler::output::OutputFormatter;
    /// use std::time::Duration;
    ///
    /// let spinner = OutputFormatter::create_wait_spinner();
    /// OutputFormatter::update_wait_spinner(&spinner, Duration::from_secs(3));
    /// spinner.finish_and_clear();
    /// ```
    pub fn create_wait_spinner() -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid spinner template"),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }

    /// Shows the time left until the next pass.
    pub fn update_wait_spinner(spinner: &ProgressBar, remaining: Duration) {
        let secs = remaining.as_secs() + u64::from(remaining.subsec_millis() > 0);
        spinner.set_message(format!("Next check in {}s (Ctrl+C to stop)", secs));
    }

    /// Prints the watched directories, flagging the ones that do not exist.
    pub fn watch_list(dirs: &[PathBuf]) {
        Self::header("WATCHED FOLDERS");
        if dirs.is_empty() {
            Self::plain("  (none)");
            return;
        }
        for dir in dirs {
            if dir.is_dir() {
                println!("  {}", dir.display());
            } else {
                println!("  {} {}", dir.display(), "(missing)".yellow());
            }
        }
    }

    /// Prints the extension mappings as a two-column table.
    pub fn mapping_table(mappings: &BTreeMap<String, Option<PathBuf>>) {
        Self::header("EXTENSION MAPPINGS");
        if mappings.is_empty() {
            Self::plain("  (none)");
            return;
        }

        let width = mappings
            .keys()
            .map(|ext| ext.len())
            .max()
            .unwrap_or(0)
            .max(9); // At least "Extension" width

        println!(
            "{:<width$} | {}",
            "Extension".bold(),
            "Destination".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 20));

        for (ext, dest) in mappings {
            let dest = match dest {
                Some(dest) => dest.display().to_string().normal(),
                None => "None".dimmed(),
            };
            println!("{:<width$} | {} {}", ext, "→".dimmed(), dest, width = width);
        }
    }

    /// Prints what a pass did: moved files, failures and skipped directories.
    pub fn pass_summary(report: &PassReport) {
        Self::header("SUMMARY");

        for record in report.moved() {
            let target = record
                .destination
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            println!(
                "  {} {} → {}",
                "✓".green(),
                record.source.display(),
                record.destination.display()
            );
            if record.was_renamed() {
                println!("    {}", format!("renamed to {} to avoid overwriting", target).dimmed());
            }
        }

        for (path, error) in report.failures() {
            eprintln!("  {} {}: {}", "✗".red(), path.display(), error);
        }

        for dir in &report.missing_watch_dirs {
            println!("  {} {} {}", "⚠".yellow(), dir.display(), "(missing, skipped)".dimmed());
        }

        for (dir, reason) in &report.unreadable_watch_dirs {
            eprintln!("  {} cannot read {}: {}", "✗".red(), dir.display(), reason);
        }

        let moved = report.moved_count();
        println!(
            "{} moved, {} failed, {} left in place",
            moved.to_string().green().bold(),
            report.failed_count().to_string().red(),
            report.unmapped + report.already_in_place
        );
    }
}
