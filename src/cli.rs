//! Command-line interface module for autofiler.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing (clap derive)
//! - Watch folder and extension mapping management
//! - One-shot organizing passes and the monitoring loop
//! - Unmapped extension detection and log file lookup

use crate::config::{ConfigStore, normalize_extension};
use crate::detect::detect_unmapped_extensions;
use crate::file_organizer::{FileOrganizer, PassReport};
use crate::logging;
use crate::monitor::{DEFAULT_INTERVAL_SECS, Monitor, MonitorObserver};
use crate::output::OutputFormatter;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watch folders and move files into destination folders by extension.
#[derive(Debug, Parser)]
#[command(name = "autofiler", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ~/.auto_move_config.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for daily log files
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Manage watched folders
    #[command(subcommand)]
    Watch(WatchCommand),
    /// Manage extension to destination mappings
    #[command(subcommand)]
    Map(MapCommand),
    /// List extensions found in watched folders that have no mapping yet
    Detect,
    /// Run a single organizing pass
    Run,
    /// Keep organizing at a fixed interval until interrupted
    Monitor {
        /// Seconds between passes
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS)]
        interval: u64,
        /// Stop after this many passes
        #[arg(long)]
        passes: Option<usize>,
    },
    /// Print the path of the most recent log file
    Logs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum WatchCommand {
    /// Start watching a folder
    Add { dir: PathBuf },
    /// Stop watching a folder
    Remove { dir: PathBuf },
    /// List watched folders
    List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum MapCommand {
    /// Route an extension to a destination folder (created if missing)
    Set { extension: String, dir: PathBuf },
    /// Stop routing an extension
    Unset { extension: String },
    /// Show where an extension is routed
    Get { extension: String },
    /// List all mappings
    List,
}

/// Runs a parsed command line.
///
/// # Examples
///
/// ```no_run
/// use autofiler::cli::{Cli, run_cli};
/// use clap::Parser;
///
/// let cli = Cli::parse_from(["autofiler", "watch", "list"]);
/// if let Err(e) = run_cli(&cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<(), String> {
    run_cli_with_config(&cli.command, cli.config.as_deref(), cli.log_dir.as_deref())
}

/// Runs `command` against the configuration at `config_path` (or the default file).
///
/// `log_dir` is only consulted by `Command::Logs`.
pub fn run_cli_with_config(
    command: &Command,
    config_path: Option<&Path>,
    log_dir: Option<&Path>,
) -> Result<(), String> {
    match command {
        Command::Logs => show_latest_log(log_dir),
        Command::Watch(cmd) => run_watch_command(&mut open_store(config_path)?, cmd),
        Command::Map(cmd) => run_map_command(&mut open_store(config_path)?, cmd),
        Command::Detect => {
            detect_extensions(&open_store(config_path)?);
            Ok(())
        }
        Command::Run => {
            organize_once(&open_store(config_path)?);
            Ok(())
        }
        Command::Monitor { interval, passes } => {
            let mut store = open_store(config_path)?;
            start_monitoring(&mut store, Duration::from_secs(*interval), *passes);
            Ok(())
        }
    }
}

fn open_store(config_path: Option<&Path>) -> Result<ConfigStore, String> {
    ConfigStore::open(config_path).map_err(|e| format!("Error loading configuration: {}", e))
}

fn run_watch_command(store: &mut ConfigStore, command: &WatchCommand) -> Result<(), String> {
    match command {
        WatchCommand::Add { dir } => {
            let added = store
                .add_watch_directory(dir)
                .map_err(|e| format!("Error adding watch folder: {}", e))?;
            if added {
                log::info!("Added watch folder: {}", dir.display());
                OutputFormatter::success(&format!("Added watch folder: {}", dir.display()));
                if !dir.is_dir() {
                    OutputFormatter::warning(
                        "Folder does not exist yet; it is skipped until it does",
                    );
                }
            } else {
                OutputFormatter::info(&format!("Already watching {}", dir.display()));
            }
        }
        WatchCommand::Remove { dir } => {
            let removed = store
                .remove_watch_directory(dir)
                .map_err(|e| format!("Error removing watch folder: {}", e))?;
            if removed {
                log::info!("Removed watch folder: {}", dir.display());
                OutputFormatter::success(&format!("Removed watch folder: {}", dir.display()));
            } else {
                OutputFormatter::warning(&format!("{} was not being watched", dir.display()));
            }
        }
        WatchCommand::List => OutputFormatter::watch_list(store.watch_directories()),
    }
    Ok(())
}

fn run_map_command(store: &mut ConfigStore, command: &MapCommand) -> Result<(), String> {
    match command {
        MapCommand::Set { extension, dir } => {
            let key = store
                .set_extension_destination(extension, Some(dir.as_path()))
                .map_err(|e| format!("Error setting mapping: {}", e))?;
            let dest = store
                .get_extension_destination(&key)
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            log::info!("Mapped {} to {}", key, dest);
            OutputFormatter::success(&format!("{} → {}", key, dest));
        }
        MapCommand::Unset { extension } => {
            let key = store
                .remove_extension(extension)
                .map_err(|e| format!("Error removing mapping: {}", e))?;
            log::info!("Removed mapping for: {}", key);
            OutputFormatter::success(&format!("Removed mapping for: {}", key));
        }
        MapCommand::Get { extension } => {
            let key = normalize_extension(extension)
                .map_err(|e| format!("Error looking up mapping: {}", e))?;
            match store.get_extension_destination(&key) {
                Some(dest) => OutputFormatter::plain(&dest.display().to_string()),
                None => OutputFormatter::warning(&format!("No destination for {}", key)),
            }
        }
        MapCommand::List => OutputFormatter::mapping_table(store.extension_mappings()),
    }
    Ok(())
}

/// Lists unmapped extensions so the user can map them.
fn detect_extensions(store: &ConfigStore) {
    let extensions = detect_unmapped_extensions(store.config());

    OutputFormatter::header("DETECTED EXTENSIONS");
    for ext in &extensions {
        OutputFormatter::plain(&format!("  {}", ext));
    }
    OutputFormatter::info(&format!("Found {} unmapped extensions", extensions.len()));
    if let Some(first) = extensions.first() {
        OutputFormatter::plain(&format!("Map one with 'autofiler map set {} <DIR>'", first));
    }
}

fn organizer_for(store: &ConfigStore) -> FileOrganizer {
    FileOrganizer::new().ignoring(store.path())
}

/// Runs one pass and prints what happened.
fn organize_once(store: &ConfigStore) {
    if store.watch_directories().is_empty() {
        OutputFormatter::warning(
            "No watch folders configured. Add one with 'autofiler watch add <DIR>'",
        );
        return;
    }

    let report = organizer_for(store).run_pass(store.config());
    OutputFormatter::pass_summary(&report);
}

/// Spinner between passes, a summary after every pass that did something.
struct ConsoleObserver {
    spinner: Option<ProgressBar>,
}

impl MonitorObserver for ConsoleObserver {
    fn on_pass(&mut self, pass_number: usize, report: &PassReport) {
        if report.is_idle() {
            log::debug!("Checking for files... nothing to move (pass {})", pass_number);
            return;
        }
        log::info!(
            "Pass {}: {} moved, {} failed",
            pass_number,
            report.moved_count(),
            report.failed_count()
        );
        OutputFormatter::pass_summary(report);
    }

    fn on_wait(&mut self, remaining: Duration) {
        let spinner = self
            .spinner
            .get_or_insert_with(OutputFormatter::create_wait_spinner);
        OutputFormatter::update_wait_spinner(spinner, remaining);
    }

    fn on_wait_end(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

/// Blocks, organizing every `interval` until interrupted or `passes` are done.
///
/// The configuration is re-read before every pass so changes made from another
/// terminal apply to the next pass. A document that fails to load mid-edit keeps the
/// previous configuration in effect.
fn start_monitoring(store: &mut ConfigStore, interval: Duration, passes: Option<usize>) {
    let dirs: Vec<String> = store
        .watch_directories()
        .iter()
        .map(|d| d.display().to_string())
        .collect();
    log::info!("File monitoring started");
    OutputFormatter::info(&format!("Monitoring folders: {}", dirs.join(", ")));

    let mut monitor = Monitor::new(interval);
    if let Some(passes) = passes {
        monitor = monitor.with_max_passes(passes);
    }

    let organizer = organizer_for(store);
    let mut observer = ConsoleObserver { spinner: None };
    let completed = monitor.run_blocking(
        &organizer,
        || {
            if let Err(e) = store.reload() {
                log::warn!("Keeping previous configuration: {}", e);
            }
            store.config().clone()
        },
        &mut observer,
    );

    log::info!("File monitoring stopped after {} passes", completed);
}

/// Prints the newest log file in `log_dir` (or the default log directory).
fn show_latest_log(log_dir: Option<&Path>) -> Result<(), String> {
    let log_dir = log_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(logging::default_log_dir);

    if !log_dir.is_dir() {
        OutputFormatter::warning("No log files found - log directory doesn't exist");
        return Ok(());
    }

    match logging::latest_log_file(&log_dir) {
        Some(path) => OutputFormatter::plain(&path.display().to_string()),
        None => OutputFormatter::warning("No log files found"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor_defaults() {
        let cli = Cli::try_parse_from(["autofiler", "monitor"]).unwrap();
        match cli.command {
            Command::Monitor { interval, passes } => {
                assert_eq!(interval, DEFAULT_INTERVAL_SECS);
                assert_eq!(passes, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "autofiler",
            "map",
            "set",
            "PDF",
            "/tmp/pdf",
            "--config",
            "/tmp/cfg.json",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cfg.json")));
        assert!(matches!(
            cli.command,
            Command::Map(MapCommand::Set { ref extension, .. }) if extension == "PDF"
        ));
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["autofiler"]).is_err());
    }
}
