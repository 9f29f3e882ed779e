//! Log routing for the organizer's status lines.
//!
//! The library only talks to the `log` facade. The binary installs a `fern` dispatch that
//! writes records to a daily file named `auto_filer_YYYYMMDD.log` and, from warnings up
//! (everything with `--verbose`), to the console.

use chrono::Local;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix shared by all log files.
pub const LOG_FILE_PREFIX: &str = "auto_filer_";

/// Errors raised while installing the logger.
#[derive(Debug)]
pub enum LoggingError {
    /// The log directory or file could not be created.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A global logger was already installed.
    AlreadyInitialized(log::SetLoggerError),
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingError::Io { path, source } => {
                write!(f, "Cannot open log file {}: {}", path.display(), source)
            }
            LoggingError::AlreadyInitialized(e) => write!(f, "Logger already initialized: {}", e),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level written to the log file.
    pub level: log::LevelFilter,
    /// Level echoed to stderr. The CLI prints its own summaries, so this is quieter.
    pub console_level: log::LevelFilter,
    pub log_dir: PathBuf,
}

impl LogConfig {
    pub fn new(verbose: bool, log_dir: Option<PathBuf>) -> Self {
        let (level, console_level) = if verbose {
            (log::LevelFilter::Debug, log::LevelFilter::Debug)
        } else {
            (log::LevelFilter::Info, log::LevelFilter::Warn)
        };
        Self {
            level,
            console_level,
            log_dir: log_dir.unwrap_or_else(default_log_dir),
        }
    }
}

/// `<local data dir>/autofiler/logs`, or `./logs` when there is no data dir.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("autofiler").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Today's log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!(
        "{}{}.log",
        LOG_FILE_PREFIX,
        Local::now().format("%Y%m%d")
    ))
}

/// Installs the global logger. Returns the path of the file being written.
pub fn init(config: &LogConfig) -> Result<PathBuf, LoggingError> {
    fs::create_dir_all(&config.log_dir).map_err(|e| LoggingError::Io {
        path: config.log_dir.clone(),
        source: e,
    })?;

    let file_path = log_file_path(&config.log_dir);
    let file = fern::log_file(&file_path).map_err(|e| LoggingError::Io {
        path: file_path.clone(),
        source: e,
    })?;

    let console = fern::Dispatch::new()
        .level(config.console_level)
        .format(format_console)
        .chain(std::io::stderr());

    let log_file = fern::Dispatch::new()
        .level(config.level)
        .format(format_plain)
        .chain(file);

    fern::Dispatch::new()
        .level(config.level.max(config.console_level))
        .chain(console)
        .chain(log_file)
        .apply()
        .map_err(LoggingError::AlreadyInitialized)?;

    Ok(file_path)
}

fn format_plain(out: fern::FormatCallback, message: &std::fmt::Arguments, record: &log::Record) {
    out.finish(format_args!(
        "{} - {} - {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        message
    ))
}

fn format_console(out: fern::FormatCallback, message: &std::fmt::Arguments, record: &log::Record) {
    let level = match record.level() {
        log::Level::Error => "ERROR".red().bold(),
        log::Level::Warn => "WARN".yellow(),
        log::Level::Info => "INFO".cyan(),
        log::Level::Debug | log::Level::Trace => record.level().as_str().dimmed(),
    };
    out.finish(format_args!(
        "{} {} {}",
        Local::now().format("%H:%M:%S").to_string().dimmed(),
        level,
        message
    ))
}

/// Finds the most recently modified `auto_filer_*.log` in `log_dir`.
pub fn latest_log_file(log_dir: &Path) -> Option<PathBuf> {
    let pattern = format!(
        "{}/{}*.log",
        glob::Pattern::escape(&log_dir.to_string_lossy()),
        LOG_FILE_PREFIX
    );

    glob::glob(&pattern)
        .ok()?
        .flatten()
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}
