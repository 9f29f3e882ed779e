//! autofiler - watch folders and move files by extension
//!
//! This library provides a persistent store for watched folders and extension mappings,
//! an organizing engine that moves files into their destination folders without
//! overwriting anything, and a polling monitor that repeats those passes.

pub mod cli;
pub mod config;
pub mod detect;
pub mod file_organizer;
pub mod logging;
pub mod monitor;
pub mod output;

pub use config::{ConfigError, ConfigStore, OrganizerConfig};
pub use file_organizer::{FileOrganizer, FileOutcome, MoveError, MoveRecord, PassReport};
pub use monitor::{Monitor, MonitorObserver, StopHandle};

pub use cli::{Cli, run_cli};
