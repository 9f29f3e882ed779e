//! Detection of extensions present in watch directories but not yet mapped.
//!
//! This is a read-only helper for hosts that want to offer "map this extension" prompts.
//! It never moves anything.

use crate::config::OrganizerConfig;
use crate::file_organizer::file_extension;
use std::collections::BTreeSet;
use std::fs;

/// Extensions of operating-system and application housekeeping files.
///
/// These are never suggested for mapping.
pub const SYSTEM_EXTENSIONS: &[&str] = &[
    ".ini", ".sys", ".dll", ".exe", ".bat", ".cmd", ".com", ".msi", ".tmp", ".log", ".cache",
    ".lnk", ".url", ".reg", ".drv", ".dat",
];

/// Returns true if `extension` (any case, with or without dot) is a system extension.
///
/// ```
/// use autofiler::detect::is_system_extension;
///
/// assert!(is_system_extension(".DLL"));
/// assert!(!is_system_extension(".pdf"));
/// ```
pub fn is_system_extension(extension: &str) -> bool {
    let lowered = extension.trim().to_lowercase();
    let dotted = if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{}", lowered)
    };
    SYSTEM_EXTENSIONS.contains(&dotted.as_str())
}

/// Lists extensions of files in the watch directories that have no mapping yet.
///
/// Only direct regular files of existing watch directories are considered. Extensions
/// that already have a key in the mapping (even a disabled one) and system extensions
/// are left out. The result is sorted and free of duplicates.
pub fn detect_unmapped_extensions(config: &OrganizerConfig) -> Vec<String> {
    let mut found = BTreeSet::new();

    for watch_dir in &config.watch_dirs {
        let Ok(entries) = fs::read_dir(watch_dir) else {
            continue;
        };
        log::debug!("Scanning directory: {}", watch_dir.display());

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ext) = file_extension(&path)
                && !is_system_extension(&ext)
                && !config.is_mapped(&ext)
            {
                found.insert(ext);
            }
        }
    }

    found.into_iter().collect()
}
