/// The organizing engine: one pass over every watch directory.
///
/// A pass enumerates the direct entries of each watched directory, looks up the
/// destination for each file's extension, picks a free name in the destination and
/// moves the file there. Failures are recorded per file; a pass as a whole never fails.
use crate::config::OrganizerConfig;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A single file relocated during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// Where the file was found.
    pub source: PathBuf,
    /// The normalized extension that selected the destination.
    pub extension: String,
    /// `destination/filename`, before collision handling.
    pub candidate: PathBuf,
    /// Where the file actually landed.
    pub destination: PathBuf,
}

impl MoveRecord {
    /// Returns true if the file had to be renamed to avoid overwriting another file.
    pub fn was_renamed(&self) -> bool {
        self.candidate != self.destination
    }
}

/// Why a single file could not be moved.
#[derive(Debug)]
pub enum MoveError {
    /// The entry has no usable file name component.
    NoFileName { source: PathBuf },
    /// The destination directory is missing and could not be recreated.
    DestinationUnavailable {
        destination: PathBuf,
        source_error: io::Error,
    },
    /// The rename (or copy fallback) failed.
    MoveFailed {
        source: PathBuf,
        destination: PathBuf,
        source_error: io::Error,
    },
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFileName { source } => {
                write!(f, "{} has no file name component", source.display())
            }
            Self::DestinationUnavailable {
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Destination {} is unavailable: {}",
                    destination.display(),
                    source_error
                )
            }
            Self::MoveFailed {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
        }
    }
}

impl std::error::Error for MoveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoFileName { .. } => None,
            Self::DestinationUnavailable { source_error, .. }
            | Self::MoveFailed { source_error, .. } => Some(source_error),
        }
    }
}

/// Result type for a single file move.
pub type MoveResult<T> = Result<T, MoveError>;

/// Outcome for one file that had a configured destination.
#[derive(Debug)]
pub enum FileOutcome {
    Moved(MoveRecord),
    Failed { path: PathBuf, error: MoveError },
}

/// Everything that happened during one pass.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Per-file results for files that were routed somewhere.
    pub outcomes: Vec<FileOutcome>,
    /// Files whose extension has no destination.
    pub unmapped: usize,
    /// Files already sitting in their destination directory.
    pub already_in_place: usize,
    /// Watch directories that do not currently exist.
    pub missing_watch_dirs: Vec<PathBuf>,
    /// Watch directories that exist but could not be listed.
    pub unreadable_watch_dirs: Vec<(PathBuf, String)>,
}

impl PassReport {
    /// Records of every file moved in this pass.
    pub fn moved(&self) -> impl Iterator<Item = &MoveRecord> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Moved(record) => Some(record),
            FileOutcome::Failed { .. } => None,
        })
    }

    /// Files that could not be moved, with the reason.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &MoveError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Failed { path, error } => Some((path.as_path(), error)),
            FileOutcome::Moved(_) => None,
        })
    }

    pub fn moved_count(&self) -> usize {
        self.moved().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Returns true if nothing was moved and nothing failed.
    pub fn is_idle(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Moves files out of watch directories according to an [`OrganizerConfig`].
///
/// The organizer holds no configuration itself; hosts hand it the current document on
/// every pass, so edits between passes are picked up without any coordination.
#[derive(Debug, Clone, Default)]
pub struct FileOrganizer {
    ignored: Vec<PathBuf>,
}

impl FileOrganizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never touch `path`, even if it sits in a watch directory with a mapped extension.
    ///
    /// Used to protect the configuration document itself.
    pub fn ignoring(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignored.push(path.into());
        self
    }

    /// Runs one organizing pass over every watch directory in `config`.
    ///
    /// Watch directories are processed in configured order; files inside a directory in
    /// whatever order the filesystem lists them.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use autofiler::config::ConfigStore;
    /// use autofiler::file_organizer::FileOrganizer;
    ///
    /// let store = ConfigStore::open(None).expect("config");
    /// let report = FileOrganizer::new()
    ///     .ignoring(store.path())
    ///     .run_pass(store.config());
    /// println!("moved {} files", report.moved_count());
    /// ```
    pub fn run_pass(&self, config: &OrganizerConfig) -> PassReport {
        let mut report = PassReport::default();

        for watch_dir in &config.watch_dirs {
            if !watch_dir.is_dir() {
                log::debug!("Skipping missing watch directory {}", watch_dir.display());
                report.missing_watch_dirs.push(watch_dir.clone());
                continue;
            }
            self.organize_directory(watch_dir, config, &mut report);
        }

        report
    }

    fn organize_directory(
        &self,
        watch_dir: &Path,
        config: &OrganizerConfig,
        report: &mut PassReport,
    ) {
        let entries = match fs::read_dir(watch_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Error reading {}: {}", watch_dir.display(), e);
                report
                    .unreadable_watch_dirs
                    .push((watch_dir.to_path_buf(), e.to_string()));
                return;
            }
        };

        for entry in entries.flatten() {
            let file_path = entry.path();
            if !self.is_candidate(&file_path) {
                continue;
            }

            let Some(extension) = file_extension(&file_path) else {
                report.unmapped += 1;
                continue;
            };

            let Some(destination) = config.destination_for(&extension) else {
                report.unmapped += 1;
                continue;
            };

            if same_location(watch_dir, destination) {
                report.already_in_place += 1;
                continue;
            }

            let name = display_name(&file_path);
            log::info!(
                "Moving {} from {} to {}",
                name,
                watch_dir.display(),
                destination.display()
            );

            match move_into(&file_path, destination, &extension) {
                Ok(record) => {
                    if record.was_renamed() {
                        log::info!(
                            "Renamed {} to {} to avoid overwriting",
                            name,
                            display_name(&record.destination)
                        );
                    }
                    report.outcomes.push(FileOutcome::Moved(record));
                }
                Err(error) => {
                    log::error!("Error moving {}: {}", name, error);
                    report.outcomes.push(FileOutcome::Failed {
                        path: file_path,
                        error,
                    });
                }
            }
        }
    }

    /// Regular files that are not on the ignore list.
    ///
    /// Dot-files are candidates like any other file. Metadata such as `.DS_Store` has no
    /// extension and is left alone as unmapped.
    fn is_candidate(&self, path: &Path) -> bool {
        // `is_file` follows symlinks, so links to directories are skipped here too.
        if !path.is_file() {
            return false;
        }

        !self.ignored.iter().any(|ignored| same_location(ignored, path))
    }
}

/// Returns the lowercase extension of `path` with a leading dot, e.g. `.pdf`.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
}

/// Compares two paths, resolving symlinks and `..` when both exist.
fn same_location(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Picks the first free path for `file_name` inside `destination`.
///
/// `report.txt` becomes `report_1.txt`, then `report_2.txt`, and so on. Candidates are
/// probed one at a time with no upper bound. Names are built from `OsStr` parts, so
/// non-UTF-8 file names survive renaming.
pub fn resolve_collision(destination: &Path, file_name: &Path) -> PathBuf {
    let candidate = destination.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = file_name.file_stem().unwrap_or_default();
    let ext = file_name.extension();

    let mut counter: u64 = 1;
    loop {
        let mut name = OsString::from(stem);
        name.push(format!("_{}", counter));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let path = destination.join(name);
        if !path.exists() {
            return path;
        }
        counter += 1;
    }
}

/// Moves `file_path` into `destination` under a collision-free name.
pub fn move_into(
    file_path: &Path,
    destination: &Path,
    extension: &str,
) -> MoveResult<MoveRecord> {
    let file_name = file_path.file_name().ok_or_else(|| MoveError::NoFileName {
        source: file_path.to_path_buf(),
    })?;

    // The directory was created when the mapping was set, but it may have been removed since.
    if !destination.is_dir() {
        fs::create_dir_all(destination).map_err(|e| MoveError::DestinationUnavailable {
            destination: destination.to_path_buf(),
            source_error: e,
        })?;
    }

    let candidate = destination.join(file_name);
    let target = resolve_collision(destination, Path::new(file_name));

    move_file(file_path, &target).map_err(|e| MoveError::MoveFailed {
        source: file_path.to_path_buf(),
        destination: target.clone(),
        source_error: e,
    })?;

    Ok(MoveRecord {
        source: file_path.to_path_buf(),
        extension: extension.to_string(),
        candidate,
        destination: target,
    })
}

/// Renames `from` to `to`, copying and deleting when they are on different devices.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "Rename across devices failed ({}), copying {} instead",
                e,
                from.display()
            );
            fs::copy(from, to)?;
            if let Err(remove_error) = fs::remove_file(from) {
                // Leave exactly one copy behind.
                let _ = fs::remove_file(to);
                return Err(remove_error);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
