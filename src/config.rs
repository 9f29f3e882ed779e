//! Persistent watch and extension-routing configuration.
//!
//! This module owns the single configuration document that drives the organizer:
//! - the ordered list of watched directories
//! - the mapping from normalized file extensions to destination directories
//!
//! Every mutation goes through [`ConfigStore`] and is written back to disk before the
//! call returns.
//!
//! # Configuration File Format
//!
//! The document is stored as JSON:
//!
//! ```json
//! {
//!   "watch_dirs": ["/home/user/Downloads"],
//!   "extension_dirs": {
//!     ".pdf": "/home/user/Documents/PDF",
//!     ".tmp": null
//!   }
//! }
//! ```
//!
//! Missing fields default to empty. Unknown top-level fields are ignored by the
//! organizer but written back unchanged.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// File name of the configuration document inside the home directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".auto_move_config.json";

/// Errors that can occur while loading or mutating the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file exists but is not a valid document.
    ConfigInvalid { path: PathBuf, reason: String },
    /// IO error while reading or writing the configuration file.
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A destination directory could not be created.
    DestinationCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The extension cannot be normalized into a `.ext` key.
    InvalidExtension(String),
    /// `~` was used but the home directory could not be determined.
    HomeDirUnavailable,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigInvalid { path, reason } => {
                write!(f, "Invalid configuration {}: {}", path.display(), reason)
            }
            ConfigError::IoError { path, source } => {
                write!(f, "IO error on configuration {}: {}", path.display(), source)
            }
            ConfigError::DestinationCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create destination directory {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidExtension(ext) => {
                write!(f, "Invalid extension '{}': expected something like .pdf", ext)
            }
            ConfigError::HomeDirUnavailable => write!(f, "Home directory could not be determined"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. }
            | ConfigError::DestinationCreationFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The persisted configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizerConfig {
    /// Directories scanned on every pass, in the order they were added.
    #[serde(default)]
    pub watch_dirs: Vec<PathBuf>,

    /// Normalized extension (`.pdf`) to destination directory. `None` disables routing.
    #[serde(default)]
    pub extension_dirs: BTreeMap<String, Option<PathBuf>>,

    /// Top-level fields this version does not know about, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrganizerConfig {
    /// Normalizes a freshly parsed document.
    ///
    /// Extension keys are lowercased and dotted but otherwise kept as written, empty
    /// destinations become `None`, and duplicate watch directories collapse onto their
    /// first occurrence. Only blank keys are dropped.
    fn validated(self) -> Self {
        let mut watch_dirs: Vec<PathBuf> = Vec::with_capacity(self.watch_dirs.len());
        for dir in self.watch_dirs {
            if !watch_dirs.contains(&dir) {
                watch_dirs.push(dir);
            }
        }

        let mut extension_dirs = BTreeMap::new();
        for (raw_key, dest) in self.extension_dirs {
            let Some(key) = extension_key(&raw_key) else {
                log::warn!("Dropping empty extension key {:?} from configuration", raw_key);
                continue;
            };
            let dest = dest.filter(|d| !d.as_os_str().is_empty());
            let slot = extension_dirs.entry(key).or_insert(None);
            if dest.is_some() {
                *slot = dest;
            }
        }

        Self {
            watch_dirs,
            extension_dirs,
            extra: self.extra,
        }
    }

    /// Returns the destination configured for `extension`, if routing is enabled.
    pub fn destination_for(&self, extension: &str) -> Option<&Path> {
        let key = extension_key(extension)?;
        self.extension_dirs
            .get(&key)
            .and_then(|dest| dest.as_deref())
            .filter(|dest| !dest.as_os_str().is_empty())
    }

    /// Returns true if `extension` has a key in the mapping, routed or not.
    pub fn is_mapped(&self, extension: &str) -> bool {
        extension_key(extension).is_some_and(|key| self.extension_dirs.contains_key(&key))
    }
}

fn extension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\.[^\s./\\]+$").expect("extension pattern is valid"))
}

/// Lowercases `input` and gives it a leading dot. `None` for blank input or a bare dot.
///
/// Keys read from disk go through this only, so documents written by other tools
/// (`.tar.gz`, `.my ext`) load unchanged.
fn extension_key(input: &str) -> Option<String> {
    let lowered = input.trim().to_lowercase();
    let key = if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{}", lowered)
    };
    (key.len() > 1).then_some(key)
}

/// Normalizes user input into an extension key: lowercase with one leading dot.
///
/// `"PDF"`, `"pdf"`, `".pdf"` and `".PDF"` all become `".pdf"`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidExtension` for empty input, a bare dot, or input that
/// contains whitespace, path separators or inner dots. A file's extension is only ever
/// the part after its last dot, so `.tar.gz` could never match a file.
pub fn normalize_extension(input: &str) -> ConfigResult<String> {
    extension_key(input)
        .filter(|key| extension_pattern().is_match(key))
        .ok_or_else(|| ConfigError::InvalidExtension(input.to_string()))
}

/// Expands a leading `~` to the home directory and makes the path absolute.
pub fn expand_path(input: impl AsRef<Path>) -> ConfigResult<PathBuf> {
    let path = input.as_ref();
    let mut components = path.components();

    let expanded = match components.next() {
        Some(Component::Normal(first)) if first == OsStr::new("~") => {
            let home = dirs::home_dir().ok_or(ConfigError::HomeDirUnavailable)?;
            let rest = components.as_path();
            if rest.as_os_str().is_empty() {
                home
            } else {
                home.join(rest)
            }
        }
        _ => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        return Ok(expanded);
    }

    std::path::absolute(&expanded).map_err(|e| ConfigError::IoError {
        path: expanded.clone(),
        source: e,
    })
}

/// Owns the configuration document and its location on disk.
///
/// There is exactly one in-memory copy per store; hosts pass `store.config()` to the
/// organizer for each pass.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: OrganizerConfig,
}

impl ConfigStore {
    /// Returns `~/.auto_move_config.json`.
    pub fn default_path() -> ConfigResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_CONFIG_FILE_NAME))
            .ok_or(ConfigError::HomeDirUnavailable)
    }

    /// Opens the store at `path`, or at the default location when `None`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigInvalid` if the file exists but does not parse and
    /// `ConfigError::IoError` if it cannot be read.
    pub fn open(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => expand_path(path)?,
            None => Self::default_path()?,
        };
        let config = Self::load(&path)?;
        Ok(Self { path, config })
    }

    /// Reads the document at `path`. A missing file yields an empty document.
    pub fn load(path: &Path) -> ConfigResult<OrganizerConfig> {
        if !path.exists() {
            return Ok(OrganizerConfig::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let parsed: OrganizerConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(parsed.validated())
    }

    /// Re-reads the document from disk, replacing the in-memory copy.
    ///
    /// On error the previous copy is kept.
    pub fn reload(&mut self) -> ConfigResult<()> {
        self.config = Self::load(&self.path)?;
        Ok(())
    }

    /// Writes the whole document to disk.
    pub fn save(&self) -> ConfigResult<()> {
        let io_error = |source: std::io::Error| ConfigError::IoError {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(&self.config).map_err(|e| {
            io_error(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            ))
        })?;

        // Readers polling the file never observe a half-written document.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(io_error)?;
        fs::rename(&tmp_path, &self.path).map_err(io_error)?;

        Ok(())
    }

    /// Location of the configuration document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the current document.
    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    /// Watched directories in insertion order.
    pub fn watch_directories(&self) -> &[PathBuf] {
        &self.config.watch_dirs
    }

    /// The full extension mapping, including disabled entries.
    pub fn extension_mappings(&self) -> &BTreeMap<String, Option<PathBuf>> {
        &self.config.extension_dirs
    }

    /// Adds a watch directory. Returns `false` if it was already present.
    ///
    /// The directory is not created; a missing watch directory is skipped by each pass.
    pub fn add_watch_directory(&mut self, directory: impl AsRef<Path>) -> ConfigResult<bool> {
        let directory = expand_path(directory)?;
        if self.config.watch_dirs.contains(&directory) {
            return Ok(false);
        }
        self.config.watch_dirs.push(directory);
        self.save()?;
        Ok(true)
    }

    /// Removes a watch directory. Returns `false` if it was not present.
    pub fn remove_watch_directory(&mut self, directory: impl AsRef<Path>) -> ConfigResult<bool> {
        let directory = expand_path(directory)?;
        let before = self.config.watch_dirs.len();
        self.config.watch_dirs.retain(|dir| dir != &directory);
        if self.config.watch_dirs.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Routes `extension` to `destination`, or disables routing with `None`.
    ///
    /// A non-empty destination is expanded and created (with parents) before the
    /// mapping is stored. Returns the normalized extension key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DestinationCreationFailed` if the directory cannot be
    /// created; the mapping is left unchanged in that case.
    pub fn set_extension_destination(
        &mut self,
        extension: &str,
        destination: Option<&Path>,
    ) -> ConfigResult<String> {
        let key = normalize_extension(extension)?;

        let destination = match destination.filter(|d| !d.as_os_str().is_empty()) {
            Some(dest) => {
                let dest = expand_path(dest)?;
                if !dest.is_dir() {
                    fs::create_dir_all(&dest).map_err(|e| {
                        ConfigError::DestinationCreationFailed {
                            path: dest.clone(),
                            source: e,
                        }
                    })?;
                }
                Some(dest)
            }
            None => None,
        };

        self.config.extension_dirs.insert(key.clone(), destination);
        self.save()?;
        Ok(key)
    }

    /// Disables routing for `extension`, keeping the key with a `null` destination.
    ///
    /// Accepts any key already present in the document, even one `normalize_extension`
    /// would refuse, so entries written by other tools can still be switched off.
    pub fn remove_extension(&mut self, extension: &str) -> ConfigResult<String> {
        let key = match extension_key(extension) {
            Some(key) if self.config.extension_dirs.contains_key(&key) => key,
            _ => normalize_extension(extension)?,
        };
        self.config.extension_dirs.insert(key.clone(), None);
        self.save()?;
        Ok(key)
    }

    /// Looks up the destination for `extension` after normalizing it.
    pub fn get_extension_destination(&self, extension: &str) -> Option<&Path> {
        self.config.destination_for(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp_dir: &TempDir) -> ConfigStore {
        ConfigStore::open(Some(temp_dir.path().join("config.json").as_path()))
            .expect("Failed to open config store")
    }

    #[test]
    fn test_normalize_extension_variants() {
        for input in ["PDF", "pdf", ".pdf", ".PDF", "  .Pdf "] {
            assert_eq!(normalize_extension(input).unwrap(), ".pdf");
        }
    }

    #[test]
    fn test_normalize_extension_rejects_garbage() {
        for input in ["", ".", "tar.gz", "a b", "../x", "dir/ext"] {
            assert!(
                matches!(
                    normalize_extension(input),
                    Err(ConfigError::InvalidExtension(_))
                ),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_expand_path_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~").unwrap(), home);
            assert_eq!(expand_path("~/Downloads").unwrap(), home.join("Downloads"));
        }
    }

    #[test]
    fn test_expand_path_makes_relative_absolute() {
        let expanded = expand_path("some/relative/dir").unwrap();
        assert!(expanded.is_absolute());
        assert!(expanded.ends_with("some/relative/dir"));
    }

    #[test]
    fn test_missing_file_yields_empty_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);

        assert!(store.watch_directories().is_empty());
        assert!(store.extension_mappings().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_malformed_file_is_config_invalid() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let result = ConfigStore::open(Some(path.as_path()));
        assert!(matches!(result, Err(ConfigError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_load_normalizes_document() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "watch_dirs": ["/w", "/w", "/v"],
                "extension_dirs": {"PDF": "/p", ".txt": "", ".md": null}
            }"#,
        )
        .unwrap();

        let config = ConfigStore::load(&path).unwrap();
        assert_eq!(
            config.watch_dirs,
            vec![PathBuf::from("/w"), PathBuf::from("/v")]
        );
        assert_eq!(
            config.extension_dirs.get(".pdf"),
            Some(&Some(PathBuf::from("/p")))
        );
        assert_eq!(config.extension_dirs.get(".txt"), Some(&None));
        assert_eq!(config.extension_dirs.get(".md"), Some(&None));
    }

    #[test]
    fn test_load_keeps_keys_user_input_would_reject() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "watch_dirs": ["/w"],
                "extension_dirs": {".tar.gz": "/a", "My Ext": "/m", ".pdf": "/p", " ": "/x"}
            }"#,
        )
        .unwrap();

        let mut store = ConfigStore::open(Some(path.as_path())).unwrap();

        assert_eq!(store.watch_directories(), &[PathBuf::from("/w")]);
        assert_eq!(store.get_extension_destination("pdf"), Some(Path::new("/p")));
        assert_eq!(store.get_extension_destination(".TAR.GZ"), Some(Path::new("/a")));
        assert_eq!(store.get_extension_destination(".my ext"), Some(Path::new("/m")));
        assert_eq!(store.extension_mappings().len(), 3);

        // Legacy keys can still be switched off.
        assert_eq!(store.remove_extension(".tar.gz").unwrap(), ".tar.gz");
        assert_eq!(store.get_extension_destination(".tar.gz"), None);
        assert!(store.set_extension_destination("tar.gz", None).is_err());
    }

    #[test]
    fn test_missing_fields_default_and_unknown_fields_survive() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let mut store = ConfigStore::open(Some(path.as_path())).unwrap();
        assert!(store.watch_directories().is_empty());

        store.add_watch_directory(temp_dir.path()).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert!(raw["watch_dirs"].is_array());
        assert!(raw["extension_dirs"].is_object());
    }

    #[test]
    fn test_add_watch_directory_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = store_in(&temp_dir);
        let watched = temp_dir.path().join("watched");

        assert!(store.add_watch_directory(&watched).unwrap());
        assert!(!store.add_watch_directory(&watched).unwrap());
        assert_eq!(store.watch_directories(), &[watched.clone()]);
        // Watch directories are never created.
        assert!(!watched.exists());
    }

    #[test]
    fn test_remove_absent_watch_directory_is_noop() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = store_in(&temp_dir);

        assert!(!store.remove_watch_directory(temp_dir.path()).unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_set_extension_destination_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = store_in(&temp_dir);
        let dest = temp_dir.path().join("docs").join("pdf");

        let key = store.set_extension_destination("PDF", Some(dest.as_path())).unwrap();

        assert_eq!(key, ".pdf");
        assert!(dest.is_dir());
        assert_eq!(store.get_extension_destination(".Pdf"), Some(dest.as_path()));
    }

    #[test]
    fn test_set_extension_destination_none_disables_routing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = store_in(&temp_dir);
        let dest = temp_dir.path().join("txt");

        store.set_extension_destination("txt", Some(dest.as_path())).unwrap();
        store.remove_extension(".TXT").unwrap();

        assert_eq!(store.get_extension_destination("txt"), None);
        assert_eq!(store.extension_mappings().get(".txt"), Some(&None));

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw["extension_dirs"][".txt"].is_null());
    }

    #[test]
    fn test_set_extension_destination_failure_keeps_mapping() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut store = store_in(&temp_dir);
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();

        let result = store.set_extension_destination("pdf", Some(blocker.join("sub").as_path()));

        assert!(matches!(
            result,
            Err(ConfigError::DestinationCreationFailed { .. })
        ));
        assert!(store.extension_mappings().is_empty());
    }

    #[test]
    fn test_persistence_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watched = temp_dir.path().join("inbox");
        let dest = temp_dir.path().join("pdfs");

        {
            let mut store = store_in(&temp_dir);
            store.add_watch_directory(&watched).unwrap();
            store.set_extension_destination(".pdf", Some(dest.as_path())).unwrap();
        }

        let mut reopened = store_in(&temp_dir);
        assert_eq!(reopened.watch_directories(), &[watched.clone()]);
        assert_eq!(reopened.get_extension_destination("pdf"), Some(dest.as_path()));

        reopened.remove_watch_directory(&watched).unwrap();
        let reopened = store_in(&temp_dir);
        assert!(reopened.watch_directories().is_empty());
    }

    #[test]
    fn test_reload_picks_up_external_edits() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut first = store_in(&temp_dir);
        let mut second = store_in(&temp_dir);

        second.add_watch_directory(temp_dir.path()).unwrap();
        assert!(first.watch_directories().is_empty());

        first.reload().unwrap();
        assert_eq!(first.watch_directories().len(), 1);
    }
}
