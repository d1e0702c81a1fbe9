//! Type definitions for the sandboxed filesystem MCP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ============================================================================
// Configuration Types
// ============================================================================

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory the server is confined to (defaults to the working directory)
    #[serde(default)]
    pub base_dir: Option<String>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Env var overriding `base_dir`
pub const BASE_DIR_ENV: &str = "MCP_BASE_DIR";

/// Env var overriding `watch.enabled`
pub const WATCH_ENV: &str = "MCP_WATCH_CHANGES";

impl Config {
    /// Apply environment overrides on top of file-based config
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(BASE_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.base_dir = Some(dir);
        }
        if let Some(raw) = lookup(WATCH_ENV) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.watch.enabled = true,
                "0" | "false" | "no" | "off" => self.watch.enabled = false,
                other => tracing::warn!("Ignoring {}={}: expected true/false", WATCH_ENV, other),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Largest file `read_file` will return, and content search will scan
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: u64,
    /// Maximum entries per directory listing
    #[serde(default = "default_max_list_entries")]
    pub max_list_entries: usize,
    /// Default cap on search results
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    /// Maximum directory depth for recursive search
    #[serde(default = "default_max_search_depth")]
    pub max_search_depth: usize,
}

fn default_max_read_bytes() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_list_entries() -> usize {
    1000
}

fn default_max_search_results() -> usize {
    1000
}

fn default_max_search_depth() -> usize {
    32
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_read_bytes: default_max_read_bytes(),
            max_list_entries: default_max_list_entries(),
            max_search_results: default_max_search_results(),
            max_search_depth: default_max_search_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Track filesystem changes under the base directory
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of change events kept in memory
    #[serde(default = "default_change_capacity")]
    pub capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_change_capacity() -> usize {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_change_capacity(),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    /// Files only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    pub is_hidden: bool,
}

/// Response for list_directory
#[derive(Debug, Serialize, Deserialize)]
pub struct ListDirResponse {
    pub path: String,
    pub entries: Vec<DirectoryEntry>,
    pub total_count: usize,
    /// Entries dropped because their metadata could not be read
    pub skipped_count: usize,
    pub truncated: bool,
}

/// One matching file, path relative to the base directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_content_snippet: Option<String>,
}

/// Response for search_files
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchFilesResponse {
    pub pattern: String,
    pub search_path: String,
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// A filesystem change observed under the base directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
    /// Source path of a move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Utc::now(),
            previous_path: None,
        }
    }

    pub fn moved(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            previous_path: Some(from.into()),
            ..Self::new(to, ChangeKind::Moved)
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Every message refers to paths relative to the base directory; the
/// absolute location of anything outside the sandbox never appears here.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Access denied: '{0}' is outside the allowed directory")]
    PathEscape(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Not a regular file: {0}")]
    NotAFile(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File is not valid UTF-8 text: {0}")]
    DecodeError(String),

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error ({kind}): {path}")]
    Io {
        kind: std::io::ErrorKind,
        path: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Watch error: {0}")]
    Watch(String),
}

impl FsError {
    /// Classify an OS error for a sandbox-relative path, dropping the OS
    /// message (it may embed absolute paths)
    pub fn from_io(err: &std::io::Error, rel_path: &str) -> Self {
        use std::io::ErrorKind;

        let path = rel_path.to_string();
        match err.kind() {
            ErrorKind::NotFound => FsError::NotFound(path),
            ErrorKind::PermissionDenied => FsError::PermissionDenied(path),
            kind => FsError::Io { kind, path },
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

// ============================================================================
// Serde helpers
// ============================================================================

/// Accept `true`/`false` as booleans or strings; some clients stringify
/// every argument
pub fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Bool(bool),
        Str(String),
    }

    match Lenient::deserialize(deserializer)? {
        Lenient::Bool(b) => Ok(b),
        Lenient::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got '{}'",
                other
            ))),
        },
    }
}
