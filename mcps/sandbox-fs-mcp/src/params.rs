//! Parameter types for the sandboxed filesystem tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    #[schemars(description = "Path to the file to read, relative to the base directory")]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListDirectoryParams {
    #[schemars(description = "Directory to list, relative to the base directory (default: '.')")]
    #[serde(default = "default_path")]
    pub path: String,

    #[schemars(description = "Include entries whose name starts with '.' (default: false)")]
    #[serde(default, deserialize_with = "crate::types::deserialize_lenient_bool")]
    pub include_hidden: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchFilesParams {
    #[schemars(
        description = "Glob pattern matched against file names (e.g. '*.rs'). Patterns containing '/' match paths below search_path (e.g. 'data/*.csv'); recursive searches also match them under any subdirectory"
    )]
    pub pattern: String,

    #[schemars(description = "Directory to search from (default: '.')")]
    #[serde(default = "default_path")]
    pub search_path: String,

    #[schemars(description = "Descend into subdirectories (default: true)")]
    #[serde(default = "default_true", deserialize_with = "crate::types::deserialize_lenient_bool")]
    pub recursive: bool,

    #[schemars(description = "Only return files with a line matching this regular expression")]
    #[serde(default)]
    pub content_regex: Option<String>,

    #[schemars(description = "Stop after this many results (capped by server config)")]
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecentChangesParams {
    #[schemars(description = "Maximum number of events to return, most recent first (default: 20)")]
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_path() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}
