//! Filesystem operation handlers
//!
//! Each handler resolves its path arguments through the sandbox first, then
//! hands the resolved path to the lister, reader or search engine.

use mcp_common::{
    internal_error, invalid_params, invalid_request, json_resource, json_success, text_success,
    CallToolResult, IntoMcpError, McpError, ReadResourceResult, ResultExt,
};
use tokio_util::sync::CancellationToken;

use crate::lister;
use crate::params::*;
use crate::reader;
use crate::sandbox::Sandbox;
use crate::search::{self, SearchQuery};
use crate::tracker::ChangeTracker;
use crate::types::{Config, FsError, ListDirResponse, SearchFilesResponse};

/// URI of the recent-changes resource
pub const CHANGES_URI: &str = "file-changes://recent";

const DEFAULT_CHANGES_LIMIT: usize = 20;

// ============================================================================
// Helper Functions
// ============================================================================

impl IntoMcpError for FsError {
    fn into_mcp_error(self) -> McpError {
        match &self {
            FsError::PathEscape(_) | FsError::PermissionDenied(_) => {
                invalid_request(self.to_string())
            }
            FsError::NotFound(_)
            | FsError::NotADirectory(_)
            | FsError::IsADirectory(_)
            | FsError::NotAFile(_)
            | FsError::DecodeError(_)
            | FsError::TooLarge { .. }
            | FsError::InvalidPattern(_)
            | FsError::InvalidInput(_) => invalid_params(self.to_string()),
            FsError::Io { .. } | FsError::Config(_) | FsError::Watch(_) => {
                internal_error(self.to_string())
            }
        }
    }
}

fn log_failure(tool: &str, raw_path: &str, err: &FsError) {
    match err {
        FsError::PathEscape(_) => {}
        FsError::Io { .. } => tracing::error!(tool, path = %raw_path, error = %err, "Operation failed"),
        _ => tracing::debug!(tool, path = %raw_path, error = %err, "Operation rejected"),
    }
}

// ============================================================================
// Handler Functions
// ============================================================================

pub async fn read_file(
    sandbox: &Sandbox,
    config: &Config,
    params: ReadFileParams,
) -> Result<CallToolResult, McpError> {
    tracing::debug!(path = %params.path, "read_file");

    let result = match sandbox.resolve(&params.path) {
        Ok(resolved) => reader::read(&resolved, config.limits.max_read_bytes).await,
        Err(e) => Err(e),
    };

    let content = result
        .inspect_err(|e| log_failure("read_file", &params.path, e))
        .to_mcp_err()?;

    Ok(text_success(content))
}

pub async fn list_directory(
    sandbox: &Sandbox,
    config: &Config,
    params: ListDirectoryParams,
) -> Result<CallToolResult, McpError> {
    tracing::debug!(path = %params.path, include_hidden = params.include_hidden, "list_directory");

    let dir = sandbox
        .resolve(&params.path)
        .inspect_err(|e| log_failure("list_directory", &params.path, e))
        .to_mcp_err()?;

    let listing = lister::list(
        sandbox,
        &dir,
        params.include_hidden,
        config.limits.max_list_entries,
    )
    .await
    .inspect_err(|e| log_failure("list_directory", &params.path, e))
    .to_mcp_err()?;

    if listing.skipped > 0 {
        tracing::debug!(path = %dir, skipped = listing.skipped, "Skipped unreadable entries");
    }

    let response = ListDirResponse {
        path: dir.relative().to_string(),
        total_count: listing.entries.len(),
        entries: listing.entries,
        skipped_count: listing.skipped,
        truncated: listing.truncated,
    };

    json_success(&response)
}

pub async fn search_files(
    sandbox: &Sandbox,
    config: &Config,
    params: SearchFilesParams,
    cancel: CancellationToken,
) -> Result<CallToolResult, McpError> {
    tracing::debug!(
        pattern = %params.pattern,
        path = %params.search_path,
        recursive = params.recursive,
        "search_files"
    );

    let root = sandbox
        .resolve(&params.search_path)
        .inspect_err(|e| log_failure("search_files", &params.search_path, e))
        .to_mcp_err()?;

    let cap = config.limits.max_search_results.max(1);
    let limit = params.max_results.unwrap_or(cap).clamp(1, cap);

    let query = SearchQuery {
        pattern: params.pattern.clone(),
        recursive: params.recursive,
        content_regex: params.content_regex.clone(),
        max_depth: config.limits.max_search_depth,
        max_file_bytes: config.limits.max_read_bytes,
    };

    // The walk blocks on directory reads; keep it off the async workers
    let walk_sandbox = sandbox.clone();
    let walk_root = root.clone();
    let walk_cancel = cancel.clone();
    let mut results = tokio::task::spawn_blocking(move || {
        search::search(&walk_sandbox, &walk_root, &query).map(|iter| {
            iter.with_cancellation(walk_cancel)
                .take(limit + 1)
                .collect::<Vec<_>>()
        })
    })
    .await
    .map_err(|e| internal_error(format!("Search task failed: {}", e)))?
    .inspect_err(|e| log_failure("search_files", &params.search_path, e))
    .to_mcp_err()?;

    if cancel.is_cancelled() {
        return Err(internal_error("Search cancelled"));
    }

    let truncated = results.len() > limit;
    results.truncate(limit);
    tracing::debug!(count = results.len(), truncated, "Search finished");

    let response = SearchFilesResponse {
        pattern: params.pattern,
        search_path: root.relative().to_string(),
        total_count: results.len(),
        results,
        truncated,
    };

    json_success(&response)
}

pub async fn recent_changes(
    tracker: Option<&ChangeTracker>,
    params: RecentChangesParams,
) -> Result<CallToolResult, McpError> {
    let tracker = tracker.ok_or_else(|| invalid_request("File change tracking is disabled"))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_CHANGES_LIMIT)
        .min(tracker.capacity());

    json_success(&tracker.recent_changes(limit))
}

/// Body of the `file-changes://recent` resource: the whole buffer, most
/// recent first
pub fn read_changes_resource(
    tracker: Option<&ChangeTracker>,
    uri: &str,
) -> Result<ReadResourceResult, McpError> {
    match tracker {
        Some(tracker) if uri == CHANGES_URI => {
            json_resource(uri, &tracker.recent_changes(tracker.capacity()))
        }
        _ => Err(mcp_common::resource_not_found(uri)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeEvent, ChangeKind, SearchResult};
    use rmcp::model::ResourceContents;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Sandbox, Config) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "hello world\n").unwrap();
        fs::write(dir.path().join("sub/b.txt"), "goodbye\n").unwrap();
        fs::write(dir.path().join("sub/c.md"), "hello md\n").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        (dir, sandbox, Config::default())
    }

    fn text_of(result: &CallToolResult) -> String {
        result.content[0].as_text().unwrap().text.clone()
    }

    fn search_params(pattern: &str) -> SearchFilesParams {
        SearchFilesParams {
            pattern: pattern.to_string(),
            search_path: ".".to_string(),
            recursive: true,
            content_regex: None,
            max_results: None,
        }
    }

    #[tokio::test]
    async fn test_read_file_returns_text() {
        let (_dir, sandbox, config) = setup();
        let params = ReadFileParams {
            path: "a.txt".to_string(),
        };
        let result = read_file(&sandbox, &config, params).await.unwrap();
        assert_eq!(text_of(&result), "hello world\n");
    }

    #[tokio::test]
    async fn test_read_file_outside_is_denied() {
        let (_dir, sandbox, config) = setup();
        for path in ["/etc/passwd", "../../../../etc/passwd"] {
            let params = ReadFileParams {
                path: path.to_string(),
            };
            let err = read_file(&sandbox, &config, params).await.unwrap_err();
            assert!(err.message.contains("Access denied"), "{}", err.message);
            assert!(!err.message.contains("root:"));
        }
    }

    #[tokio::test]
    async fn test_read_file_errors_are_relative() {
        let (_dir, sandbox, config) = setup();
        let params = ReadFileParams {
            path: "sub".to_string(),
        };
        let err = read_file(&sandbox, &config, params).await.unwrap_err();
        assert!(err.message.contains("Is a directory: sub"));
        assert!(!err.message.contains(&sandbox.base().display().to_string()));
    }

    #[tokio::test]
    async fn test_list_directory_json() {
        let (_dir, sandbox, config) = setup();
        let params = ListDirectoryParams {
            path: ".".to_string(),
            include_hidden: false,
        };
        let result = list_directory(&sandbox, &config, params).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(json["path"], ".");
        assert_eq!(json["total_count"], 2);
        assert_eq!(json["entries"][0]["name"], "a.txt");
        assert_eq!(json["entries"][0]["size_bytes"], 12);
        assert_eq!(json["entries"][1]["is_directory"], true);
    }

    #[tokio::test]
    async fn test_list_directory_with_hidden() {
        let (_dir, sandbox, config) = setup();
        let params = ListDirectoryParams {
            path: String::new(),
            include_hidden: true,
        };
        let result = list_directory(&sandbox, &config, params).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(json["total_count"], 3);
        assert_eq!(json["entries"][0]["name"], ".hidden");
        assert_eq!(json["entries"][0]["is_hidden"], true);
    }

    #[tokio::test]
    async fn test_search_files_glob() {
        let (_dir, sandbox, config) = setup();
        let result = search_files(&sandbox, &config, search_params("*.txt"), CancellationToken::new())
            .await
            .unwrap();
        let response: SearchFilesResponse = serde_json::from_str(&text_of(&result)).unwrap();
        let paths: Vec<_> = response.results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub/b.txt"]);
        assert!(!response.truncated);
    }

    #[tokio::test]
    async fn test_search_files_content() {
        let (_dir, sandbox, config) = setup();
        let params = SearchFilesParams {
            content_regex: Some("hello".to_string()),
            ..search_params("*.txt")
        };
        let result = search_files(&sandbox, &config, params, CancellationToken::new())
            .await
            .unwrap();
        let response: SearchFilesResponse = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(
            response.results,
            vec![SearchResult {
                path: "a.txt".to_string(),
                size_bytes: 12,
                line_number: Some(1),
                matched_content_snippet: Some("hello world".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_search_files_truncates() {
        let (_dir, sandbox, config) = setup();
        let params = SearchFilesParams {
            max_results: Some(1),
            ..search_params("*")
        };
        let result = search_files(&sandbox, &config, params, CancellationToken::new())
            .await
            .unwrap();
        let response: SearchFilesResponse = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(response.total_count, 1);
        assert!(response.truncated);
    }

    #[tokio::test]
    async fn test_search_files_bad_pattern() {
        let (_dir, sandbox, config) = setup();
        let err = search_files(&sandbox, &config, search_params("[x"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.message.contains("Invalid pattern"));
    }

    #[tokio::test]
    async fn test_search_files_cancelled() {
        let (_dir, sandbox, config) = setup();
        let token = CancellationToken::new();
        token.cancel();
        let err = search_files(&sandbox, &config, search_params("*"), token)
            .await
            .unwrap_err();
        assert!(err.message.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_recent_changes_disabled() {
        let params = RecentChangesParams { limit: None };
        assert!(recent_changes(None, params).await.is_err());
    }

    #[tokio::test]
    async fn test_recent_changes_and_resource() {
        let (_dir, sandbox, _config) = setup();
        let tracker = ChangeTracker::new(sandbox, 10);
        tracker.record(ChangeEvent::new("a.txt", ChangeKind::Created));
        tracker.record(ChangeEvent::new("a.txt", ChangeKind::Modified));

        let result = recent_changes(Some(&tracker), RecentChangesParams { limit: Some(1) })
            .await
            .unwrap();
        let events: Vec<ChangeEvent> = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Modified);

        let resource = read_changes_resource(Some(&tracker), CHANGES_URI).unwrap();
        match &resource.contents[0] {
            ResourceContents::TextResourceContents { text, .. } => {
                let events: Vec<ChangeEvent> = serde_json::from_str(text).unwrap();
                assert_eq!(events.len(), 2);
                assert_eq!(events[1].kind, ChangeKind::Created);
            }
            other => panic!("unexpected contents: {:?}", other),
        }

        assert!(read_changes_resource(Some(&tracker), "file-changes://other").is_err());
        assert!(read_changes_resource(None, CHANGES_URI).is_err());
    }
}
