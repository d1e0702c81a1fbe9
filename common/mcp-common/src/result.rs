//! Result helpers for MCP tool and resource responses

use rmcp::{
    model::{CallToolResult, Content, ReadResourceResult, ResourceContents},
    ErrorData as McpError,
};
use serde::Serialize;

/// Pretty-printed JSON tool result
///
/// ```rust,ignore
/// json_success(&response)
/// ```
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Plain text tool result
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Pretty-printed JSON body for a resource read, tagged with its URI
///
/// # Arguments
///
/// * `uri` - The resource URI the client asked for
/// * `data` - Any type that implements `Serialize`
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::json_resource;
///
/// async move { json_resource("file-changes://recent", &events) }
/// ```
pub fn json_resource<T: Serialize>(
    uri: impl Into<String>,
    data: &T,
) -> Result<ReadResourceResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(ReadResourceResult {
        contents: vec![ResourceContents::text(json, uri)],
    })
}
