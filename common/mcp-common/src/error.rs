//! MCP error constructors
//!
//! Thin wrappers over `rmcp::ErrorData` so handlers never build error data
//! by hand.

use rmcp::ErrorData as McpError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Conversion of a domain error into an MCP error
///
/// Servers implement this for their own error enum to pick the protocol
/// error class per variant.
pub trait IntoMcpError {
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(format!("JSON error: {}", self), None)
    }
}

/// Extension trait adding `to_mcp_err()` to any `Result` whose error
/// implements [`IntoMcpError`]
pub trait ResultExt<T> {
    fn to_mcp_err(self) -> Result<T, McpError>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> Result<T, McpError> {
        self.map_err(|e| e.into_mcp_error())
    }
}

/// Server-side failure the caller cannot fix
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// The tool arguments were wrong (bad path, bad pattern, ...)
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}

/// The request is well-formed but not permitted
pub fn invalid_request(message: impl Into<String>) -> McpError {
    McpError::invalid_request(message.into(), None)
}

/// A resource URI that the server does not serve
///
/// # Arguments
///
/// * `uri` - The URI from the read request; it is echoed in the message
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::resource_not_found;
///
/// match request.uri.as_str() {
///     "file-changes://recent" => read_changes(),
///     other => Err(resource_not_found(other)),
/// }
/// ```
pub fn resource_not_found(uri: impl Into<String>) -> McpError {
    McpError::resource_not_found(format!("Unknown resource URI: {}", uri.into()), None)
}
