//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: [`init_tracing`] and the `serve_stdio!` macro
//! - **Results**: helpers for building tool and resource responses
//! - **Errors**: constructors and the [`IntoMcpError`] conversion trait
//!
//! ```rust,ignore
//! use mcp_common::json_success;
//!
//! // main.rs
//! mcp_common::serve_stdio!(MyServer, "my_mcp");
//!
//! // a tool
//! fn my_tool(&self) -> Result<CallToolResult, McpError> {
//!     json_success(&get_some_data())
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;

pub use error::{
    internal_error, invalid_params, invalid_request, resource_not_found, IntoMcpError,
    McpResult, ResultExt,
};
pub use init::init_tracing;
pub use result::{json_resource, json_success, text_success};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, ReadResourceResult},
    ErrorData as McpError,
};
