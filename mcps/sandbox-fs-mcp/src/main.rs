//! Sandboxed Filesystem MCP - read-only filesystem server confined to a base directory
//!
//! The base directory comes from `MCP_BASE_DIR`, a config file, or the
//! working directory, in that order of precedence.

use sandbox_fs_mcp::SandboxFsServer;

mcp_common::serve_stdio!(SandboxFsServer, "sandbox_fs_mcp");
