//! Sandboxed Filesystem MCP Library
//!
//! Read-only filesystem access confined to one base directory: read files,
//! list directories, search by glob and content, and (optionally) watch for
//! changes.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use sandbox_fs_mcp::{Sandbox, search::{search, SearchQuery}};
//!
//! let sandbox = Sandbox::new("/srv/project")?;
//! let root = sandbox.resolve("src")?;
//! for hit in search(&sandbox, &root, &SearchQuery::new("*.rs"))?.take(10) {
//!     println!("{}", hit.path);
//! }
//! ```
//!
//! Every path goes through [`Sandbox::resolve`] first; nothing outside the
//! base directory is ever read, listed or reported.

pub mod handlers;
pub mod lister;
pub mod params;
pub mod reader;
pub mod sandbox;
pub mod search;
pub mod server;
pub mod tracker;
pub mod types;

// Re-export main server type
pub use server::SandboxFsServer;

pub use sandbox::{ResolvedPath, Sandbox};
pub use tracker::{ChangeTracker, TrackerState};
pub use types::{ChangeEvent, ChangeKind, Config, FsError, FsResult};

// Re-export parameter types for direct API usage
pub use params::*;
