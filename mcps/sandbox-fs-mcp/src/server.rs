//! MCP Server implementation for sandboxed filesystem access
//!
//! This module defines the main MCP server that exposes the sandbox as tools
//! and the change history as a resource. Handler implementations are in the
//! handlers module.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use mcp_common::{CallToolResult, McpError};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, ListResourcesResult, PaginatedRequestParam, RawResource,
        ReadResourceRequestParam, ReadResourceResult, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, RoleServer,
};

use crate::handlers::{self, CHANGES_URI};
use crate::params::*;
use crate::sandbox::Sandbox;
use crate::tracker::ChangeTracker;
use crate::types::{Config, FsError};

/// Env var naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FS_SANDBOX_CONFIG";

/// The sandboxed filesystem MCP server
#[derive(Clone)]
pub struct SandboxFsServer {
    sandbox: Sandbox,
    config: Arc<Config>,
    tracker: Option<Arc<ChangeTracker>>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to its handler
// ============================================================================

#[tool_router]
impl SandboxFsServer {
    /// Create a server from config files and environment
    ///
    /// Config is searched in order:
    /// 1. `FS_SANDBOX_CONFIG` env var
    /// 2. `./sandbox-fs-mcp.toml`
    /// 3. `$XDG_CONFIG_HOME/sandbox-fs-mcp/config.toml`
    /// 4. `~/.binks/sandbox-fs.toml`
    /// 5. Default config if none found
    ///
    /// `MCP_BASE_DIR` and `MCP_WATCH_CHANGES` then override the file.
    pub fn try_new() -> Result<Self, FsError> {
        let mut config = Self::load_config();
        config.apply_env(|key| std::env::var(key).ok());
        Self::with_config(config)
    }

    /// Create a server with explicit config
    ///
    /// Fails if the base directory is missing or not a directory. A change
    /// tracker that cannot start is logged and left disabled.
    pub fn with_config(config: Config) -> Result<Self, FsError> {
        let base_dir = match &config.base_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()
                .map_err(|e| FsError::Config(format!("Cannot read working directory: {}", e)))?,
        };
        let sandbox = Sandbox::new(&base_dir)?;
        tracing::info!("Base directory set to: {}", sandbox.base().display());

        let tracker = if config.watch.enabled {
            let tracker = ChangeTracker::new(sandbox.clone(), config.watch.capacity);
            match tracker.start() {
                Ok(()) => Some(Arc::new(tracker)),
                Err(e) => {
                    tracing::warn!("File monitoring disabled: {}", e);
                    None
                }
            }
        } else {
            tracing::info!("File monitoring disabled by configuration");
            None
        };

        Ok(Self {
            sandbox,
            config: Arc::new(config),
            tracker,
            tool_router: Self::tool_router(),
        })
    }

    /// Load config from standard file locations
    fn load_config() -> Config {
        // 1. Check FS_SANDBOX_CONFIG env var first
        if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                if let Some(config) = Self::read_config(&path) {
                    return config;
                }
            } else {
                tracing::warn!("{}={} does not exist", CONFIG_PATH_ENV, env_path);
            }
        }

        // 2-4. Check standard file locations
        let mut config_paths = vec![PathBuf::from("sandbox-fs-mcp.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("sandbox-fs-mcp").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            config_paths.push(home.join(".binks").join("sandbox-fs.toml"));
        }

        for path in config_paths {
            if path.exists() {
                if let Some(config) = Self::read_config(&path) {
                    return config;
                }
            }
        }

        // 5. Default config
        tracing::info!("Using default configuration");
        Config::default()
    }

    fn read_config(path: &std::path::Path) -> Option<Config> {
        let content = std::fs::read_to_string(path)
            .inspect_err(|e| tracing::warn!("Failed to read config {}: {}", path.display(), e))
            .ok()?;
        match toml::from_str::<Config>(&content) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// The sandbox every tool call is confined to
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Change tracker, when enabled and running
    pub fn tracker(&self) -> Option<&ChangeTracker> {
        self.tracker.as_deref()
    }

    #[tool(
        description = "Read the complete contents of a UTF-8 text file inside the base directory. Paths are relative to the base directory."
    )]
    async fn read_file(
        &self,
        Parameters(params): Parameters<ReadFileParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::read_file(&self.sandbox, &self.config, params).await
    }

    #[tool(
        description = "List the immediate contents of a directory with name, type, size, modification time and hidden flag. Hidden (dot) entries are excluded unless include_hidden is true."
    )]
    async fn list_directory(
        &self,
        Parameters(params): Parameters<ListDirectoryParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::list_directory(&self.sandbox, &self.config, params).await
    }

    #[tool(
        description = "Search for files matching a glob pattern, optionally only those containing a line matching content_regex. Returns paths relative to the base directory, with the first matching line when content_regex is given."
    )]
    async fn search_files(
        &self,
        Parameters(params): Parameters<SearchFilesParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        handlers::search_files(&self.sandbox, &self.config, params, context.ct.clone()).await
    }

    #[tool(
        description = "Get recent file changes (created, modified, deleted, moved) under the base directory, most recent first. Only available when change tracking is enabled."
    )]
    async fn recent_changes(
        &self,
        Parameters(params): Parameters<RecentChangesParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::recent_changes(self.tracker(), params).await
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for SandboxFsServer {
    fn get_info(&self) -> ServerInfo {
        let capabilities = if self.tracker.is_some() {
            ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build()
        } else {
            ServerCapabilities::builder().enable_tools().build()
        };

        ServerInfo {
            instructions: Some(
                "Read-only filesystem access confined to a single base directory. \
                 All paths are relative to that directory; attempts to leave it are rejected. \
                 Use list_directory to explore, search_files to find files by name or content, \
                 and read_file to read them."
                    .into(),
            ),
            capabilities,
            ..Default::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            let mut resources = Vec::new();

            if self.tracker.is_some() {
                let mut resource = RawResource::new(CHANGES_URI, "recent-file-changes");
                resource.description =
                    Some("Recent filesystem changes under the base directory, most recent first".to_string());
                resource.mime_type = Some("application/json".to_string());
                resources.push(resource.no_annotation());
            }

            Ok(ListResourcesResult::with_all_items(resources))
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move { handlers::read_changes_resource(self.tracker(), &request.uri) }
    }
}
