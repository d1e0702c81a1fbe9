//! Server initialization utilities
//!
//! Tracing setup and the `serve_stdio!` macro used by the servers in this
//! workspace.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Env var holding the default verbosity for the server crate
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Env var selecting the output format (`json` or text)
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Initialize tracing/logging for an MCP server
///
/// Logs go to stderr because stdout carries the MCP protocol.
///
/// - `RUST_LOG` filters as usual
/// - `LOG_LEVEL` sets the default level for `crate_name` (default `info`)
/// - `LOG_FORMAT=json` switches to structured JSON lines
///
/// ```rust,ignore
/// mcp_common::init_tracing("sandbox_fs_mcp")?;
/// ```
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let level = default_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref());
    let directive = format!("{}={}", crate_name, level);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let use_json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

/// Map a `LOG_LEVEL` value onto a tracing level name
///
/// Accepts the usual tracing names plus `warning` and `critical`; anything
/// unrecognised falls back to `info`.
pub fn default_level(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") | Some("critical") => "error",
        Some("off") => "off",
        _ => "info",
    }
}

/// Generate a `#[tokio::main]` that serves `$server_type` over stdio
///
/// The server type must provide `try_new() -> Result<Self, E>` where `E`
/// converts into `anyhow::Error`; a failed construction aborts startup with
/// that error instead of panicking.
///
/// ```rust,ignore
/// mcp_common::serve_stdio!(SandboxFsServer, "sandbox_fs_mcp");
/// ```
#[macro_export]
macro_rules! serve_stdio {
    ($server_type:ty, $crate_name:expr) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            $crate::init_tracing($crate_name)?;

            tracing::info!(concat!("Starting ", $crate_name, " MCP Server"));

            let server = <$server_type>::try_new()?;
            let service = server.serve(rmcp::transport::stdio()).await?;

            tracing::info!("Server running, waiting for requests...");

            service.waiting().await?;

            tracing::info!("Server shutting down");
            Ok(())
        }
    };
}
