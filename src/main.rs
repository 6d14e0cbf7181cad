//! Dynamic MCP server binary entry point.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use dyntask_mcp::{
    dynamic::{register_tools, DynamicConfig},
    protocol::{McpServerBuilder, ServerInfo, Session},
    registry::Registry,
    server::{sse, McpHandler, ServerState},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Stdio,
    Sse,
}

#[derive(Parser, Debug)]
#[command(name = "dyntask-mcp")]
#[command(about = "Dynamic MCP server driven by a JSON task configuration", long_about = None)]
struct Args {
    /// Path to the task configuration JSON file
    #[arg(long)]
    config: PathBuf,

    /// Transport mode
    #[arg(long, value_enum, default_value_t = Mode::Stdio)]
    mode: Mode,

    /// Port for SSE mode
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Host for SSE mode
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return Ok(());
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    info!(
        "Starting {} v{} (config: {}, mode: {:?})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        args.config.display(),
        args.mode
    );

    let config = match DynamicConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let registry = Arc::new(Registry::new());
    if let Err(e) = register_tools(&config, &registry) {
        error!("Failed to generate tools: {}", e);
        std::process::exit(1);
    }
    info!("Registered {} tools", registry.tool_count());

    let state = Arc::new(ServerState::new(
        ServerInfo {
            name: config.server_info.name.clone(),
            version: config.server_info.version.clone(),
        },
        registry,
    ));
    let handler = McpHandler::new(state);

    match args.mode {
        Mode::Stdio => {
            let server = McpServerBuilder::new()
                .handler(handler)
                .name(config.server_info.name)
                .version(config.server_info.version)
                .build()?;
            server.run_stdio().await?;
        }
        Mode::Sse => {
            let addr = format!("{}:{}", args.host, args.port);
            sse::serve(Arc::new(handler), Arc::new(Session::new()), &addr).await?;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dyntask_mcp=info,warn"));

    // Structured logs go to stderr; stdout belongs to the protocol in
    // stdio mode.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
