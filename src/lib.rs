//! Dynamic MCP server and client over JSON-RPC 2.0.
//!
//! Speaks the Model Context Protocol (2024-11-05) over two transports:
//! line-delimited stdio and HTTP+SSE. Tools, resources, and prompts are
//! served from an in-memory registry; a declarative JSON configuration
//! can materialise tasks and multi-step workflows as callable tools at
//! start-up.
//!
//! # Example
//!
//! ```no_run
//! use dyntask_mcp::{
//!     dynamic::{register_tools, DynamicConfig},
//!     protocol::{McpServerBuilder, ServerInfo},
//!     registry::Registry,
//!     server::{McpHandler, ServerState},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DynamicConfig::load("tasks_config.json")?;
//!
//!     let registry = Arc::new(Registry::new());
//!     register_tools(&config, &registry)?;
//!
//!     let state = Arc::new(ServerState::new(
//!         ServerInfo {
//!             name: config.server_info.name.clone(),
//!             version: config.server_info.version.clone(),
//!         },
//!         registry,
//!     ));
//!
//!     let server = McpServerBuilder::new()
//!         .handler(McpHandler::new(state))
//!         .name(config.server_info.name)
//!         .version(config.server_info.version)
//!         .build()?;
//!
//!     server.run_stdio().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dynamic;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use client::McpClient;
pub use dynamic::{register_tools, DynamicConfig};
pub use error::{ClientError, ConfigError, McpError, ProtocolError, Result, TaskError};
pub use protocol::{McpServer, McpServerBuilder};
pub use registry::Registry;
pub use server::{McpHandler, ServerState};
