//! MCP server implementation: registry-backed handler and transports.

pub mod handler;
pub mod sse;
pub mod state;

pub use handler::McpHandler;
pub use state::ServerState;
