//! Error types for the dynamic MCP server and client.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` conversions.

use std::borrow::Cow;
use thiserror::Error;

/// Main error type for the crate.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

/// JSON-RPC 2.0 and MCP protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error")]
    ParseError,

    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(Cow<'static, str>),

    #[error("Internal error: {0}")]
    InternalError(Cow<'static, str>),

    #[error("Server not initialized")]
    NotInitialized,

    #[error("Transport error: {0}")]
    Transport(Cow<'static, str>),
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::InternalError(_) => -32603,
            Self::NotInitialized => -32002,
            Self::Transport(_) => -32000,
        }
    }
}

/// Configuration file errors. Each variant carries the JSON path of the
/// offending element so startup diagnostics point at the exact field.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{path}: expected {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
    },

    #[error("{path}: missing required field '{field}'")]
    MissingField { path: String, field: &'static str },

    #[error("{path}: unknown operation type '{value}'")]
    UnknownOperationType { path: String, value: String },

    #[error("Workflow '{workflow}': step '{step}' references unknown task '{task}'")]
    UnknownStepTask {
        workflow: String,
        step: String,
        task: String,
    },

    #[error("Workflow '{workflow}': step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency {
        workflow: String,
        step: String,
        dependency: String,
    },

    #[error("Workflow '{workflow}' contains a dependency cycle involving step '{step}'")]
    WorkflowCycle { workflow: String, step: String },

    #[error("Duplicate tool name '{0}'")]
    DuplicateName(String),
}

/// Dynamic task execution errors. These are translated to
/// `{"success": false, "error": "..."}` payloads at the executor boundary,
/// never surfaced as JSON-RPC errors.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid type for parameter '{name}': expected {expected}")]
    InvalidParameterType { name: String, expected: String },

    #[error("Unknown operation type: {0}")]
    UnknownOperationType(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Client-side errors, split by origin so callers can tell an I/O failure
/// from a malformed reply from a well-formed remote error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("Client is not connected")]
    NotConnected,
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type alias for McpError.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type alias for ProtocolError.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for ConfigError.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for ClientError.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
