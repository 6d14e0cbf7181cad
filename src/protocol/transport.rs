//! Stdio transport for JSON-RPC messages.

use crate::error::{McpError, Result};
use crate::protocol::codec;
use crate::protocol::types::{JsonRpcResponse, Message};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

/// Transport trait for MCP communication.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn read_message(&self) -> Result<Option<Message>>;
    async fn write_message(&self, message: &Message) -> Result<()>;
    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()>;
}

/// Stdio-based transport: one JSON-RPC message per line on stdin, one
/// response per line on stdout. Diagnostics never touch stdout.
pub struct StdioTransport {
    reader: Arc<Mutex<BufReader<Stdin>>>,
    writer: Arc<Mutex<Stdout>>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            reader: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()))),
            writer: Arc::new(Mutex::new(tokio::io::stdout())),
        }
    }

    /// Read the next non-empty line from stdin. `None` means EOF.
    async fn read_line(&self) -> Result<Option<String>> {
        let mut reader = self.reader.lock().await;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    trace!("Received line: {}", line);
                    return Ok(Some(line.to_string()));
                }
                Err(e) => {
                    error!("Error reading from stdin: {}", e);
                    return Err(McpError::Io(e));
                }
            }
        }
    }

    async fn write_line(&self, content: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        trace!("Sending line: {}", content);
        writer.write_all(content.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn read_message(&self) -> Result<Option<Message>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };

        match codec::decode_message(&line) {
            Ok(message) => {
                if let Message::Request(request) = &message {
                    debug!("Received request: method={}", request.method);
                }
                Ok(Some(message))
            }
            Err(e) => {
                error!("Failed to decode message: {}", e);
                Err(McpError::Protocol(e))
            }
        }
    }

    async fn write_message(&self, message: &Message) -> Result<()> {
        let json = codec::encode_message(message)?;
        self.write_line(&json).await
    }

    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()> {
        let json = codec::encode_response(response)?;
        debug!("Sending response: id={:?}", response.id);
        self.write_line(&json).await
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::codec::decode_message;
    use crate::protocol::types::{Message, RequestId};

    #[test]
    fn test_request_parsing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let Message::Request(request) = decode_message(json).unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.method, "initialize");
        assert_eq!(request.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"test":true}}"#;
        let Message::Response(response) = decode_message(json).unwrap() else {
            panic!("expected response");
        };
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }
}
