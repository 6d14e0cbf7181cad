//! MCP server with lifecycle management.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler, Session};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// MCP Server: owns the handler and drives a transport.
pub struct McpServer<H: Handler> {
    info: ServerInfo,
    handler: Arc<H>,
    session: Arc<Session>,
    running: AtomicBool,
}

impl<H: Handler> McpServer<H> {
    pub fn new(handler: H, info: ServerInfo) -> Self {
        Self {
            info,
            handler: Arc::new(handler),
            session: Arc::new(Session::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the server over standard streams.
    pub async fn run_stdio(self) -> Result<()> {
        let transport = Arc::new(StdioTransport::new());
        self.run_with_transport(transport).await
    }

    /// Run the server with a custom transport.
    pub async fn run_with_transport<T: Transport + 'static>(self, transport: Arc<T>) -> Result<()> {
        info!(
            "Starting MCP server: {} v{}",
            self.info.name, self.info.version
        );
        self.running.store(true, Ordering::SeqCst);

        let dispatcher = Dispatcher::new(Arc::clone(&self.handler), Arc::clone(&self.session));

        loop {
            if !self.running.load(Ordering::SeqCst) {
                info!("Server stopping...");
                break;
            }

            let message = match transport.read_message().await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(e @ ProtocolError::ParseError))
                | Err(McpError::Protocol(e @ ProtocolError::InvalidRequest(_))) => {
                    // Undecodable input never kills the session; answer
                    // with a null id and keep reading.
                    let response = JsonRpcResponse::error(
                        Some(RequestId::Null),
                        JsonRpcError::new(e.code(), e.to_string()),
                    );
                    if let Err(e) = transport.write_response(&response).await {
                        error!("Failed to send error response: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break;
                }
            };

            match message {
                Message::Request(request) => {
                    let is_notification = request.is_notification();
                    let response = dispatcher.dispatch(request).await;

                    if !is_notification {
                        if let Err(e) = transport.write_response(&response).await {
                            error!("Failed to send response: {}", e);
                            break;
                        }
                    }
                }
                Message::Response(response) => {
                    warn!("Unexpected response received: {:?}", response.id);
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Stop the server loop after the in-flight request completes.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Builder for McpServer.
pub struct McpServerBuilder<H: Handler> {
    handler: Option<H>,
    name: String,
    version: String,
}

impl<H: Handler> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            ServerInfo {
                name: self.name,
                version: self.version,
            },
        ))
    }
}

impl<H: Handler> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolResult;
    use async_trait::async_trait;

    struct TestHandler;

    #[async_trait]
    impl Handler for TestHandler {
        async fn initialize(&self, _params: InitializeParams) -> ProtocolResult<InitializeResult> {
            Ok(InitializeResult {
                protocol_version: MCP_VERSION.into(),
                capabilities: ServerCapabilities::default(),
                server_info: ServerInfo {
                    name: "test".into(),
                    version: "1.0".into(),
                },
            })
        }

        async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
            Ok(ListToolsResult { tools: vec![] })
        }

        async fn call_tool(&self, _params: CallToolParams) -> ProtocolResult<CallToolResult> {
            Ok(CallToolResult::text("test"))
        }

        async fn list_resources(&self) -> ProtocolResult<ListResourcesResult> {
            Ok(ListResourcesResult { resources: vec![] })
        }

        async fn read_resource(
            &self,
            _params: ReadResourceParams,
        ) -> ProtocolResult<ReadResourceResult> {
            Ok(ReadResourceResult { contents: vec![] })
        }

        async fn list_prompts(&self) -> ProtocolResult<ListPromptsResult> {
            Ok(ListPromptsResult { prompts: vec![] })
        }

        async fn get_prompt(&self, _params: GetPromptParams) -> ProtocolResult<GetPromptResult> {
            Ok(GetPromptResult {
                description: "test".into(),
                messages: serde_json::json!([]),
            })
        }
    }

    #[test]
    fn test_server_builder() {
        let server = McpServerBuilder::new()
            .handler(TestHandler)
            .name("test-server")
            .version("0.1.0")
            .build()
            .unwrap();

        assert_eq!(server.info().name, "test-server");
        assert_eq!(server.info().version, "0.1.0");
    }

    #[test]
    fn test_new_server_not_initialized() {
        let server = McpServerBuilder::new().handler(TestHandler).build().unwrap();
        assert!(!server.session().is_initialized());
        assert!(!server.is_running());
    }
}
