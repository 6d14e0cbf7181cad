//! Registry-backed MCP request handler.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, Handler, InitializeParams,
    InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult, PromptsCapability,
    ReadResourceParams, ReadResourceResult, ResourceContents, ResourcesCapability,
    ServerCapabilities, ToolsCapability, MCP_VERSION,
};
use crate::server::state::ServerState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// MCP request handler that serves the registry contents.
pub struct McpHandler {
    state: Arc<ServerState>,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Capabilities are derived from what is actually registered: a
    /// family is advertised iff it has at least one entry.
    fn capabilities(&self) -> ServerCapabilities {
        let registry = &self.state.registry;
        ServerCapabilities {
            tools: (registry.tool_count() > 0).then(ToolsCapability::default),
            resources: (registry.resource_count() > 0).then(ResourcesCapability::default),
            prompts: (registry.prompt_count() > 0).then(PromptsCapability::default),
        }
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult> {
        if let Some(client) = &params.client_info {
            info!(
                "Initialize request from {} v{}",
                client.name, client.version
            );
        }
        if let Some(requested) = &params.protocol_version {
            if requested != MCP_VERSION {
                debug!(
                    "Client requested protocol {}, answering with {}",
                    requested, MCP_VERSION
                );
            }
        }

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities: self.capabilities(),
            server_info: self.state.info.clone(),
        })
    }

    async fn initialized(&self) -> ProtocolResult<()> {
        info!("Client completed initialization");
        Ok(())
    }

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
        let tools = self.state.registry.list_tools();
        debug!("Listing {} tools", tools.len());
        Ok(ListToolsResult { tools })
    }

    async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult> {
        debug!("Tool call: {}", params.name);

        let tool = self
            .state
            .registry
            .get_tool(&params.name)
            .ok_or_else(|| ProtocolError::ToolNotFound(params.name.clone()))?;

        let result = tool
            .execute(params.arguments)
            .await
            .map_err(|e| ProtocolError::InternalError(e.to_string().into()))?;

        Ok(CallToolResult::from_value(&result))
    }

    async fn list_resources(&self) -> ProtocolResult<ListResourcesResult> {
        Ok(ListResourcesResult {
            resources: self.state.registry.list_resources(),
        })
    }

    async fn read_resource(
        &self,
        params: ReadResourceParams,
    ) -> ProtocolResult<ReadResourceResult> {
        let resource = self.state.registry.get_resource(&params.uri).ok_or_else(|| {
            ProtocolError::InvalidParams(format!("Resource not found: {}", params.uri).into())
        })?;

        let definition = resource.definition();
        let text = resource
            .read()
            .await
            .map_err(|e| ProtocolError::InternalError(e.to_string().into()))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: definition.uri,
                mime_type: definition.mime_type,
                text,
            }],
        })
    }

    async fn list_prompts(&self) -> ProtocolResult<ListPromptsResult> {
        Ok(ListPromptsResult {
            prompts: self.state.registry.list_prompts(),
        })
    }

    async fn get_prompt(&self, params: GetPromptParams) -> ProtocolResult<GetPromptResult> {
        let prompt = self.state.registry.get_prompt(&params.name).ok_or_else(|| {
            ProtocolError::InvalidParams(format!("Prompt not found: {}", params.name).into())
        })?;

        let definition = prompt.definition();
        let messages = prompt
            .render(params.arguments)
            .await
            .map_err(|e| ProtocolError::InternalError(e.to_string().into()))?;

        Ok(GetPromptResult {
            description: definition.description,
            messages,
        })
    }
}
