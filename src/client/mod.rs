//! MCP client over stdio or HTTP transports.

pub mod http;
pub mod stdio;

use crate::error::{ClientError, ClientResult};
use crate::protocol::types::{
    ClientInfo, GetPromptResult, JsonRpcRequest, JsonRpcResponse, Prompt, ReadResourceResult,
    RequestId, Resource, Tool, MCP_VERSION,
};
use http::HttpClientTransport;
use serde_json::{json, Value};
use stdio::StdioClientTransport;
use tracing::info;

enum ClientTransport {
    Stdio(StdioClientTransport),
    Http(HttpClientTransport),
}

/// Server identity captured during `initialize`.
#[derive(Debug, Clone)]
pub struct ConnectedServer {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

/// MCP client. Request ids increase monotonically from 1 for the
/// lifetime of the client.
pub struct McpClient {
    info: ClientInfo,
    transport: Option<ClientTransport>,
    next_id: i64,
    server: Option<ConnectedServer>,
}

impl McpClient {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ClientInfo {
                name: name.into(),
                version: version.into(),
            },
            transport: None,
            next_id: 0,
            server: None,
        }
    }

    /// Spawn an MCP server as a child process and connect over pipes.
    pub fn connect_stdio(&mut self, command: &str, args: &[String]) -> ClientResult<()> {
        let transport = StdioClientTransport::spawn(command, args)?;
        self.transport = Some(ClientTransport::Stdio(transport));
        Ok(())
    }

    /// Connect to an HTTP+SSE server by base URL.
    pub fn connect_sse(&mut self, url: &str) -> ClientResult<()> {
        let transport = HttpClientTransport::new(url)?;
        self.transport = Some(ClientTransport::Http(transport));
        Ok(())
    }

    /// Tear down the transport. For a stdio connection this reaps the
    /// child process.
    pub async fn disconnect(&mut self) -> ClientResult<()> {
        self.server = None;
        match self.transport.take() {
            Some(ClientTransport::Stdio(transport)) => transport.shutdown().await,
            Some(ClientTransport::Http(_)) | None => Ok(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Server identity, available after a successful `initialize`.
    pub fn server(&self) -> Option<&ConnectedServer> {
        self.server.as_ref()
    }

    /// Perform the initialize handshake: send `initialize`, follow with
    /// the `notifications/initialized` notification, record the server
    /// identity and negotiated protocol version.
    pub async fn initialize(&mut self) -> ClientResult<ConnectedServer> {
        let params = json!({
            "protocolVersion": MCP_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": self.info.name,
                "version": self.info.version,
            }
        });

        let result = self.send_request("initialize", Some(params)).await?;

        let server = ConnectedServer {
            name: result["serverInfo"]["name"].as_str().unwrap_or("").to_string(),
            version: result["serverInfo"]["version"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            protocol_version: result["protocolVersion"].as_str().unwrap_or("").to_string(),
        };
        info!(
            "Connected to {} v{} (protocol {})",
            server.name, server.version, server.protocol_version
        );

        let notification = JsonRpcRequest::new("notifications/initialized");
        self.send_notification(notification).await?;

        self.server = Some(server.clone());
        Ok(server)
    }

    pub async fn list_tools(&mut self) -> ClientResult<Vec<Tool>> {
        let result = self.send_request("tools/list", None).await?;
        serde_json::from_value(result["tools"].clone())
            .map_err(|e| ClientError::Protocol(format!("Malformed tools list: {}", e)))
    }

    /// Call a tool; returns the raw `tools/call` result payload.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> ClientResult<Value> {
        self.send_request(
            "tools/call",
            Some(json!({"name": name, "arguments": arguments})),
        )
        .await
    }

    pub async fn list_resources(&mut self) -> ClientResult<Vec<Resource>> {
        let result = self.send_request("resources/list", None).await?;
        serde_json::from_value(result["resources"].clone())
            .map_err(|e| ClientError::Protocol(format!("Malformed resources list: {}", e)))
    }

    pub async fn read_resource(&mut self, uri: &str) -> ClientResult<ReadResourceResult> {
        let result = self
            .send_request("resources/read", Some(json!({"uri": uri})))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Malformed resource contents: {}", e)))
    }

    pub async fn list_prompts(&mut self) -> ClientResult<Vec<Prompt>> {
        let result = self.send_request("prompts/list", None).await?;
        serde_json::from_value(result["prompts"].clone())
            .map_err(|e| ClientError::Protocol(format!("Malformed prompts list: {}", e)))
    }

    pub async fn get_prompt(&mut self, name: &str, arguments: Value) -> ClientResult<GetPromptResult> {
        let result = self
            .send_request(
                "prompts/get",
                Some(json!({"name": name, "arguments": arguments})),
            )
            .await?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Malformed prompt result: {}", e)))
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Send a request and unwrap the response: remote errors are
    /// forwarded with their code and message, a missing result is a
    /// protocol error.
    async fn send_request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> ClientResult<Value> {
        let id = self.next_id();
        let mut request = JsonRpcRequest::new(method).with_id(id);
        if let Some(params) = params {
            request = request.with_params(params);
        }

        let response = self.transport_request(&request).await?;
        check_id(&response, id)?;

        if let Some(error) = response.error {
            return Err(ClientError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| ClientError::Protocol("Response carries neither result nor error".into()))
    }

    async fn transport_request(
        &mut self,
        request: &JsonRpcRequest,
    ) -> ClientResult<JsonRpcResponse> {
        match self.transport.as_mut() {
            Some(ClientTransport::Stdio(transport)) => transport.request(request).await,
            Some(ClientTransport::Http(transport)) => transport.request(request).await,
            None => Err(ClientError::NotConnected),
        }
    }

    async fn send_notification(&mut self, request: JsonRpcRequest) -> ClientResult<()> {
        match self.transport.as_mut() {
            Some(ClientTransport::Stdio(transport)) => transport.notify(&request).await,
            Some(ClientTransport::Http(transport)) => transport.notify(&request).await,
            None => Err(ClientError::NotConnected),
        }
    }
}

fn check_id(response: &JsonRpcResponse, expected: i64) -> ClientResult<()> {
    match &response.id {
        Some(RequestId::Number(n)) if *n == expected => Ok(()),
        other => Err(ClientError::Protocol(format!(
            "Response id {:?} does not match request id {}",
            other, expected
        ))),
    }
}
