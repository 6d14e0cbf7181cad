//! Request handler, session state, and method dispatcher.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Handler trait for processing MCP requests.
///
/// Handlers may be invoked from multiple threads simultaneously by the
/// HTTP transport and must be thread-safe.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle initialize request.
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult>;

    /// Handle initialized notification.
    async fn initialized(&self) -> ProtocolResult<()> {
        Ok(())
    }

    /// List available tools.
    async fn list_tools(&self) -> ProtocolResult<ListToolsResult>;

    /// Call a tool.
    async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult>;

    /// List available resources.
    async fn list_resources(&self) -> ProtocolResult<ListResourcesResult>;

    /// Read a resource by URI.
    async fn read_resource(&self, params: ReadResourceParams) -> ProtocolResult<ReadResourceResult>;

    /// List available prompts.
    async fn list_prompts(&self) -> ProtocolResult<ListPromptsResult>;

    /// Render a prompt.
    async fn get_prompt(&self, params: GetPromptParams) -> ProtocolResult<GetPromptResult>;

    /// Handle ping request.
    async fn ping(&self) -> ProtocolResult<Value> {
        Ok(serde_json::json!({}))
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    initialized: bool,
    client_info: Option<ClientInfo>,
    negotiated_version: Option<String>,
}

/// Per-session lifecycle state.
///
/// One session per stdio transport; one per HTTP listener. The lock
/// serialises the initialized check against a racing `initialize`.
#[derive(Debug, Default)]
pub struct Session {
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    pub fn set_initialized(&self, client_info: Option<ClientInfo>, version: String) {
        let mut inner = self.inner.lock();
        inner.initialized = true;
        inner.client_info = client_info;
        inner.negotiated_version = Some(version);
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.inner.lock().client_info.clone()
    }
}

/// Method dispatcher that routes requests to the handler and enforces
/// the initialize-first lifecycle.
pub struct Dispatcher<H: Handler> {
    handler: Arc<H>,
    session: Arc<Session>,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(handler: Arc<H>, session: Arc<Session>) -> Self {
        Self { handler, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Dispatch a request to the appropriate handler method.
    ///
    /// Always produces a response; the transport drops it when the
    /// request was a notification.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Dispatching request: {}", request.method);

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "notifications/initialized" | "initialized" => self.handle_initialized().await,
            method if !self.session.is_initialized() => {
                warn!("Request '{}' before initialization", method);
                Err(ProtocolError::NotInitialized)
            }
            "ping" => self.handler.ping().await,
            "tools/list" => {
                to_value(self.handler.list_tools().await)
            }
            "tools/call" => {
                let params = parse_params::<CallToolParams>(request.params);
                match params {
                    Ok(params) => to_value(self.handler.call_tool(params).await),
                    Err(e) => Err(e),
                }
            }
            "resources/list" => to_value(self.handler.list_resources().await),
            "resources/read" => match parse_params::<ReadResourceParams>(request.params) {
                Ok(params) => to_value(self.handler.read_resource(params).await),
                Err(e) => Err(e),
            },
            "prompts/list" => to_value(self.handler.list_prompts().await),
            "prompts/get" => match parse_params::<GetPromptParams>(request.params) {
                Ok(params) => to_value(self.handler.get_prompt(params).await),
                Err(e) => Err(e),
            },
            method => {
                warn!("Unknown method: {}", method);
                Err(ProtocolError::MethodNotFound(method.to_string()))
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                error!("Request failed: {}", e);
                JsonRpcResponse::error(request.id, JsonRpcError::new(e.code(), e.to_string()))
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> ProtocolResult<Value> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
            .unwrap_or_default();

        let client_info = params.client_info.clone();
        let result = self.handler.initialize(params).await?;

        // The server always answers with its own protocol version; the
        // client decides whether to proceed.
        self.session
            .set_initialized(client_info, result.protocol_version.clone());

        serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
    }

    async fn handle_initialized(&self) -> ProtocolResult<Value> {
        self.handler.initialized().await?;
        Ok(Value::Null)
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> ProtocolResult<T> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
        .ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))
}

fn to_value<T: serde::Serialize>(result: ProtocolResult<T>) -> ProtocolResult<Value> {
    let value = result?;
    serde_json::to_value(value).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockHandler {
        saw_initialize: AtomicBool,
    }

    impl MockHandler {
        fn new() -> Self {
            Self {
                saw_initialize: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Handler for MockHandler {
        async fn initialize(&self, _params: InitializeParams) -> ProtocolResult<InitializeResult> {
            self.saw_initialize.store(true, Ordering::SeqCst);
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
            params: ReadResourceParams,
        ) -> ProtocolResult<ReadResourceResult> {
            Err(ProtocolError::InvalidParams(
                format!("Resource not found: {}", params.uri).into(),
            ))
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

    fn dispatcher() -> Dispatcher<MockHandler> {
        Dispatcher::new(Arc::new(MockHandler::new()), Arc::new(Session::new()))
    }

    fn initialize_request() -> JsonRpcRequest {
        JsonRpcRequest::new("initialize")
            .with_id(1)
            .with_params(serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0"}
            }))
    }

    #[tokio::test]
    async fn test_dispatcher_initialize() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch(initialize_request()).await;

        assert!(response.result.is_some());
        assert!(response.error.is_none());
        assert!(dispatcher.session().is_initialized());
        assert_eq!(
            dispatcher.session().client_info().unwrap().name,
            "test-client"
        );
    }

    #[tokio::test]
    async fn test_request_before_initialize_is_gated() {
        let dispatcher = dispatcher();
        let request = JsonRpcRequest::new("tools/list").with_id(7);
        let response = dispatcher.dispatch(request).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, -32002);
        assert_eq!(error.message, "Server not initialized");
        assert_eq!(response.id, Some(RequestId::Number(7)));
        assert!(!dispatcher.session().is_initialized());
    }

    #[tokio::test]
    async fn test_dispatcher_unknown_method() {
        let dispatcher = dispatcher();
        dispatcher.dispatch(initialize_request()).await;

        let response = dispatcher
            .dispatch(JsonRpcRequest::new("unknown/method").with_id(2))
            .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_missing_params_is_invalid_params() {
        let dispatcher = dispatcher();
        dispatcher.dispatch(initialize_request()).await;

        let response = dispatcher
            .dispatch(JsonRpcRequest::new("resources/read").with_id(3))
            .await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_initialized_notification_has_null_result() {
        let dispatcher = dispatcher();
        dispatcher.dispatch(initialize_request()).await;

        let response = dispatcher
            .dispatch(JsonRpcRequest::new("notifications/initialized"))
            .await;
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_id_echoed_with_string_type() {
        let dispatcher = dispatcher();
        let response = dispatcher
            .dispatch(initialize_request().with_id("init-1"))
            .await;
        assert_eq!(response.id, Some(RequestId::String("init-1".into())));
    }
}
