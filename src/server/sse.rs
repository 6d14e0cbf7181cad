//! HTTP+SSE transport.
//!
//! A single listener exposes the 2024-11-05 HTTP+SSE pairing: `GET /`
//! opens a text/event-stream that immediately announces the POST
//! endpoint, and `POST /` / `POST /message` carry JSON-RPC requests
//! whose responses are returned to the caller and fanned out to every
//! open stream.

use crate::error::{McpError, Result};
use crate::protocol::codec;
use crate::protocol::handler::{Dispatcher, Handler, Session};
use crate::protocol::types::{JsonRpcError, JsonRpcResponse, Message, RequestId};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, options, post};
use axum::Router;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Maximum number of concurrent event streams.
const MAX_CONNECTIONS: usize = 20;

/// Per-stream queue depth.
const QUEUE_DEPTH: usize = 64;

/// Keep-alive interval; also the granularity of idle detection.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Consecutive idle periods before a stream is closed.
const MAX_IDLE_PERIODS: u32 = 3;

struct StreamEntry {
    tx: mpsc::Sender<String>,
    active: Arc<AtomicBool>,
}

/// Table of open event streams, keyed by session id.
struct Connections {
    streams: Mutex<HashMap<String, StreamEntry>>,
}

impl Connections {
    fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Drop streams whose writer died or whose queue closed.
    fn sweep(&self) -> usize {
        let mut streams = self.streams.lock();
        streams.retain(|id, entry| {
            let alive = entry.active.load(Ordering::SeqCst) && !entry.tx.is_closed();
            if !alive {
                debug!("Sweeping inactive stream: {}", id);
            }
            alive
        });
        streams.len()
    }

    /// Register a stream. Returns `None` when the table is full.
    fn insert(&self, id: String, tx: mpsc::Sender<String>) -> Option<Arc<AtomicBool>> {
        let mut streams = self.streams.lock();
        if streams.len() >= MAX_CONNECTIONS {
            return None;
        }
        let active = Arc::new(AtomicBool::new(true));
        streams.insert(
            id,
            StreamEntry {
                tx,
                active: Arc::clone(&active),
            },
        );
        Some(active)
    }

    fn remove(&self, id: &str) {
        self.streams.lock().remove(id);
    }

    /// Enqueue a payload on every active stream. Completes before the
    /// caller regains control, so a POST response is on every queue
    /// before it is written back to the POSTer.
    fn broadcast(&self, payload: &str) {
        let streams = self.streams.lock();
        for (id, entry) in streams.iter() {
            if !entry.active.load(Ordering::SeqCst) {
                continue;
            }
            if entry.tx.try_send(payload.to_string()).is_err() {
                warn!("Stream {} rejected message, marking inactive", id);
                entry.active.store(false, Ordering::SeqCst);
            }
        }
    }

    fn len(&self) -> usize {
        self.streams.lock().len()
    }
}

/// Removes the stream from the table when the response body is dropped,
/// which is how a client disconnect becomes visible to us.
struct StreamGuard {
    id: String,
    connections: Arc<Connections>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.connections.remove(&self.id);
        debug!("SSE client disconnected: {}", self.id);
    }
}

struct AppState<H: Handler> {
    dispatcher: Dispatcher<H>,
    connections: Arc<Connections>,
}

/// Serve the MCP handler over HTTP+SSE until the listener fails.
pub async fn serve<H: Handler + 'static>(
    handler: Arc<H>,
    session: Arc<Session>,
    addr: &str,
) -> Result<()> {
    let state = Arc::new(AppState {
        dispatcher: Dispatcher::new(handler, session),
        connections: Arc::new(Connections::new()),
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(McpError::Io)?;
    info!("HTTP+SSE transport listening on {}", addr);

    axum::serve(listener, app).await.map_err(McpError::Io)?;
    Ok(())
}

fn router<H: Handler + 'static>(state: Arc<AppState<H>>) -> Router {
    Router::new()
        .route("/", get(open_stream::<H>).post(post_message::<H>))
        .route("/message", post(post_message::<H>))
        .route("/health", get(health::<H>))
        .route("/", options(preflight))
        .route("/message", options(preflight))
        .with_state(state)
}

async fn open_stream<H: Handler + 'static>(
    State(state): State<Arc<AppState<H>>>,
    headers: HeaderMap,
) -> Response {
    let accepts_event_stream = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);
    if !accepts_event_stream {
        return with_cors(
            (
                StatusCode::NOT_ACCEPTABLE,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"text/event-stream required in Accept header"}"#,
            )
                .into_response(),
        );
    }

    let before = state.connections.len();
    let after = state.connections.sweep();
    debug!("Stream cleanup: {} -> {} connections", before, after);

    let session_id = headers
        .get("Mcp-Session-Id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let (tx, rx) = mpsc::channel::<String>(QUEUE_DEPTH);
    let Some(active) = state.connections.insert(session_id.clone(), tx) else {
        warn!("Connection limit reached ({})", MAX_CONNECTIONS);
        return with_cors(
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable: Too many connections",
            )
                .into_response(),
        );
    };

    info!(
        "SSE client connected: {} (total: {})",
        session_id,
        state.connections.len()
    );

    let guard = StreamGuard {
        id: session_id.clone(),
        connections: Arc::clone(&state.connections),
    };

    // The hello event tells 2024-11-05 clients where to POST requests.
    let hello = stream::once(async {
        Ok::<_, Infallible>(Event::default().event("endpoint").data("/message"))
    });

    let body = stream::unfold(
        (rx, 0u32, active, guard),
        |(mut rx, mut idle, active, guard)| async move {
            if !active.load(Ordering::SeqCst) {
                return None;
            }
            match tokio::time::timeout(KEEPALIVE_INTERVAL, rx.recv()).await {
                Ok(Some(payload)) => Some((
                    Ok::<_, Infallible>(Event::default().data(payload)),
                    (rx, 0, active, guard),
                )),
                Ok(None) => None,
                Err(_) => {
                    idle += 1;
                    if idle >= MAX_IDLE_PERIODS {
                        debug!("Stream idle timeout, closing: {}", guard.id);
                        active.store(false, Ordering::SeqCst);
                        return None;
                    }
                    Some((
                        Ok(Event::default().comment("keepalive")),
                        (rx, idle, active, guard),
                    ))
                }
            }
        },
    );

    let mut response = Sse::new(hello.chain(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    with_cors(response)
}

async fn post_message<H: Handler + 'static>(
    State(state): State<Arc<AppState<H>>>,
    body: String,
) -> Response {
    let request = match codec::decode_message(&body) {
        Ok(Message::Request(request)) => request,
        Ok(Message::Response(_)) => {
            let error = JsonRpcResponse::error(
                Some(RequestId::Null),
                JsonRpcError::invalid_request("Expected a request"),
            );
            return json_response(StatusCode::BAD_REQUEST, &error);
        }
        Err(e) => {
            let error = JsonRpcResponse::error(
                Some(RequestId::Null),
                JsonRpcError::new(e.code(), e.to_string()),
            );
            return json_response(StatusCode::BAD_REQUEST, &error);
        }
    };

    let is_notification = request.is_notification();
    let response = state.dispatcher.dispatch(request).await;

    if is_notification {
        return with_cors(StatusCode::ACCEPTED.into_response());
    }

    // Fan out to every stream before answering the POSTer.
    if let Ok(payload) = codec::encode_response(&response) {
        state.connections.broadcast(&payload);
    }

    json_response(StatusCode::OK, &response)
}

async fn health<H: Handler + 'static>(State(state): State<Arc<AppState<H>>>) -> Response {
    let active = state.connections.sweep();
    debug!("Health check: {} active streams", active);
    with_cors(
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"status":"ok"}"#,
        )
            .into_response(),
    )
}

async fn preflight() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

fn json_response(status: StatusCode, response: &JsonRpcResponse) -> Response {
    let body = serde_json::to_string(response)
        .unwrap_or_else(|_| r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#.into());
    with_cors(
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("static response parts are valid"),
    )
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Mcp-Session-Id, Accept"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolResult;
    use crate::protocol::types::{
        CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, InitializeParams,
        InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult,
        ReadResourceParams, ReadResourceResult, ServerCapabilities, ServerInfo, MCP_VERSION,
    };
    use async_trait::async_trait;

    struct TestHandler;

    #[async_trait]
    impl Handler for TestHandler {
        async fn initialize(&self, _params: InitializeParams) -> ProtocolResult<InitializeResult> {
            Ok(InitializeResult {
                protocol_version: MCP_VERSION.into(),
                capabilities: ServerCapabilities::default(),
                server_info: ServerInfo {
                    name: "sse-test".into(),
                    version: "0.0.1".into(),
                },
            })
        }

        async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
            Ok(ListToolsResult { tools: vec![] })
        }

        async fn call_tool(&self, _params: CallToolParams) -> ProtocolResult<CallToolResult> {
            Ok(CallToolResult::text("ok"))
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
                description: String::new(),
                messages: serde_json::json!([]),
            })
        }
    }

    async fn spawn_server() -> std::net::SocketAddr {
        let state = Arc::new(AppState {
            dispatcher: Dispatcher::new(Arc::new(TestHandler), Arc::new(Session::new())),
            connections: Arc::new(Connections::new()),
        });
        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_health_and_accept_check() {
        let addr = spawn_server().await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), r#"{"status":"ok"}"#);

        // A stream request without the right Accept header is refused.
        let response = client.get(format!("http://{}/", addr)).send().await.unwrap();
        assert_eq!(response.status(), 406);
    }

    #[tokio::test]
    async fn test_post_lifecycle_and_cors() {
        let addr = spawn_server().await;
        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        // Uninitialised requests are gated.
        let response = client
            .post(format!("{}/message", base))
            .header("Content-Type", "application/json")
            .body(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#)
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], serde_json::json!(-32002));
        assert_eq!(body["id"], serde_json::json!(7));

        let response = client
            .post(format!("{}/message", base))
            .header("Content-Type", "application/json")
            .body(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"c","version":"0"}}}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "*"
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["result"]["serverInfo"]["name"], "sse-test");
        assert_eq!(body["result"]["protocolVersion"], MCP_VERSION);

        // Both POST endpoints dispatch.
        let response = client
            .post(&base)
            .header("Content-Type", "application/json")
            .body(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["result"]["tools"].is_array());

        // Malformed body is answered with a parse error, id null.
        let response = client
            .post(format!("{}/message", base))
            .body("{nope")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], serde_json::json!(-32700));
        assert_eq!(body["id"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_preflight() {
        let addr = spawn_server().await;
        let client = reqwest::Client::new();

        for path in ["/", "/message"] {
            let response = client
                .request(
                    reqwest::Method::OPTIONS,
                    format!("http://{}{}", addr, path),
                )
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 204);
            assert_eq!(
                response
                    .headers()
                    .get("access-control-allow-methods")
                    .unwrap(),
                "POST, GET, OPTIONS"
            );
        }
    }

    #[tokio::test]
    async fn test_stream_hello_and_fanout() {
        let addr = spawn_server().await;
        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        let mut stream = client
            .get(&base)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .unwrap();
        assert_eq!(stream.status(), 200);
        assert_eq!(
            stream.headers().get("content-type").unwrap(),
            "text/event-stream"
        );

        // First frames carry the endpoint hello.
        let mut received = String::new();
        while !received.contains("\n\n") {
            let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(received.contains("event: endpoint"));
        assert!(received.contains("data: /message"));

        // A POSTed request is answered synchronously and mirrored onto
        // the stream.
        let response = client
            .post(format!("{}/message", base))
            .body(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .send()
            .await
            .unwrap();
        let posted: serde_json::Value = response.json().await.unwrap();

        let mut received = String::new();
        while !received.contains("\n\n") {
            let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        let data_line = received
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let mirrored: serde_json::Value = serde_json::from_str(data_line).unwrap();
        assert_eq!(mirrored, posted);
    }

    #[test]
    fn test_broadcast_reaches_every_stream() {
        let connections = Connections::new();
        let (tx1, mut rx1) = mpsc::channel(QUEUE_DEPTH);
        let (tx2, mut rx2) = mpsc::channel(QUEUE_DEPTH);
        connections.insert("a".into(), tx1).unwrap();
        connections.insert("b".into(), tx2).unwrap();

        connections.broadcast(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);

        assert_eq!(
            rx1.try_recv().unwrap(),
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#
        );
        assert_eq!(
            rx2.try_recv().unwrap(),
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#
        );
    }

    #[test]
    fn test_connection_cap() {
        let connections = Connections::new();
        let mut receivers = Vec::new();
        for i in 0..MAX_CONNECTIONS {
            let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
            receivers.push(rx);
            assert!(connections.insert(format!("c{}", i), tx).is_some());
        }

        let (tx, _rx) = mpsc::channel(QUEUE_DEPTH);
        assert!(connections.insert("overflow".into(), tx).is_none());
    }

    #[test]
    fn test_sweep_removes_closed_streams() {
        let connections = Connections::new();
        let (tx1, rx1) = mpsc::channel(QUEUE_DEPTH);
        let (tx2, _rx2) = mpsc::channel(QUEUE_DEPTH);
        connections.insert("dead".into(), tx1).unwrap();
        connections.insert("alive".into(), tx2).unwrap();

        drop(rx1);
        assert_eq!(connections.sweep(), 1);
        assert_eq!(connections.len(), 1);
    }

    #[test]
    fn test_broadcast_marks_full_queue_inactive() {
        let connections = Connections::new();
        let (tx, _rx) = mpsc::channel(1);
        connections.insert("slow".into(), tx).unwrap();

        connections.broadcast("one");
        connections.broadcast("two");
        assert_eq!(connections.sweep(), 0);
    }

    #[test]
    fn test_ordering_within_stream() {
        let connections = Connections::new();
        let (tx, mut rx) = mpsc::channel(QUEUE_DEPTH);
        connections.insert("s".into(), tx).unwrap();

        connections.broadcast("first");
        connections.broadcast("second");
        connections.broadcast("third");

        assert_eq!(rx.try_recv().unwrap(), "first");
        assert_eq!(rx.try_recv().unwrap(), "second");
        assert_eq!(rx.try_recv().unwrap(), "third");
    }
}
