//! Stdio client transport: a spawned MCP server child process wired up
//! through pipes.

use crate::error::{ClientError, ClientResult};
use crate::protocol::types::{JsonRpcRequest, JsonRpcResponse};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// How long to wait for the child to exit after stdin closes before
/// killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Child-process transport. The child inherits the parent environment;
/// only stdin/stdout are redirected, so its diagnostics still reach our
/// stderr.
#[derive(Debug)]
pub struct StdioClientTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
}

impl StdioClientTransport {
    pub fn spawn(command: &str, args: &[String]) -> ClientResult<Self> {
        debug!("Spawning MCP server: {} {:?}", command, args);

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| ClientError::Transport(format!("Failed to spawn {}: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Transport("Child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Transport("Child stdout unavailable".into()))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        })
    }

    async fn write_line(&mut self, line: &str) -> ClientResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(ClientError::NotConnected)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Read the next non-empty line from the child. Blocks until the
    /// child answers or closes its stdout.
    async fn read_line(&mut self) -> ClientResult<String> {
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(ClientError::Transport(
                    "Server closed the connection".into(),
                ));
            }
            let line = line.trim();
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }

    /// Send a request and wait for the matching response line.
    pub async fn request(&mut self, request: &JsonRpcRequest) -> ClientResult<JsonRpcResponse> {
        let payload = serde_json::to_string(request)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        self.write_line(&payload).await?;

        let line = self.read_line().await?;
        serde_json::from_str(&line)
            .map_err(|e| ClientError::Protocol(format!("Malformed response: {}", e)))
    }

    /// Send a notification; nothing comes back.
    pub async fn notify(&mut self, request: &JsonRpcRequest) -> ClientResult<()> {
        let payload = serde_json::to_string(request)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        self.write_line(&payload).await
    }

    /// Close stdin to signal the child, give it a grace period, then
    /// kill and reap it.
    pub async fn shutdown(mut self) -> ClientResult<()> {
        self.stdin.take();

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Child exited with {}", status);
            }
            Ok(Err(e)) => {
                warn!("Failed to wait for child: {}", e);
            }
            Err(_) => {
                warn!("Child did not exit in time, killing");
                if let Err(e) = self.child.start_kill() {
                    warn!("Failed to kill child: {}", e);
                }
                let _ = self.child.wait().await;
            }
        }
        Ok(())
    }
}
