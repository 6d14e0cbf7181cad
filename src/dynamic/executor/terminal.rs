//! Terminal executor: runs a shell command and captures its output.

use super::{failure, TaskExecutor};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

pub struct TerminalExecutor;

#[async_trait]
impl TaskExecutor for TerminalExecutor {
    async fn execute(&self, config: &Value, _params: &Value) -> Value {
        let command = match config["command"].as_str() {
            Some(c) if !c.is_empty() => c,
            _ => return failure("command is required"),
        };
        let timeout_secs = config["timeout"].as_u64().unwrap_or(30);

        info!("Executing: {}", command);

        let output = Command::new("sh").arg("-c").arg(command).output();

        let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return failure(format!("Failed to execute command: {}", e)),
            Err(_) => return failure(format!("Command timed out after {}s", timeout_secs)),
        };

        let returncode = output.status.code().unwrap_or(-1);

        json!({
            "success": returncode == 0,
            "returncode": returncode,
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "command": command
        })
    }
}
