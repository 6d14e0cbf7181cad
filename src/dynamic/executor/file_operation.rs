//! File operation executor: read, write, and append on UTF-8 files.

use super::{failure, TaskExecutor};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

pub struct FileOperationExecutor;

#[async_trait]
impl TaskExecutor for FileOperationExecutor {
    async fn execute(&self, config: &Value, params: &Value) -> Value {
        let action = config["action"].as_str().unwrap_or("read");
        let create_dirs = config["create_dirs"].as_bool().unwrap_or(false);

        let Some(file_path) = params["file_path"].as_str() else {
            return failure("file_path is required");
        };

        info!("File operation: {} {}", action, file_path);

        match action {
            "read" => match tokio::fs::read_to_string(file_path).await {
                Ok(content) => json!({
                    "success": true,
                    "content": content,
                    "file_path": file_path,
                    "size": content.len()
                }),
                Err(_) => failure(format!("File not found: {}", file_path)),
            },
            "write" | "append" => {
                let Some(content) = params["content"].as_str() else {
                    return failure(format!("content is required for {} operation", action));
                };

                if create_dirs {
                    if let Some(parent) = Path::new(file_path).parent() {
                        if let Err(e) = tokio::fs::create_dir_all(parent).await {
                            return failure(format!("Failed to create directories: {}", e));
                        }
                    }
                }

                let result = if action == "write" {
                    tokio::fs::write(file_path, content).await
                } else {
                    append(file_path, content).await
                };

                match result {
                    Ok(()) => {
                        let verb = if action == "write" { "Written" } else { "Appended" };
                        json!({
                            "success": true,
                            "message": format!("{} {} characters to {}", verb, content.len(), file_path),
                            "file_path": file_path
                        })
                    }
                    Err(e) => failure(format!("Failed to {} {}: {}", action, file_path, e)),
                }
            }
            other => failure(format!("Unknown action: {}", other)),
        }
    }
}

async fn append(path: &str, content: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}
