//! Database executor.
//!
//! Simulates query execution: the substituted query is echoed back so
//! callers and workflows can be exercised without a live database.
//! Wiring in real drivers is the deployment's concern.

use super::{failure, TaskExecutor};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

pub struct DatabaseExecutor;

#[async_trait]
impl TaskExecutor for DatabaseExecutor {
    async fn execute(&self, config: &Value, _params: &Value) -> Value {
        let db_type = config["db_type"].as_str().unwrap_or("postgresql");
        let query = match config["query"].as_str() {
            Some(q) if !q.is_empty() => q,
            _ => return failure("query is required"),
        };

        info!("Database {} query: {}", db_type, query);

        json!({
            "success": true,
            "message": format!("Database operation simulated (would execute: {})", query),
            "db_type": db_type,
            "query": query,
            "note": "Install database drivers for real operations"
        })
    }
}
