//! Data processing executor: JSON parsing and CSV transformation.

use super::{failure, TaskExecutor};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct DataProcessingExecutor;

#[async_trait]
impl TaskExecutor for DataProcessingExecutor {
    async fn execute(&self, config: &Value, params: &Value) -> Value {
        let processor = config["processor"].as_str().unwrap_or("json_parser");

        match processor {
            "json_parser" => {
                let Some(json_string) = params["json_string"].as_str() else {
                    return failure("json_string is required");
                };
                match serde_json::from_str::<Value>(json_string) {
                    Ok(data) => json!({
                        "success": true,
                        "data": data,
                        "processor": processor
                    }),
                    Err(e) => failure(format!("JSON parse error: {}", e)),
                }
            }
            "csv_transformer" => {
                let Some(csv_data) = params["csv_data"].as_str() else {
                    return failure("csv_data is required");
                };
                let operation = params["operation"].as_str().unwrap_or("parse");
                let delimiter = config["delimiter"]
                    .as_str()
                    .and_then(|d| d.chars().next())
                    .unwrap_or(',');

                let rows: Vec<Vec<String>> = csv_data
                    .lines()
                    .filter(|line| !line.is_empty())
                    .map(|line| line.split(delimiter).map(str::to_string).collect())
                    .collect();

                json!({
                    "success": true,
                    "rows": rows,
                    "row_count": rows.len(),
                    "processor": processor,
                    "operation": operation
                })
            }
            other => failure(format!("Unknown processor: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_parser() {
        let result = DataProcessingExecutor
            .execute(
                &json!({"processor": "json_parser"}),
                &json!({"json_string": r#"{"k": [1, 2]}"#}),
            )
            .await;
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["data"], json!({"k": [1, 2]}));
    }

    #[tokio::test]
    async fn test_json_parser_bad_input() {
        let result = DataProcessingExecutor
            .execute(
                &json!({"processor": "json_parser"}),
                &json!({"json_string": "{broken"}),
            )
            .await;
        assert_eq!(result["success"], json!(false));
        assert!(result["error"].as_str().unwrap().contains("JSON parse error"));
    }

    #[tokio::test]
    async fn test_csv_transformer() {
        let result = DataProcessingExecutor
            .execute(
                &json!({"processor": "csv_transformer"}),
                &json!({"csv_data": "a,b\n1,2\n"}),
            )
            .await;
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["row_count"], json!(2));
        assert_eq!(result["rows"][1], json!(["1", "2"]));
    }

    #[tokio::test]
    async fn test_csv_custom_delimiter() {
        let result = DataProcessingExecutor
            .execute(
                &json!({"processor": "csv_transformer", "delimiter": ";"}),
                &json!({"csv_data": "x;y"}),
            )
            .await;
        assert_eq!(result["rows"][0], json!(["x", "y"]));
    }

    #[tokio::test]
    async fn test_unknown_processor() {
        let result = DataProcessingExecutor
            .execute(&json!({"processor": "xml"}), &json!({}))
            .await;
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn test_default_processor_is_json_parser() {
        let result = DataProcessingExecutor
            .execute(&json!({}), &json!({"json_string": "5"}))
            .await;
        assert_eq!(result["data"], json!(5));
    }
}
