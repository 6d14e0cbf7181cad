//! REST API executor: one HTTP request per invocation.

use super::{failure, TaskExecutor};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RestApiExecutor {
    http: reqwest::Client,
}

impl RestApiExecutor {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for RestApiExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for RestApiExecutor {
    async fn execute(&self, config: &Value, _params: &Value) -> Value {
        let method_raw = config["method"].as_str().unwrap_or("GET");
        let Ok(method) = method_raw.parse::<Method>() else {
            return failure(format!("Unsupported HTTP method: {}", method_raw));
        };

        let Some(url) = config["url"].as_str().filter(|u| !u.is_empty()) else {
            return failure("url is required");
        };
        let mut url = url.to_string();

        // Query parameters are appended in config order.
        if let Some(query) = config["query_params"].as_object() {
            if !query.is_empty() {
                let pairs: Vec<String> = query
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, value_as_query_string(v)))
                    .collect();
                url.push('?');
                url.push_str(&pairs.join("&"));
            }
        }

        info!("REST API: {} {}", method, url);

        let mut request = self.http.request(method.clone(), &url);

        if let Some(headers) = config["headers"].as_object() {
            for (key, value) in headers {
                request = request.header(key, value_as_query_string(value));
            }
        }

        if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
            let body = &config["body"];
            if !body.is_null() {
                request = request.json(body);
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return failure(format!("HTTP request failed: {}", e)),
        };

        let status_code = response.status().as_u16();
        let body_text = match response.text().await {
            Ok(text) => text,
            Err(e) => return failure(format!("Failed to read response body: {}", e)),
        };

        // Non-JSON bodies are returned as the raw string.
        let data = serde_json::from_str::<Value>(&body_text)
            .unwrap_or(Value::String(body_text));

        json!({
            "success": true,
            "status_code": status_code,
            "data": data,
            "method": method.as_str(),
            "url": url
        })
    }
}

fn value_as_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_url_fails_softly() {
        let executor = RestApiExecutor::new();
        let result = executor.execute(&json!({"method": "GET"}), &json!({})).await;
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn test_bad_method_fails_softly() {
        let executor = RestApiExecutor::new();
        let result = executor
            .execute(&json!({"method": "TELEPORT~", "url": "http://localhost"}), &json!({}))
            .await;
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_softly() {
        let executor = RestApiExecutor::new();
        // Port 1 on loopback refuses the connection immediately.
        let result = executor
            .execute(
                &json!({"method": "GET", "url": "http://127.0.0.1:1/", "query_params": {"a": 1}}),
                &json!({}),
            )
            .await;
        assert_eq!(result["success"], json!(false));
        assert!(result["error"].as_str().unwrap().contains("HTTP request failed"));
    }

    #[test]
    fn test_query_string_rendering() {
        assert_eq!(value_as_query_string(&json!("x")), "x");
        assert_eq!(value_as_query_string(&json!(5)), "5");
        assert_eq!(value_as_query_string(&json!(true)), "true");
    }
}
