//! HTTP client transport for the HTTP+SSE server.
//!
//! Every request is a POST to `<base>/message`; the response body is the
//! JSON-RPC response. The event stream is the server's concern and is
//! not consumed here.

use crate::error::{ClientError, ClientResult};
use crate::protocol::types::{JsonRpcRequest, JsonRpcResponse};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Total request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct HttpClientTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpClientTransport {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ClientError::Transport(format!("Invalid URL '{}': {}", base_url, e)))?;
        let endpoint = base
            .join("/message")
            .map_err(|e| ClientError::Transport(format!("Invalid URL '{}': {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::from)?;

        debug!("HTTP transport posting to {}", endpoint);
        Ok(Self { http, endpoint })
    }

    pub async fn request(&self, request: &JsonRpcRequest) -> ClientResult<JsonRpcResponse> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() && serde_json::from_str::<JsonRpcResponse>(&body).is_err() {
            return Err(ClientError::Transport(format!(
                "HTTP {} from server: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ClientError::Protocol(format!("Malformed response: {}", e)))
    }

    pub async fn notify(&self, request: &JsonRpcRequest) -> ClientResult<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::ACCEPTED {
            return Err(ClientError::Transport(format!(
                "HTTP {} from server on notification",
                status
            )));
        }
        Ok(())
    }
}
