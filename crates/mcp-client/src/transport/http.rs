//! HTTP Transport for MCP
//!
//! Each request is one independent HTTP POST carrying a JSON-RPC request.
//! The answer comes back as a plain JSON body or as an SSE-framed body and is
//! decoded by [`decode_body`]. No session state is kept between calls.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcp_client::HttpTransport;
//!
//! let transport = HttpTransport::new("https://your-mcp-server.com/mcp")
//!     .with_header("Authorization", "Bearer token")
//!     .build()?;
//!
//! let client = McpClient::new(transport);
//! ```

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, McpError, RequestId};
use crate::transport::sse::decode_body;
use crate::transport::Transport;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

/// Default bound on each read from the server
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// HTTP Transport for MCP communication
pub struct HttpTransport {
    /// Endpoint URL of the MCP server
    url: String,
    /// HTTP client
    client: reqwest::Client,
    /// Headers sent with every request (defaults merged with caller headers)
    headers: HeaderMap,
    timeout: Duration,
    /// Connection state
    connected: AtomicBool,
}

impl HttpTransport {
    /// Create a new HTTP transport builder
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let transport = HttpTransport::new("https://mcp-server.example.com/api")
    ///     .with_header("Authorization", "Bearer token")
    ///     .build()?;
    /// ```
    pub fn new(url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(url)
    }

    /// Get the server URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one JSON-RPC message and check the status
    async fn post<T: Serialize>(&self, message: &T) -> Result<reqwest::Response, McpError> {
        if !self.is_connected() {
            return Err(McpError::TransportClosed);
        }

        let body = serde_json::to_string(message)?;
        trace!(url = %self.url, "MCP HTTP send: {}", body);

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| self.request_error("HTTP request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(url = %self.url, status = %status, "MCP HTTP error response: {}", body);
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body
            };
            return Err(McpError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    fn request_error(&self, context: &str, e: reqwest::Error) -> McpError {
        if e.is_timeout() {
            McpError::Timeout(self.timeout)
        } else {
            McpError::Transport(format!("{}: {}", context, e))
        }
    }
}

/// Builder for HttpTransport
///
/// Provides a fluent API for configuring HTTP transport options.
pub struct HttpTransportBuilder {
    url: String,
    headers: HashMap<String, String>,
    timeout: Duration,
}

impl HttpTransportBuilder {
    /// Create a new builder with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Add a custom header to all requests
    ///
    /// Custom headers replace the default `Content-Type`/`Accept` of the same name.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add multiple headers at once
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the read timeout in seconds (default: 60)
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    /// Set the read timeout.
    ///
    /// Bounds each wait for data from the server, not the whole exchange: a
    /// stream that keeps delivering events is never cut off.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the transport
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Configuration`] for header names or values that are
    /// not valid HTTP, and [`McpError::Transport`] if the HTTP client cannot
    /// be created.
    pub fn build(self) -> Result<HttpTransport, McpError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/event-stream, application/json"),
        );

        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpError::configuration(format!("invalid header name {:?}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpError::configuration(format!("invalid value for header {}: {}", key, e)))?;
            headers.insert(name, value);
        }

        let timeout = self.timeout;
        let client = reqwest::Client::builder()
            .read_timeout(timeout)
            .build()
            .map_err(|e| McpError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpTransport {
            url: self.url,
            client,
            headers,
            timeout,
            connected: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        // Every POST stands alone, so a random id is as good as any counter.
        let id = RequestId::String(Uuid::new_v4().to_string());
        let request = JsonRpcRequest::new(id.clone(), method).with_params(params);

        let response = self.post(&request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.request_error("Failed to read response", e))?;

        trace!(url = %self.url, id = %id, "MCP HTTP response: {}", body);
        decode_body(&body)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let mut notification = JsonRpcNotification::new(method);
        if let Some(params) = params {
            notification = notification.with_params(params);
        }
        // Servers answer 202 Accepted; whatever body comes with it is irrelevant.
        self.post(&notification).await.map(drop)
    }

    async fn close(&self) -> Result<(), McpError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}
