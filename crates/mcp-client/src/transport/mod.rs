//! MCP Transport Layer
//!
//! This module defines the transport abstraction for MCP communication.
//! A transport turns one logical JSON-RPC request into a result value; how
//! the request travels (a line on a child's stdin, an HTTP POST) and how the
//! answer is found again (pending-request table, SSE body) is its own business.

#[cfg(feature = "stdio")]
mod pending;
pub mod sse;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "stdio")]
pub mod stdio;

use crate::protocol::McpError;
use async_trait::async_trait;
use serde_json::Value;

/// Transport trait for MCP communication
///
/// Methods take `&self` so that several requests can be in flight on one
/// transport at the same time.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its result.
    ///
    /// The transport assigns the correlation id. A response carrying an
    /// `error` yields [`McpError::ServerError`]; a response carrying neither
    /// `result` nor `error` yields [`McpError::Protocol`].
    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError>;

    /// Send a notification; no response is expected
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError>;

    /// Close the transport connection
    async fn close(&self) -> Result<(), McpError>;

    /// Check if the transport is still connected
    fn is_connected(&self) -> bool;
}
