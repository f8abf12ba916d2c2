//! MCP Error Types
//!
//! This module defines error types for MCP operations.

use crate::protocol::messages::JsonRpcError;
use std::time::Duration;
use thiserror::Error;

/// MCP Client Error
///
/// Represents all possible errors that can occur during MCP operations.
/// Every variant belongs to one [`ErrorKind`].
#[derive(Debug, Error)]
pub enum McpError {
    /// Bad or missing server descriptor, unsupported transport type
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON-RPC error returned by the server
    #[error("MCP server error: {0}")]
    ServerError(#[from] JsonRpcError),

    /// Transport-level error (connection, write failure, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (ill-formed response, missing result, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Timeout waiting for response
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Handshake failed earlier; the client will not retry it
    #[error("Client unusable: initialization failed: {0}")]
    ClientUnusable(String),

    /// Process spawn error
    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    /// The server closed its output or was shut down with the request in flight
    #[error("Transport closed before a response was received")]
    TransportClosed,

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`McpError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Protocol,
    Timeout,
    ClientState,
}

impl McpError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        McpError::Configuration(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        McpError::Transport(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        McpError::Protocol(msg.into())
    }

    /// Which part of the taxonomy this error falls into
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::Configuration(_) => ErrorKind::Configuration,
            McpError::Transport(_)
            | McpError::HttpStatus { .. }
            | McpError::ProcessSpawn(_)
            | McpError::TransportClosed
            | McpError::Io(_) => ErrorKind::Transport,
            McpError::ServerError(_) | McpError::Json(_) | McpError::Protocol(_) => {
                ErrorKind::Protocol
            }
            McpError::Timeout(_) => ErrorKind::Timeout,
            McpError::ClientUnusable(_) => ErrorKind::ClientState,
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, McpError::Timeout(_))
    }

    /// Check if this is a server error
    pub fn is_server_error(&self) -> bool {
        matches!(self, McpError::ServerError(_))
    }

    /// Check if the transport closed under a pending request
    pub fn is_transport_closed(&self) -> bool {
        matches!(self, McpError::TransportClosed)
    }
}

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::HttpStatus {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 503: Service Unavailable");

        let err = McpError::configuration("unsupported server type: websocket");
        assert_eq!(
            err.to_string(),
            "Configuration error: unsupported server type: websocket"
        );
    }

    #[test]
    fn test_error_helpers() {
        let err = McpError::transport("connection refused");
        assert!(matches!(err, McpError::Transport(_)));

        let err = McpError::protocol("invalid version");
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(McpError::TransportClosed.kind(), ErrorKind::Transport);
        assert_eq!(
            McpError::ProcessSpawn("nope".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            McpError::ServerError(JsonRpcError::new(-32601, "Method not found")).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            McpError::Timeout(Duration::from_secs(30)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            McpError::ClientUnusable("boom".into()).kind(),
            ErrorKind::ClientState
        );
    }

    #[test]
    fn test_error_checks() {
        assert!(McpError::Timeout(Duration::from_secs(5)).is_timeout());
        assert!(!McpError::TransportClosed.is_timeout());
        assert!(McpError::TransportClosed.is_transport_closed());
    }
}
