//! # mcp-client
//!
//! Model Context Protocol (MCP) client core: JSON-RPC 2.0 over a child
//! process's stdio or over HTTP POST with SSE-framed answers.
//!
//! ## Features
//!
//! - **Lazy handshake**: `initialize` runs once, in front of the first operation,
//!   even when several operations start at the same time
//! - **Stdio Transport**: spawn MCP servers as subprocesses; concurrent requests
//!   are matched to responses by id
//! - **HTTP Transport**: one POST per request, plain JSON or `text/event-stream` bodies
//! - **Server descriptors**: read the `mcpServers` entries of MCP config files
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcp_client::{McpClient, StdioTransport};
//!
//! // Spawn an MCP server
//! let transport = StdioTransport::spawn("npx", &["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]).await?;
//! let client = McpClient::new(transport);
//!
//! // The first call performs the handshake
//! for tool in client.list_tools().await? {
//!     println!("Tool: {} - {}", tool.name, tool.description.as_deref().unwrap_or(""));
//! }
//!
//! // Call a tool
//! let content = client.call_tool("read_file", serde_json::json!({"path": "/tmp/test.txt"})).await?;
//! ```

pub mod config;
pub mod protocol;
pub mod transport;

mod client;

// Re-exports
pub use client::{ClientState, McpClient, McpClientConfig};
pub use config::{parse_config_servers, ServerDescriptor};
pub use protocol::{
    error::{ErrorKind, McpError, McpResult},
    types::{McpPrompt, McpResource, McpTool, PromptOutput, ServerInfo},
};
pub use transport::{sse::decode_body, Transport};

#[cfg(feature = "http")]
pub use transport::http::{HttpTransport, HttpTransportBuilder};
#[cfg(feature = "stdio")]
pub use transport::stdio::{StdioConfig, StdioTransport};
