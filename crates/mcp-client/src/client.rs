//! MCP Client Implementation
//!
//! The MCP client handles the protocol-level conversation with one server:
//! the `initialize` handshake, discovery of tools, prompts and resources, and
//! tool/prompt invocation. The handshake runs lazily, at most once, in front
//! of the first operation.

use crate::config::ServerDescriptor;
use crate::protocol::{
    ClientInfo, InitializeParams, InitializeResult, McpError, McpPrompt,
    McpResource, McpResult, McpTool, NamedCallParams, PromptOutput, ServerInfo,
    DEFAULT_CLIENT_NAME, DEFAULT_PROTOCOL_VERSION,
};
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "http")]
use crate::transport::http::HttpTransport;
#[cfg(feature = "stdio")]
use crate::transport::stdio::StdioTransport;

/// MCP Client Configuration
///
/// Values sent in the `initialize` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpClientConfig {
    /// Protocol version the client asks for
    pub protocol_version: String,

    /// Client name reported to the server
    pub client_name: String,

    /// Client version reported to the server
    pub client_version: String,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl McpClientConfig {
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }
}

/// Where the client is in its handshake lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// No operation has run yet
    Uninitialized,
    /// The `initialize` request is in flight
    Initializing,
    /// Handshake done; operations go straight to the transport
    Ready,
    /// Handshake failed; every operation fails with [`McpError::ClientUnusable`]
    Failed,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClientState::Uninitialized,
            1 => ClientState::Initializing,
            2 => ClientState::Ready,
            _ => ClientState::Failed,
        }
    }
}

/// Handshake outcome, guarded by the client's lifecycle mutex
enum Lifecycle {
    Uninitialized,
    Ready(ServerInfo),
    Failed(String),
}

/// MCP Client
///
/// Owns one transport. Operations take `&self`; several can be in flight at
/// once, and concurrent first calls share a single handshake.
pub struct McpClient {
    /// The underlying transport
    transport: Box<dyn Transport>,

    /// Client configuration
    config: McpClientConfig,

    /// Held for the whole handshake so that only one caller performs it
    lifecycle: Mutex<Lifecycle>,

    /// Mirror of the lifecycle for lock-free reads, a `ClientState` as u8
    phase: AtomicU8,
}

impl McpClient {
    /// Wrap a transport. No traffic happens until the first operation.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let transport = StdioTransport::spawn("npx", &["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]).await?;
    /// let client = McpClient::new(transport);
    /// let tools = client.list_tools().await?;
    /// ```
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_config(transport, McpClientConfig::default())
    }

    /// Wrap a transport with custom handshake values
    pub fn with_config<T: Transport + 'static>(transport: T, config: McpClientConfig) -> Self {
        Self::from_boxed(Box::new(transport), config)
    }

    /// Wrap an already boxed transport
    pub fn from_boxed(transport: Box<dyn Transport>, config: McpClientConfig) -> Self {
        Self {
            transport,
            config,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            phase: AtomicU8::new(ClientState::Uninitialized as u8),
        }
    }

    /// Build the transport a descriptor asks for and wrap it.
    ///
    /// Stdio servers are spawned right away with `base_env` overlaid by the
    /// descriptor's own `env` as their complete environment. The handshake
    /// still waits for the first operation.
    #[instrument(skip(descriptor, base_env, config), fields(transport = descriptor.transport_type()))]
    #[cfg_attr(not(feature = "stdio"), allow(unused_variables))]
    pub async fn connect_descriptor<I, K, V>(
        descriptor: &ServerDescriptor,
        base_env: I,
        config: McpClientConfig,
    ) -> McpResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let transport: Box<dyn Transport> = match descriptor {
            #[cfg(feature = "stdio")]
            ServerDescriptor::Stdio { .. } => {
                let stdio = descriptor
                    .stdio_config(base_env)
                    .ok_or_else(|| McpError::configuration("not a stdio descriptor"))?;
                Box::new(StdioTransport::spawn_with_config(stdio).await?)
            }
            #[cfg(feature = "http")]
            ServerDescriptor::Http { .. } => {
                let builder = descriptor
                    .http_builder()
                    .ok_or_else(|| McpError::configuration("not an http descriptor"))?;
                Box::new(builder.build()?)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(McpError::configuration(format!(
                    "{} transport support is not compiled in",
                    other.transport_type()
                )))
            }
        };

        Ok(Self::from_boxed(transport, config))
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// List the server's tools. A result without `tools` yields an empty list.
    #[instrument(skip(self))]
    pub async fn list_tools(&self) -> McpResult<Vec<McpTool>> {
        let result = self.request("tools/list", json!({})).await?;
        let tools: Vec<McpTool> = list_field(result, "tools")?;
        debug!(tool_count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// List the server's prompts. A result without `prompts` yields an empty list.
    #[instrument(skip(self))]
    pub async fn list_prompts(&self) -> McpResult<Vec<McpPrompt>> {
        let result = self.request("prompts/list", json!({})).await?;
        list_field(result, "prompts")
    }

    /// List the server's resources. A result without `resources` yields an empty list.
    #[instrument(skip(self))]
    pub async fn list_resources(&self) -> McpResult<Vec<McpResource>> {
        let result = self.request("resources/list", json!({})).await?;
        list_field(result, "resources")
    }

    /// Call a tool on the MCP server
    ///
    /// Returns the result's `content` field, or the whole result when the
    /// server sent no `content`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let content = client.call_tool("read_file", serde_json::json!({
    ///     "path": "/tmp/test.txt"
    /// })).await?;
    /// ```
    #[instrument(skip(self, arguments), fields(tool_name = %name))]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<Value> {
        let params = NamedCallParams {
            name: name.to_string(),
            arguments,
        };
        let mut result = self
            .request("tools/call", serde_json::to_value(params)?)
            .await?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            warn!(tool_name = %name, "Tool returned error result");
        }

        Ok(match result.get_mut("content").map(Value::take) {
            Some(content) if !content.is_null() => content,
            _ => result,
        })
    }

    /// Render a prompt
    #[instrument(skip(self, arguments), fields(prompt_name = %name))]
    pub async fn get_prompt(&self, name: &str, arguments: Value) -> McpResult<PromptOutput> {
        let params = NamedCallParams {
            name: name.to_string(),
            arguments,
        };
        let result = self
            .request("prompts/get", serde_json::to_value(params)?)
            .await?;
        Ok(PromptOutput::from_result(result))
    }

    /// Server information captured by the handshake.
    ///
    /// Runs the handshake if it has not happened yet. Empty when the server
    /// described nothing.
    #[instrument(skip(self))]
    pub async fn server_info(&self) -> McpResult<ServerInfo> {
        self.ensure_initialized().await?;
        match &*self.lifecycle.lock().await {
            Lifecycle::Ready(info) => Ok(info.clone()),
            Lifecycle::Failed(reason) => Err(McpError::ClientUnusable(reason.clone())),
            Lifecycle::Uninitialized => Err(McpError::protocol("handshake did not complete")),
        }
    }

    /// Send any other request after the handshake and return its raw result
    #[instrument(skip(self, params), fields(method = %method))]
    pub async fn request(&self, method: &str, params: Value) -> McpResult<Value> {
        self.ensure_initialized().await?;
        self.transport.request(method, params).await
    }

    /// Check if the transport is still connected
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Close the client connection
    pub async fn close(&self) -> McpResult<()> {
        debug!("Closing MCP client connection");
        self.transport.close().await
    }

    // ========================================
    // Handshake
    // ========================================

    async fn ensure_initialized(&self) -> McpResult<()> {
        if self.state() == ClientState::Ready {
            return Ok(());
        }

        let mut lifecycle = self.lifecycle.lock().await;
        match &*lifecycle {
            Lifecycle::Ready(_) => return Ok(()),
            Lifecycle::Failed(reason) => return Err(McpError::ClientUnusable(reason.clone())),
            Lifecycle::Uninitialized => {}
        }

        self.set_phase(ClientState::Initializing);
        let reset = PhaseReset { phase: &self.phase };
        let outcome = self.handshake().await;
        std::mem::forget(reset);

        match outcome {
            Ok(info) => {
                *lifecycle = Lifecycle::Ready(info);
                self.set_phase(ClientState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "MCP initialization failed");
                *lifecycle = Lifecycle::Failed(e.to_string());
                self.set_phase(ClientState::Failed);
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> McpResult<ServerInfo> {
        debug!("Starting MCP initialization handshake");

        let params = InitializeParams::new(
            self.config.protocol_version.clone(),
            ClientInfo {
                name: self.config.client_name.clone(),
                version: self.config.client_version.clone(),
            },
        );

        let result = self
            .transport
            .request("initialize", serde_json::to_value(params)?)
            .await?;
        let result: InitializeResult = match result {
            Value::Null => InitializeResult::default(),
            other => serde_json::from_value(other)?,
        };

        // A server that answers the notification with an HTTP error status
        // has still completed `initialize`; anything else means the channel is gone.
        match self.transport.notify("notifications/initialized", None).await {
            Ok(()) => {}
            Err(e @ McpError::HttpStatus { .. }) => {
                warn!(error = %e, "Server rejected notifications/initialized");
            }
            Err(e) => return Err(e),
        }

        let info = ServerInfo::from(result);
        info!(
            server_name = ?info.name,
            server_version = ?info.version,
            protocol_version = ?info.protocol_version,
            "MCP server initialized"
        );
        Ok(info)
    }

    fn set_phase(&self, state: ClientState) {
        self.phase.store(state as u8, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}

/// Puts the phase back to `Uninitialized` if the handshake future is dropped
/// before it finishes; forgotten once the handshake has an outcome.
struct PhaseReset<'a> {
    phase: &'a AtomicU8,
}

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.phase
            .store(ClientState::Uninitialized as u8, Ordering::SeqCst);
    }
}

/// Pull a list out of a listing result; missing or null means empty
fn list_field<T: DeserializeOwned>(mut result: Value, field: &str) -> McpResult<Vec<T>> {
    match result.get_mut(field).map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => serde_json::from_value(items).map_err(McpError::from),
    }
}
