//! MCP Protocol Types
//!
//! This module defines the MCP-specific types used in the protocol:
//! - Initialization parameters and the cached server information
//! - Tool, prompt and resource descriptors
//! - Request parameters and the rendered output of `prompts/get`

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================
// MCP Protocol Version
// ============================================

/// Protocol version sent in `initialize` unless configured otherwise
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

/// Client name sent in `initialize` unless configured otherwise
pub const DEFAULT_CLIENT_NAME: &str = "mcp-cli";

// ============================================
// Initialization Types
// ============================================

/// Parameters for the initialize request
#[derive(Debug, Clone, Serialize)]
pub struct InitializeParams {
    /// Protocol version the client speaks
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Client capabilities
    pub capabilities: ClientCapabilities,

    /// Client information
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Params with the fixed client capabilities
    pub fn new(protocol_version: impl Into<String>, client_info: ClientInfo) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}

/// Client capabilities advertised during initialization
///
/// Always `{"roots": {"listChanged": true}, "sampling": {}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientCapabilities {
    pub roots: RootsCapability,

    /// Empty object: sampling is declared but carries no options
    pub sampling: Map<String, Value>,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            roots: RootsCapability { list_changed: true },
            sampling: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RootsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Information about the MCP client
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,

    /// Client version
    pub version: String,
}

/// Result of the initialize request
///
/// Every field is optional; servers that answer with a bare `{}` still
/// complete the handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the server selected
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: Option<String>,

    /// Server capabilities, kept as raw JSON per capability name
    #[serde(default)]
    pub capabilities: Option<Map<String, Value>>,

    /// Server identity
    #[serde(rename = "serverInfo", default)]
    pub server_info: Option<ServerIdentity>,

    /// Optional instructions from the server
    #[serde(default)]
    pub instructions: Option<String>,
}

/// The `serverInfo` object of an initialize result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Anything else the server chose to describe itself with (title, description, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server information cached by the client after the handshake
///
/// Serializes to `{}` when the server described nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(
        rename = "protocolVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub protocol_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerInfo {
    /// Whether the server advertised the named capability (`tools`, `prompts`, ...)
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .as_ref()
            .is_some_and(|caps| caps.contains_key(name))
    }

    /// True when the handshake told us nothing at all
    pub fn is_empty(&self) -> bool {
        *self == ServerInfo::default()
    }
}

impl From<InitializeResult> for ServerInfo {
    fn from(result: InitializeResult) -> Self {
        let identity = result.server_info.unwrap_or_default();
        Self {
            name: identity.name,
            version: identity.version,
            protocol_version: result.protocol_version,
            capabilities: result.capabilities,
            instructions: result.instructions,
            extra: identity.extra,
        }
    }
}

// ============================================
// Descriptor Types
// ============================================

/// MCP Tool Definition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct McpTool {
    /// Unique tool name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl McpTool {
    /// Names listed under `inputSchema.required`
    pub fn required_params(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// MCP Prompt Definition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct McpPrompt {
    /// Unique prompt name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Arguments the prompt accepts; `null` reads as none
    #[serde(default, deserialize_with = "null_as_default")]
    pub arguments: Vec<PromptArgument>,
}

/// Argument definition for a prompt
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Whether this argument is required; `null` reads as false
    #[serde(default, deserialize_with = "null_as_default")]
    pub required: bool,
}

/// MCP Resource Definition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct McpResource {
    /// Resource URI
    pub uri: String,

    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Description of the resource
    #[serde(default)]
    pub description: Option<String>,

    /// MIME type
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

/// Servers send `null` for "nothing" where the schema says missing
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================
// Request Parameters
// ============================================

/// Parameters for `tools/call` and `prompts/get`
#[derive(Debug, Clone, Serialize)]
pub struct NamedCallParams {
    /// Name of the tool or prompt
    pub name: String,

    /// Arguments object
    pub arguments: Value,
}

// ============================================
// Prompt Output
// ============================================

/// What `prompts/get` produced
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutput {
    /// Message texts joined by a blank line
    Text(String),

    /// The result had no `messages` sequence
    Raw(Value),
}

impl PromptOutput {
    /// Shape a `prompts/get` result.
    ///
    /// Each message contributes `content.text`; content without a text field
    /// contributes itself (strings verbatim, anything else as JSON).
    pub fn from_result(result: Value) -> Self {
        let Some(messages) = result.get("messages").and_then(Value::as_array) else {
            return PromptOutput::Raw(result);
        };

        let parts: Vec<String> = messages
            .iter()
            .map(|message| {
                let content = message.get("content").unwrap_or(&Value::Null);
                match content.get("text").and_then(Value::as_str) {
                    Some(text) => text.to_string(),
                    None => match content {
                        Value::String(text) => text.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    },
                }
            })
            .collect();

        PromptOutput::Text(parts.join("\n\n"))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PromptOutput::Text(text) => Some(text),
            PromptOutput::Raw(_) => None,
        }
    }
}

impl std::fmt::Display for PromptOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptOutput::Text(text) => f.write_str(text),
            PromptOutput::Raw(value) => write!(f, "{}", value),
        }
    }
}
