//! Server descriptors
//!
//! One entry of an MCP configuration file (the values under `mcpServers` or
//! `servers`) describes how to reach a server. A missing `type` means stdio.

use crate::protocol::{McpError, McpResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "stdio")]
use crate::transport::stdio::StdioConfig;

#[cfg(feature = "http")]
use crate::transport::http::HttpTransportBuilder;

/// How to reach one MCP server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub enum ServerDescriptor {
    /// Spawn a local process and speak line-delimited JSON-RPC over its stdio
    Stdio {
        command: String,
        args: Vec<String>,
        /// Variables layered over the caller's base environment
        env: HashMap<String, String>,
    },
    /// POST each request to `url`
    Http {
        url: String,
        headers: HashMap<String, String>,
    },
}

/// Wire shape of a descriptor before the `type` is checked
#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

impl TryFrom<RawDescriptor> for ServerDescriptor {
    type Error = McpError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        match raw.kind.as_deref().unwrap_or("stdio") {
            "stdio" => {
                let command = raw
                    .command
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| McpError::configuration("stdio server has no command"))?;
                Ok(ServerDescriptor::Stdio {
                    command,
                    args: raw.args,
                    env: raw.env,
                })
            }
            "http" | "streamable-http" => {
                let url = raw
                    .url
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| McpError::configuration("http server has no url"))?;
                Ok(ServerDescriptor::Http {
                    url,
                    headers: raw.headers,
                })
            }
            other => Err(McpError::configuration(format!(
                "unsupported server type: {}",
                other
            ))),
        }
    }
}

impl ServerDescriptor {
    /// Parse a descriptor from an already-decoded JSON entry
    pub fn from_value(value: Value) -> McpResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| McpError::configuration(format!("invalid server descriptor: {}", e)))
    }

    /// Parse a descriptor from JSON text
    pub fn from_json_str(json: &str) -> McpResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| McpError::configuration(format!("invalid server descriptor: {}", e)))
    }

    /// `"stdio"` or `"http"`
    pub fn transport_type(&self) -> &'static str {
        match self {
            ServerDescriptor::Stdio { .. } => "stdio",
            ServerDescriptor::Http { .. } => "http",
        }
    }

    /// Spawn configuration for a stdio descriptor.
    ///
    /// The child gets exactly `base_env` overlaid with the descriptor's `env`;
    /// nothing is read from the current process. Returns `None` for HTTP
    /// descriptors.
    #[cfg(feature = "stdio")]
    pub fn stdio_config<I, K, V>(&self, base_env: I) -> Option<StdioConfig>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let ServerDescriptor::Stdio { command, args, env } = self else {
            return None;
        };
        Some(
            StdioConfig::new(command.clone())
                .args(args.iter().cloned())
                .envs(base_env)
                .envs(env.clone()),
        )
    }

    /// Transport builder for an HTTP descriptor, `None` for stdio
    #[cfg(feature = "http")]
    pub fn http_builder(&self) -> Option<HttpTransportBuilder> {
        let ServerDescriptor::Http { url, headers } = self else {
            return None;
        };
        Some(HttpTransportBuilder::new(url.clone()).with_headers(headers.clone()))
    }
}

/// Read every server entry from the text of an MCP configuration file.
///
/// Entries live under `mcpServers`, or `servers` for editors that use that
/// key. A file with neither yields an empty map. One bad entry fails the
/// whole file, naming the server.
pub fn parse_config_servers(json: &str) -> McpResult<BTreeMap<String, ServerDescriptor>> {
    let mut config: Value = serde_json::from_str(json)
        .map_err(|e| McpError::configuration(format!("invalid MCP configuration: {}", e)))?;

    let mut servers = config.get_mut("mcpServers").map(Value::take).unwrap_or(Value::Null);
    if servers.is_null() {
        servers = config.get_mut("servers").map(Value::take).unwrap_or(Value::Null);
    }

    let entries = match servers {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Object(entries) => entries,
        _ => return Err(McpError::configuration("server list must be an object")),
    };

    entries
        .into_iter()
        .map(|(name, entry)| -> McpResult<(String, ServerDescriptor)> {
            let descriptor = ServerDescriptor::from_value(entry).map_err(|e| match e {
                McpError::Configuration(msg) => {
                    McpError::configuration(format!("server '{}': {}", name, msg))
                }
                other => other,
            })?;
            Ok((name, descriptor))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_type_means_stdio() {
        let descriptor = ServerDescriptor::from_value(json!({
            "command": "npx",
            "args": ["-y", "@modelcontextprotocol/server-everything"],
            "env": {"DEBUG": "1"}
        }))
        .unwrap();

        assert_eq!(descriptor.transport_type(), "stdio");
        match descriptor {
            ServerDescriptor::Stdio { command, args, env } => {
                assert_eq!(command, "npx");
                assert_eq!(args.len(), 2);
                assert_eq!(env["DEBUG"], "1");
            }
            other => panic!("expected stdio, got {:?}", other),
        }
    }

    #[test]
    fn test_http_types() {
        for kind in ["http", "streamable-http"] {
            let descriptor = ServerDescriptor::from_value(json!({
                "type": kind,
                "url": "https://example.com/mcp",
                "headers": {"Authorization": "Bearer abc"}
            }))
            .unwrap();
            assert_eq!(
                descriptor,
                ServerDescriptor::Http {
                    url: "https://example.com/mcp".into(),
                    headers: HashMap::from([("Authorization".into(), "Bearer abc".into())]),
                }
            );
        }
    }

    #[test]
    fn test_unsupported_type() {
        let err = ServerDescriptor::from_value(json!({"type": "websocket", "url": "ws://x"}))
            .unwrap_err();
        assert!(matches!(err, McpError::Configuration(ref msg) if msg.contains("websocket")));
    }

    #[test]
    fn test_missing_command_or_url() {
        let err = ServerDescriptor::from_value(json!({"type": "stdio"})).unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));

        let err = ServerDescriptor::from_json_str(r#"{"type":"http","headers":{}}"#).unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = ServerDescriptor::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));

        let err = ServerDescriptor::from_value(json!({"command": "x", "args": "oops"})).unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));
    }

    #[cfg(feature = "stdio")]
    #[test]
    fn test_stdio_config_overlays_env() {
        let descriptor = ServerDescriptor::from_value(json!({
            "command": "server",
            "args": ["--flag"],
            "env": {"TOKEN": "from-descriptor", "EXTRA": "1"}
        }))
        .unwrap();

        let config = descriptor
            .stdio_config([("PATH", "/usr/bin"), ("TOKEN", "from-base")])
            .unwrap();

        assert_eq!(config.command, "server");
        assert_eq!(config.args, vec!["--flag"]);
        assert_eq!(config.env["PATH"], "/usr/bin");
        assert_eq!(config.env["TOKEN"], "from-descriptor");
        assert_eq!(config.env["EXTRA"], "1");
        assert_eq!(config.env.len(), 3);
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_builders_match_type() {
        let http = ServerDescriptor::from_value(json!({"type": "http", "url": "http://h/mcp"})).unwrap();
        assert!(http.http_builder().is_some());

        #[cfg(feature = "stdio")]
        assert!(http.stdio_config(Vec::<(String, String)>::new()).is_none());
    }

    #[test]
    fn test_parse_config_servers() {
        let servers = parse_config_servers(
            r#"{
                "mcpServers": {
                    "files": {"command": "mcp-files", "args": ["/tmp"]},
                    "remote": {"type": "streamable-http", "url": "https://r.example/mcp"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers["files"].transport_type(), "stdio");
        assert_eq!(servers["remote"].transport_type(), "http");

        let servers =
            parse_config_servers(r#"{"servers": {"a": {"command": "a"}}}"#).unwrap();
        assert!(servers.contains_key("a"));

        assert!(parse_config_servers("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_config_names_bad_server() {
        let err = parse_config_servers(r#"{"mcpServers": {"bad": {"type": "ftp"}}}"#).unwrap_err();
        assert!(matches!(err, McpError::Configuration(ref msg) if msg.contains("'bad'")));
    }
}
