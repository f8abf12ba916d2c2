//! End-to-end tests: McpClient over StdioTransport against a shell-script MCP server.
#![cfg(all(unix, feature = "stdio"))]

use futures::future::join_all;
use mcp_client::{ClientState, McpClient, McpClientConfig, McpError, PromptOutput, ServerDescriptor};
use serde_json::json;

/// A small MCP server: answers by method, refuses work before
/// `notifications/initialized`, and rejects a second `initialize`.
const FAKE_SERVER: &str = r#"
ready=0
inits=0
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      inits=$((inits + 1))
      if [ "$inits" -gt 1 ]; then
        printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32600,"message":"already initialized"}}\n' "$id"
      else
        printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2025-06-18","capabilities":{"tools":{},"prompts":{}},"serverInfo":{"name":"sh-server","version":"0.0.1"}}}\n' "$id"
      fi
      ;;
    *'"method":"notifications/initialized"'*)
      ready=1
      echo "client is ready" >&2
      ;;
    *)
      if [ "$ready" -ne 1 ]; then
        printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32002,"message":"not initialized"}}\n' "$id"
        continue
      fi
      case "$line" in
        *'"method":"tools/list"'*)
          echo "starting listing..."
          printf '{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}\n'
          printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echo","description":"Echo text","inputSchema":{"type":"object","required":["text"]}}]}}\n' "$id"
          ;;
        *'"method":"tools/call"'*)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"echoed"}],"isError":false}}\n' "$id"
          ;;
        *'"method":"prompts/get"'*)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"messages":[{"role":"user","content":{"type":"text","text":"first"}},{"role":"assistant","content":{"type":"text","text":"second"}}]}}\n' "$id"
          ;;
        *'"method":"resources/list"'*)
          printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id"
          ;;
        *)
          printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id"
          ;;
      esac
      ;;
  esac
done
"#;

async fn connect(script: &str) -> McpClient {
    let descriptor = ServerDescriptor::from_value(json!({
        "command": "/bin/sh",
        "args": ["-c", script]
    }))
    .unwrap();
    McpClient::connect_descriptor(&descriptor, std::env::vars(), McpClientConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_session() {
    let client = connect(FAKE_SERVER).await;
    assert_eq!(client.state(), ClientState::Uninitialized);

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
    assert_eq!(tools[0].required_params(), vec!["text"]);

    let content = client
        .call_tool("echo", json!({"text": "hi"}))
        .await
        .unwrap();
    assert_eq!(content[0]["text"], "echoed");

    let prompt = client.get_prompt("duo", json!({})).await.unwrap();
    assert_eq!(prompt, PromptOutput::Text("first\n\nsecond".to_string()));

    assert!(client.list_resources().await.unwrap().is_empty());

    let info = client.server_info().await.unwrap();
    assert_eq!(info.name.as_deref(), Some("sh-server"));
    assert!(info.has_capability("prompts"));

    let err = client.request("sampling/unknown", json!({})).await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(client.state(), ClientState::Ready);

    client.close().await.unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_concurrent_first_operations() {
    let client = connect(FAKE_SERVER).await;

    let (tools, calls) = tokio::join!(
        client.list_tools(),
        join_all((0..3).map(|i| client.call_tool("echo", json!({"text": i}))))
    );

    assert_eq!(tools.unwrap().len(), 1);
    for call in calls {
        assert_eq!(call.unwrap()[0]["text"], "echoed");
    }
    assert_eq!(client.state(), ClientState::Ready);
}

#[tokio::test]
async fn test_rejected_initialize_locks_client() {
    let client = connect(
        r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32602,"message":"unsupported protocol version"}}\n' "$id"
done
"#,
    )
    .await;

    let err = client.list_tools().await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(client.state(), ClientState::Failed);

    let err = client.list_prompts().await.unwrap_err();
    assert!(matches!(err, McpError::ClientUnusable(ref reason) if reason.contains("unsupported protocol version")));
}

#[tokio::test]
async fn test_server_that_exits_fails_handshake() {
    let client = connect("read -r _line; exit 0").await;

    assert!(client.list_tools().await.is_err());
    assert_eq!(client.state(), ClientState::Failed);
}
