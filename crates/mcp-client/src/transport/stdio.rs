//! Stdio Transport for MCP
//!
//! This transport spawns an MCP server as a subprocess and communicates
//! with it via stdin/stdout using newline-delimited JSON.
//!
//! A background task owns stdout. It parses every line and hands responses to
//! whichever caller registered the matching id, so any number of requests can
//! be outstanding at once and answers may come back in any order.

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpError, RequestId};
use crate::transport::pending::{Completion, PendingEntry, PendingRequests};
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

/// How long a request waits for its response line
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `close()` lets the server exit on its own before killing it
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Stdio Transport Configuration
#[derive(Debug, Clone)]
pub struct StdioConfig {
    /// Command to run (e.g., "npx", "python", "node")
    pub command: String,

    /// Arguments for the command
    pub args: Vec<String>,

    /// Complete environment of the child process.
    ///
    /// Nothing is inherited implicitly: the child sees exactly these
    /// variables. Use [`StdioConfig::envs`] with `std::env::vars()` to pass
    /// the parent environment through.
    pub env: HashMap<String, String>,

    /// Working directory for the process
    pub working_dir: Option<String>,

    /// Per-request response timeout
    pub request_timeout: Duration,
}

impl StdioConfig {
    /// Create a new stdio configuration
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables; later values replace earlier ones
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the per-request timeout (default: 30 seconds)
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Stdio Transport
///
/// Spawns an MCP server as a child process and communicates via stdin/stdout.
pub struct StdioTransport {
    /// Child process handle, taken on close
    child: Mutex<Option<Child>>,

    /// Stdin writer, taken on close
    stdin: Mutex<Option<ChildStdin>>,

    /// Requests waiting for a response line
    pending: Arc<PendingRequests>,

    /// Task reading stdout
    reader: JoinHandle<()>,

    /// Task forwarding stderr to the log
    stderr_drain: JoinHandle<()>,

    /// Request ID counter
    next_id: AtomicU64,

    /// Cleared when stdout closes or the transport is closed
    connected: Arc<AtomicBool>,

    request_timeout: Duration,

    /// Server command (for debug/error messages)
    command_str: String,
}

impl StdioTransport {
    /// Spawn a new MCP server process
    ///
    /// The child inherits the current process environment.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let transport = StdioTransport::spawn("npx", &["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]).await?;
    /// ```
    pub async fn spawn(command: &str, args: &[&str]) -> Result<Self, McpError> {
        let config = StdioConfig::new(command)
            .args(args.iter().copied())
            .envs(std::env::vars());
        Self::spawn_with_config(config).await
    }

    /// Spawn a new MCP server process with full configuration
    pub async fn spawn_with_config(config: StdioConfig) -> Result<Self, McpError> {
        let command_str = if config.args.is_empty() {
            config.command.clone()
        } else {
            format!("{} {}", config.command, config.args.join(" "))
        };
        debug!(command = %command_str, "Spawning MCP server process");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .env_clear()
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!(error = %e, command = %command_str, "Failed to spawn MCP server");
            McpError::ProcessSpawn(format!("{}: {}", command_str, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::ProcessSpawn("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::ProcessSpawn("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::ProcessSpawn("Failed to capture stderr".to_string()))?;

        let pending = Arc::new(PendingRequests::new());
        let connected = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_responses(
            stdout,
            pending.clone(),
            connected.clone(),
            command_str.clone(),
        ));
        let stderr_drain = tokio::spawn(drain_stderr(stderr, command_str.clone()));

        debug!(command = %command_str, pid = ?child.id(), "MCP server process spawned");

        Ok(Self {
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            pending,
            reader,
            stderr_drain,
            next_id: AtomicU64::new(1),
            connected,
            request_timeout: config.request_timeout,
            command_str,
        })
    }

    /// Number of requests currently waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Write one JSON line to the server's stdin
    async fn send_line(&self, line: &str) -> Result<(), McpError> {
        if !self.is_connected() {
            return Err(McpError::TransportClosed);
        }

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(McpError::TransportClosed)?;

        trace!(message = %line, "Sending message to MCP server");

        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');

        stdin.write_all(framed.as_bytes()).await.map_err(|e| {
            error!(error = %e, command = %self.command_str, "Failed to write to MCP server stdin");
            McpError::Transport(format!("Write failed: {}", e))
        })?;

        stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("Flush failed: {}", e)))
    }

    /// Wait for the reader task to resolve `id`, or give up after the timeout
    async fn wait_for_response(
        &self,
        id: &RequestId,
        rx: oneshot::Receiver<Completion>,
    ) -> Result<Value, McpError> {
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(completion)) => completion,
            // Sender dropped unresolved: the table went away with the reader.
            Ok(Err(_)) => Err(McpError::TransportClosed),
            Err(_) => {
                warn!(
                    id = %id,
                    command = %self.command_str,
                    timeout = ?self.request_timeout,
                    "Timed out waiting for MCP response"
                );
                Err(McpError::Timeout(self.request_timeout))
            }
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id.clone(), method).with_params(params);
        let line = serde_json::to_string(&request)?;

        // Register first: the answer may arrive before send_line returns.
        let rx = self.pending.register(id.clone())?;
        // Leaves the table with this call, even if the caller drops the future.
        let _entry = PendingEntry::new(self.pending.clone(), id.clone());

        self.send_line(&line).await?;
        trace!(id = %id, method = %method, "Awaiting MCP response");

        let message = self.wait_for_response(&id, rx).await?;
        JsonRpcResponse::from_value(message)?.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let mut notification = JsonRpcNotification::new(method);
        if let Some(params) = params {
            notification = notification.with_params(params);
        }
        let line = serde_json::to_string(&notification)?;
        self.send_line(&line).await
    }

    async fn close(&self) -> Result<(), McpError> {
        self.connected.store(false, Ordering::SeqCst);
        debug!(command = %self.command_str, "Closing MCP server connection");

        // EOF on stdin asks a well-behaved server to exit.
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            if let Err(e) = stdin.shutdown().await {
                trace!(error = %e, "Error closing MCP server stdin");
            }
        }

        self.reader.abort();
        self.stderr_drain.abort();

        let failed = self.pending.close();
        if failed > 0 {
            debug!(failed, "Failed in-flight MCP requests on close");
        }

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(command = %self.command_str, exit_code = ?status.code(), "MCP server process exited");
            }
            Ok(Err(e)) => {
                warn!(error = %e, command = %self.command_str, "Error waiting for MCP server process");
            }
            Err(_) => {
                debug!(command = %self.command_str, "Killing MCP server process");
                child.kill().await.map_err(McpError::Io)?;
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.stderr_drain.abort();
        if let Some(child) = self.child.get_mut() {
            // Best-effort: we can't await in drop; kill_on_drop covers the rest.
            let _ = child.start_kill();
        }
    }
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("command", &self.command_str)
            .field("connected", &self.is_connected())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Drain stdout until EOF, resolving pending requests as responses arrive.
///
/// When the stream ends every request still waiting is failed with
/// [`McpError::TransportClosed`].
async fn read_responses(
    stdout: ChildStdout,
    pending: Arc<PendingRequests>,
    connected: Arc<AtomicBool>,
    command: String,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(command = %command, "MCP server closed stdout");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                dispatch_line(&pending, line.trim());
            }
            Err(e) => {
                warn!(error = %e, command = %command, "Failed to read from MCP server stdout");
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    let failed = pending.close();
    if failed > 0 {
        warn!(command = %command, failed, "MCP server went away with requests outstanding");
    }
}

/// Route one stdout line to its waiting caller
fn dispatch_line(pending: &PendingRequests, line: &str) {
    if line.is_empty() {
        return;
    }

    let message: Value = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, line = %line, "Discarding unparsable line from MCP server");
            return;
        }
    };

    // Server-initiated requests and notifications carry a method; their ids
    // live in the server's id space, not ours.
    if let Some(method) = message.get("method").and_then(Value::as_str) {
        trace!(method = %method, "Ignoring server-initiated message");
        return;
    }

    let Some(id) = message.get("id").and_then(RequestId::from_value) else {
        trace!("Ignoring MCP message without a usable id");
        return;
    };

    if !pending.resolve(&id, message) {
        trace!(id = %id, "No pending request for response id");
    }
}

/// Forward the server's stderr to the log so the pipe never fills up
async fn drain_stderr(stderr: ChildStderr, command: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(command = %command, "server stderr: {}", line),
            Ok(None) => break,
            Err(e) => {
                trace!(error = %e, "Stopped reading MCP server stderr");
                break;
            }
        }
    }
}
