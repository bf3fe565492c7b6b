//! MCP (Model Context Protocol) client for browser automation
//!
//! Talks JSON-RPC over stdio to a playwright-mcp server process, which is
//! spawned on first use and kept alive for the lifetime of the client.

use crate::PreviewError;
use jsonrpc_core::{Id, MethodCall, Notification, Output, Params, Value, Version};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

const SERVICE: &str = "MCP";

fn mcp_error(message: impl Into<String>) -> PreviewError {
    PreviewError::ExternalServiceError {
        service: SERVICE.to_string(),
        message: message.into(),
    }
}

/// Tracker and ad origins the browser refuses to contact.
pub const DEFAULT_BLOCKED_ORIGINS: &[&str] = &[
    "https://www.google-analytics.com",
    "https://www.googletagmanager.com",
    "https://stats.g.doubleclick.net",
    "https://securepubads.g.doubleclick.net",
    "https://connect.facebook.net",
    "https://bat.bing.com",
    "https://analytics.twitter.com",
    "https://snap.licdn.com",
    "https://static.hotjar.com",
    "https://cdn.segment.com",
];

/// MCP client configuration
#[derive(Clone, Debug)]
pub struct McpConfig {
    /// Command to start the MCP server
    pub server_command: Vec<String>,
    /// Upper bound for a single JSON-RPC round trip
    pub request_timeout: Duration,
    /// Browser user agent; `None` keeps the browser's own
    pub user_agent: Option<String>,
    /// Origins the browser may not request
    pub blocked_origins: Vec<String>,
    pub headless: bool,
    /// In-memory profile, nothing persists between sessions
    pub isolated: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_command: vec![
                "npx".to_string(),
                "-y".to_string(),
                "@playwright/mcp@latest".to_string(),
            ],
            request_timeout: Duration::from_secs(30),
            user_agent: None,
            blocked_origins: DEFAULT_BLOCKED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
            headless: true,
            isolated: true,
        }
    }
}

impl McpConfig {
    /// Splits a command line on whitespace.
    pub fn with_command_line(mut self, command: &str) -> Self {
        self.server_command = command.split_whitespace().map(String::from).collect();
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_blocked_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Server command followed by the browser flags playwright-mcp accepts.
    pub fn command_line(&self) -> Vec<String> {
        let mut command = self.server_command.clone();
        if self.headless {
            command.push("--headless".to_string());
        }
        if self.isolated {
            command.push("--isolated".to_string());
        }
        if let Some(user_agent) = &self.user_agent {
            command.push("--user-agent".to_string());
            command.push(user_agent.clone());
        }
        if !self.blocked_origins.is_empty() {
            command.push("--blocked-origins".to_string());
            command.push(self.blocked_origins.join(";"));
        }
        command
    }
}

struct McpSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl McpSession {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    async fn write_line(&mut self, line: &str) -> Result<(), PreviewError> {
        debug!("Sending MCP message: {}", line);
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| mcp_error(format!("Failed to write to stdin: {e}")))?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(|e| mcp_error(format!("Failed to write newline: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| mcp_error(format!("Failed to flush stdin: {e}")))
    }

    async fn notify(&mut self, method: &str) -> Result<(), PreviewError> {
        let notification = Notification {
            jsonrpc: Some(Version::V2),
            method: method.to_string(),
            params: Params::Map(Default::default()),
        };
        let line = serde_json::to_string(&notification)
            .map_err(|e| mcp_error(format!("Failed to serialize notification: {e}")))?;
        self.write_line(&line).await
    }

    /// Sends a request and reads lines until the matching response arrives.
    /// Server notifications and unrelated lines are skipped.
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, PreviewError> {
        let id = Id::Num(self.next_id());
        let params = match params {
            Value::Object(map) => Params::Map(map),
            Value::Null => Params::None,
            other => Params::Array(vec![other]),
        };
        let call = MethodCall {
            jsonrpc: Some(Version::V2),
            method: method.to_string(),
            params,
            id: id.clone(),
        };
        let line = serde_json::to_string(&call)
            .map_err(|e| mcp_error(format!("Failed to serialize request: {e}")))?;
        self.write_line(&line).await?;

        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| mcp_error(format!("Failed to read from stdout: {e}")))?;
            if n == 0 {
                return Err(mcp_error("MCP server closed connection"));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(output) = serde_json::from_str::<Output>(trimmed) else {
                debug!("Skipping MCP message: {}", trimmed);
                continue;
            };
            match output {
                Output::Success(success) if success.id == id => return Ok(success.result),
                Output::Failure(failure) if failure.id == id => {
                    return Err(mcp_error(failure.error.message))
                }
                _ => debug!("Skipping MCP response for another request"),
            }
        }
    }
}

/// MCP client for browser automation
pub struct McpClient {
    config: McpConfig,
    session: Mutex<Option<McpSession>>,
}

impl McpClient {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    /// Starts the MCP server unless it is already running.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), PreviewError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn().await?);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), PreviewError> {
        if let Some(mut session) = self.session.lock().await.take() {
            debug!("Stopping MCP server");
            session
                .child
                .kill()
                .await
                .map_err(|e| mcp_error(format!("Failed to stop MCP server: {e}")))?;
        }
        Ok(())
    }

    async fn spawn(&self) -> Result<McpSession, PreviewError> {
        if self.config.server_command.is_empty() {
            return Err(PreviewError::ConfigError("empty MCP server command".to_string()));
        }
        let command = self.config.command_line();
        let (program, args) = command
            .split_first()
            .ok_or_else(|| PreviewError::ConfigError("empty MCP server command".to_string()))?;
        debug!("Starting MCP server with command: {:?}", command);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| mcp_error(format!("Failed to start MCP server: {e}")))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("MCP stderr: {}", line.trim());
                }
            });
        }

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| mcp_error("No stdin available"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| mcp_error("No stdout available"))?;

        let mut session = McpSession {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        };

        let init = session.request(
            "initialize",
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        );
        timeout(self.config.request_timeout, init)
            .await
            .map_err(|_| mcp_error("MCP server did not answer initialize"))??;
        session.notify("notifications/initialized").await?;

        debug!("MCP server ready");
        Ok(session)
    }

    /// Calls a tool, starting the server first if needed. A tool result
    /// flagged `isError` is returned as an error.
    #[instrument(level = "debug", skip(self, arguments))]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, PreviewError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn().await?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(mcp_error("MCP server not started"));
        };

        let call = session.request(
            "tools/call",
            serde_json::json!({ "name": name, "arguments": arguments }),
        );
        let result = match timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                // The reply may still arrive later; drop the session so the
                // next call cannot read it as its own.
                warn!(tool = name, "MCP call timed out, restarting server on next use");
                guard.take();
                return Err(PreviewError::TimeoutError(format!(
                    "MCP tool {name} exceeded {}s",
                    self.config.request_timeout.as_secs()
                )));
            }
        };
        if result.is_err() {
            guard.take();
        }
        let result = result?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(PreviewError::RenderError(format!(
                "{name}: {}",
                tool_text(&result).unwrap_or("tool reported an error")
            )));
        }
        Ok(result)
    }

    pub async fn navigate(&self, url: &str) -> Result<(), PreviewError> {
        self.call_tool("browser_navigate", serde_json::json!({ "url": url }))
            .await
            .map(drop)
    }

    pub async fn wait_for(&self, duration: Duration) -> Result<(), PreviewError> {
        self.call_tool(
            "browser_wait_for",
            serde_json::json!({ "time": duration.as_secs_f64() }),
        )
        .await
        .map(drop)
    }

    /// Evaluates a JavaScript function in the page and returns its result.
    pub async fn evaluate(&self, script: &str) -> Result<Value, PreviewError> {
        let result = self
            .call_tool("browser_evaluate", serde_json::json!({ "function": script }))
            .await?;
        Ok(match tool_text(&result) {
            Some(text) => parse_evaluate_text(text),
            None => result,
        })
    }

    pub async fn page_html(&self) -> Result<String, PreviewError> {
        match self
            .evaluate("() => document.documentElement.outerHTML")
            .await?
        {
            Value::String(html) => Ok(html),
            other => Err(PreviewError::RenderError(format!(
                "unexpected page HTML result: {}",
                crate::utils::truncate_str(&other.to_string(), 80)
            ))),
        }
    }
}

/// First text block of a tool result.
fn tool_text(result: &Value) -> Option<&str> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
}

/// Evaluate output is either bare JSON or a markdown report whose
/// `### Result` section holds the JSON value.
fn parse_evaluate_text(text: &str) -> Value {
    let body = match text.split_once("### Result") {
        Some((_, rest)) => rest.split("\n###").next().unwrap_or(rest),
        None => text,
    };
    let body = body.trim();
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
