//! MCP server over line-delimited stdio.
//!
//! Every request runs on its own task so a long poll never holds up other
//! callers. Responses funnel through one writer task. When input closes, all
//! in-flight requests are aborted; a `notifications/cancelled` aborts a single
//! one.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND, PROTOCOL_VERSION, parse_line, text_content,
};
use crate::error::{Error, ProtocolError, Result, ToolError};
use crate::tools::ToolRegistry;

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "mcp-polling-server";

/// MCP server exposing the registered tools.
#[derive(Clone)]
pub struct McpServer {
    name: String,
    version: String,
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tools,
        }
    }

    /// Serve on the process stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, answering on `writer`.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(writer, out_rx));

        let mut lines = BufReader::new(reader).lines();
        let mut in_flight = InFlight::default();
        let mut read_error = None;

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        self.accept(line, &out_tx, &mut in_flight);
                    }
                    Ok(None) => {
                        info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading input: {}", e);
                        read_error = Some(e);
                        break;
                    }
                },
                Some(done) = in_flight.tasks.join_next(), if !in_flight.tasks.is_empty() => {
                    if let Ok((key, seq)) = done {
                        in_flight.finished(&key, seq);
                    }
                }
            }
        }

        if !in_flight.tasks.is_empty() {
            info!(count = in_flight.tasks.len(), "Aborting in-flight requests");
        }
        in_flight.tasks.shutdown().await;
        drop(out_tx);

        match writer_task.await {
            Ok(result) => result?,
            Err(e) => error!("Response writer task failed: {}", e),
        }

        match read_error {
            Some(e) => Err(ProtocolError::Io(e).into()),
            None => Ok(()),
        }
    }

    /// Route one input line: reply to garbage, apply notifications inline,
    /// spawn requests.
    fn accept(
        &self,
        line: &str,
        out_tx: &mpsc::UnboundedSender<JsonRpcResponse>,
        in_flight: &mut InFlight,
    ) {
        let request = match parse_line(line) {
            Ok(request) => request,
            Err(response) => {
                warn!("Rejected malformed input");
                let _ = out_tx.send(response);
                return;
            }
        };

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request, in_flight);
            return;
        };

        let key = id.to_string();
        if in_flight.is_running(&key) {
            warn!(request_id = %key, "Rejected request reusing an in-flight id");
            let _ = out_tx.send(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                format!("Request id {key} is already in flight"),
            ));
            return;
        }

        let seq = in_flight.next_seq();
        let server = self.clone();
        let tx = out_tx.clone();
        let task_key = key.clone();
        let abort = in_flight.tasks.spawn(async move {
            let response = server.respond(id, request).await;
            if tx.send(response).is_err() {
                debug!("Response dropped, writer closed");
            }
            (task_key, seq)
        });
        in_flight.handles.insert(key, (seq, abort));
    }

    fn handle_notification(&self, request: &JsonRpcRequest, in_flight: &mut InFlight) {
        match request.method.as_str() {
            "notifications/cancelled" => {
                let Some(request_id) = request.params.get("requestId") else {
                    warn!("Cancellation without requestId");
                    return;
                };
                let key = request_id.to_string();
                if let Some((_, handle)) = in_flight.handles.remove(&key) {
                    handle.abort();
                    let reason = request
                        .params
                        .get("reason")
                        .and_then(|r| r.as_str())
                        .unwrap_or("unspecified");
                    info!(request_id = %key, reason, "Request cancelled by client");
                } else {
                    debug!(request_id = %key, "Cancellation for unknown or finished request");
                }
            }
            "notifications/initialized" => debug!("Client initialized"),
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    /// Produce the response for a request, converting panics into an
    /// internal error.
    async fn respond(&self, id: Value, request: JsonRpcRequest) -> JsonRpcResponse {
        let method = request.method.clone();
        match AssertUnwindSafe(self.handle_request(id.clone(), request))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(_) => {
                error!(method = %method, "Request handler panicked");
                JsonRpcResponse::failure(
                    id,
                    INTERNAL_ERROR,
                    format!("Internal error while handling {method}"),
                )
            }
        }
    }

    async fn handle_request(&self, id: Value, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result(&request.params)),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let tools = self.tools.tool_definitions().await;
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            "tools/call" => self.handle_tools_call(id, &request.params).await,
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        }
    }

    fn initialize_result(&self, params: &Value) -> Value {
        let protocol_version = params
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.name,
                "version": self.version
            }
        })
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, "Missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        debug!(tool = %name, "Tool call");

        match self.tools.call(name, arguments).await {
            Ok(output) => JsonRpcResponse::success(id, text_content(&output.result, false)),
            Err(Error::Dispatch(e)) => {
                warn!(tool = %name, error = %e, "Unknown tool requested");
                JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string())
            }
            Err(Error::Tool(e @ ToolError::InvalidParameters { .. })) => {
                JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string())
            }
            Err(Error::Tool(e @ ToolError::ExecutionFailed { .. })) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                JsonRpcResponse::success(id, text_content(&json!({ "error": e.to_string() }), true))
            }
            Err(e) => {
                error!(tool = %name, error = %e, "Tool call failed");
                JsonRpcResponse::failure(id, INTERNAL_ERROR, e.to_string())
            }
        }
    }
}

/// Requests currently running, keyed by their JSON-RPC id.
///
/// Each spawn gets a sequence number so a finished request never evicts a
/// newer one that reused its id.
#[derive(Default)]
struct InFlight {
    tasks: JoinSet<(String, u64)>,
    handles: HashMap<String, (u64, AbortHandle)>,
    seq: u64,
}

impl InFlight {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn is_running(&self, key: &str) -> bool {
        self.handles
            .get(key)
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    fn finished(&mut self, key: &str, seq: u64) {
        if self.handles.get(key).is_some_and(|(current, _)| *current == seq) {
            self.handles.remove(key);
        }
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> std::result::Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
