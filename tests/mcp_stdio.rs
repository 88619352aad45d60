//! Integration tests for the MCP stdio transport.
//!
//! Each test runs the server over an in-memory duplex pipe and speaks
//! newline-delimited JSON-RPC to it, exercising the real request contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use mcp_polling_server::config::{ServerConfig, ServerMode};
use mcp_polling_server::dispatch::{Dispatcher, PromptPool, TaskStatus, WorkerStatus};
use mcp_polling_server::error;
use mcp_polling_server::mcp::McpServer;
use mcp_polling_server::tools::ToolRegistry;

/// Maximum time any single read is allowed before we consider the test hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    server: JoinHandle<error::Result<()>>,
    dispatcher: Arc<Dispatcher>,
}

impl Client {
    async fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) {
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;
    }

    async fn call_tool(&mut self, id: u64, name: &str, arguments: Value) {
        self.request(id, "tools/call", json!({ "name": name, "arguments": arguments }))
            .await;
    }

    async fn recv(&mut self) -> Value {
        let line = timeout(TEST_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a response")
            .unwrap()
            .expect("server closed the stream");
        serde_json::from_str(&line).unwrap()
    }

    async fn close(mut self) -> error::Result<()> {
        self.writer.shutdown().await.unwrap();
        timeout(TEST_TIMEOUT, self.server)
            .await
            .expect("server did not stop after input closed")
            .unwrap()
    }
}

/// Decode the JSON payload inside a tools/call text result.
fn tool_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("not a tool result: {response}"));
    serde_json::from_str(text).unwrap()
}

fn start(mode: ServerMode, timeout_ms: u64) -> Client {
    let config = ServerConfig {
        mode,
        timeout: Duration::from_millis(timeout_ms),
        poll_interval: Duration::from_millis(25),
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(config, PromptPool::default());
    let tools = Arc::new(ToolRegistry::new());
    match mode {
        ServerMode::Tasks => tools.register_worker_tools(Arc::clone(&dispatcher)),
        ServerMode::Jobs => tools.register_job_tools(Arc::clone(&dispatcher)),
    }

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let server = McpServer::new(tools);
    let server = tokio::spawn(async move { server.serve(server_read, server_write).await });

    let (client_read, writer) = tokio::io::split(client_io);
    Client {
        lines: BufReader::new(client_read).lines(),
        writer,
        server,
        dispatcher,
    }
}

#[tokio::test]
async fn initialize_and_list_worker_tools() {
    let mut client = start(ServerMode::Tasks, 1_000);

    client
        .request(1, "initialize", json!({ "protocolVersion": "2024-11-05", "capabilities": {} }))
        .await;
    let init = client.recv().await;
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "mcp-polling-server");

    client
        .send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .await;

    client.request(2, "tools/list", json!({})).await;
    let list = client.recv().await;
    assert_eq!(list["id"], 2);
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["worker_create", "worker_poll", "worker_submit"]);
    assert_eq!(
        list["result"]["tools"][1]["inputSchema"]["required"],
        json!(["workerId"])
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn worker_round_trip() {
    let mut client = start(ServerMode::Tasks, 2_000);

    client.call_tool(1, "worker_create", json!({})).await;
    let created = tool_payload(&client.recv().await);
    let worker_id = created["workerId"].as_str().unwrap().to_string();

    let task_id = client.dispatcher.enqueue_task("2+2?").await;

    client
        .call_tool(2, "worker_poll", json!({ "workerId": worker_id }))
        .await;
    let polled = tool_payload(&client.recv().await);
    assert_eq!(polled["taskId"], task_id.as_str());
    assert_eq!(polled["prompt"], "2+2?");
    assert!(polled["instructions"].as_str().unwrap().contains("worker_submit"));

    client
        .call_tool(
            3,
            "worker_submit",
            json!({ "workerId": worker_id, "taskId": task_id, "response": "4" }),
        )
        .await;
    let submitted = tool_payload(&client.recv().await);
    assert!(submitted["instructions"].as_str().unwrap().contains("worker_poll"));

    let task = client.dispatcher.task(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.response.as_deref(), Some("4"));
    let worker = client.dispatcher.worker(&worker_id).await.unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);

    client.close().await.unwrap();
}

#[tokio::test]
async fn long_poll_does_not_block_other_requests() {
    let mut client = start(ServerMode::Tasks, 3_000);

    client.call_tool(1, "worker_create", json!({})).await;
    let worker_id = tool_payload(&client.recv().await)["workerId"]
        .as_str()
        .unwrap()
        .to_string();

    client
        .call_tool(2, "worker_poll", json!({ "workerId": worker_id }))
        .await;

    let start = Instant::now();
    client.request(3, "ping", json!({})).await;
    let pong = client.recv().await;
    assert_eq!(pong["id"], 3);
    assert!(start.elapsed() < Duration::from_secs(1));

    // The waiting poll picks up work produced while it waits.
    let task_id = client.dispatcher.enqueue_task("late arrival").await;
    let polled = client.recv().await;
    assert_eq!(polled["id"], 2);
    assert_eq!(tool_payload(&polled)["taskId"], task_id.as_str());

    client.close().await.unwrap();
}

#[tokio::test]
async fn idle_poll_returns_after_timeout() {
    let mut client = start(ServerMode::Tasks, 400);

    client.call_tool(1, "worker_create", json!({})).await;
    let worker_id = tool_payload(&client.recv().await)["workerId"]
        .as_str()
        .unwrap()
        .to_string();

    let start = Instant::now();
    client
        .call_tool(2, "worker_poll", json!({ "workerId": worker_id }))
        .await;
    let idle = tool_payload(&client.recv().await);
    let waited = start.elapsed();

    assert!(idle.get("taskId").is_none());
    assert_eq!(idle["workerId"], worker_id.as_str());
    assert!(waited >= Duration::from_millis(380), "returned early: {waited:?}");
    assert!(waited < Duration::from_secs(2), "returned late: {waited:?}");

    client.close().await.unwrap();
}

#[tokio::test]
async fn not_found_is_a_payload_not_a_fault() {
    let mut client = start(ServerMode::Tasks, 1_000);

    client
        .call_tool(1, "worker_poll", json!({ "workerId": "ghost" }))
        .await;
    let response = client.recv().await;
    assert!(response.get("error").is_none());
    assert_eq!(
        tool_payload(&response)["error"],
        "Worker with ID ghost not found."
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn protocol_errors() {
    let mut client = start(ServerMode::Tasks, 1_000);

    client.call_tool(1, "job_create", json!({})).await;
    let unknown_tool = client.recv().await;
    assert_eq!(unknown_tool["error"]["code"], -32602);
    assert_eq!(unknown_tool["error"]["message"], "Unknown tool: job_create");

    client.request(2, "prompts/list", json!({})).await;
    assert_eq!(client.recv().await["error"]["code"], -32601);

    client.call_tool(3, "worker_poll", json!({})).await;
    assert_eq!(client.recv().await["error"]["code"], -32602);

    client.writer.write_all(b"{this is not json\n").await.unwrap();
    let parse = client.recv().await;
    assert_eq!(parse["error"]["code"], -32700);
    assert_eq!(parse["id"], Value::Null);

    // The session survives all of the above.
    client.request(4, "ping", json!({})).await;
    assert_eq!(client.recv().await["id"], 4);

    client.close().await.unwrap();
}

#[tokio::test]
async fn cancelled_poll_sends_no_response() {
    let mut client = start(ServerMode::Tasks, 10_000);

    client.call_tool(1, "worker_create", json!({})).await;
    let worker_id = tool_payload(&client.recv().await)["workerId"]
        .as_str()
        .unwrap()
        .to_string();

    client
        .call_tool(2, "worker_poll", json!({ "workerId": worker_id }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client
        .send(json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": { "requestId": 2, "reason": "user aborted" }
        }))
        .await;

    // A task enqueued after cancellation stays queued for the next poller.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let task_id = client.dispatcher.enqueue_task("unclaimed").await;

    client.request(3, "ping", json!({})).await;
    assert_eq!(client.recv().await["id"], 3);

    assert_eq!(client.dispatcher.pending_count().await, 1);
    let task = client.dispatcher.task(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    let worker = client.dispatcher.worker(&worker_id).await.unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);

    client.close().await.unwrap();
}

#[tokio::test]
async fn reused_in_flight_id_is_rejected() {
    let mut client = start(ServerMode::Tasks, 10_000);

    client.call_tool(1, "worker_create", json!({})).await;
    let worker_id = tool_payload(&client.recv().await)["workerId"]
        .as_str()
        .unwrap()
        .to_string();

    client
        .call_tool(2, "worker_poll", json!({ "workerId": worker_id }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client
        .call_tool(2, "worker_poll", json!({ "workerId": worker_id }))
        .await;

    let rejected = client.recv().await;
    assert_eq!(rejected["id"], 2);
    assert_eq!(rejected["error"]["code"], -32600);

    // The original request is still the one a cancellation reaches.
    client
        .send(json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": { "requestId": 2 }
        }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.dispatcher.enqueue_task("unclaimed").await;

    client.request(3, "ping", json!({})).await;
    assert_eq!(client.recv().await["id"], 3);
    assert_eq!(client.dispatcher.pending_count().await, 1);

    // Once a request has answered, its id is free again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.request(3, "ping", json!({})).await;
    let again = client.recv().await;
    assert_eq!(again["id"], 3);
    assert!(again.get("error").is_none());

    client.close().await.unwrap();
}

#[tokio::test]
async fn closing_input_aborts_waiting_polls() {
    let mut client = start(ServerMode::Tasks, 30_000);

    client.call_tool(1, "worker_create", json!({})).await;
    let worker_id = tool_payload(&client.recv().await)["workerId"]
        .as_str()
        .unwrap()
        .to_string();
    client
        .call_tool(2, "worker_poll", json!({ "workerId": worker_id }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let dispatcher = Arc::clone(&client.dispatcher);
    let start = Instant::now();
    client.close().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));

    let worker = dispatcher.worker(&worker_id).await.unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
}

#[tokio::test]
async fn job_mode_reports_running() {
    let mut client = start(ServerMode::Jobs, 300);

    client.request(1, "tools/list", json!({})).await;
    let list = client.recv().await;
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["job_create", "job_status"]);

    client.call_tool(2, "job_create", json!({})).await;
    let created = tool_payload(&client.recv().await);
    assert_eq!(created["status"], "running");
    let job_id = created["id"].as_str().unwrap().to_string();

    let start = Instant::now();
    client.call_tool(3, "job_status", json!({ "id": job_id })).await;
    let status = tool_payload(&client.recv().await);
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(status["status"], "running");
    assert_eq!(status["id"], job_id.as_str());

    client.call_tool(4, "job_status", json!({ "id": "job_missing" })).await;
    assert_eq!(
        tool_payload(&client.recv().await)["error"],
        "Job with ID job_missing not found."
    );

    client.close().await.unwrap();
}
