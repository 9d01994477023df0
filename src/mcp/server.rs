// Jaskier Shared Pattern -- mcp/server
//! MCP server: exposes the Workspace catalog as MCP tools and prompts.
//!
//! Transport-agnostic: stdio and HTTP both hand decoded JSON-RPC messages to
//! [`McpServer::handle_message`] and write back whatever it returns.
//!
//! Supported methods:
//! - `initialize`: server info + capabilities
//! - `notifications/initialized`: client ack (no-op)
//! - `ping`: health check
//! - `tools/list` / `prompts/list`: the static catalog
//! - `tools/call` / `prompts/get`: relayed to Apps Script

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::relay::RelayDispatcher;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "gworkspace-mcp-relay";

// JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Largest inbound JSON-RPC message accepted on either transport.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct McpServer {
    catalog: Arc<Catalog>,
    relay: RelayDispatcher,
}

impl McpServer {
    pub fn new(catalog: Arc<Catalog>, relay: RelayDispatcher) -> Self {
        Self { catalog, relay }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn relay(&self) -> &RelayDispatcher {
        &self.relay
    }

    /// Decode one raw frame and handle it. Parse failures become `-32700`.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::debug!("MCP server: unparseable frame: {}", e);
                Some(json_rpc_error(Value::Null, PARSE_ERROR, "Parse error"))
            }
        }
    }

    /// Handle a single request, notification or batch.
    ///
    /// Returns `None` when nothing should be written back (notifications, or
    /// a batch made only of notifications).
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        match message {
            Value::Array(batch) if batch.is_empty() => {
                Some(json_rpc_error(Value::Null, INVALID_REQUEST, "Empty batch"))
            }
            Value::Array(batch) => {
                let responses: Vec<Value> = join_all(batch.into_iter().map(|m| self.handle_single(m)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect();
                if responses.is_empty() {
                    None
                } else {
                    Some(Value::Array(responses))
                }
            }
            single => self.handle_single(single).await,
        }
    }

    async fn handle_single(&self, request: Value) -> Option<Value> {
        let Some(method) = request.get("method").and_then(|m| m.as_str()) else {
            let id = request.get("id").cloned().unwrap_or(Value::Null);
            return Some(json_rpc_error(id, INVALID_REQUEST, "Invalid Request"));
        };

        // A message without `id` is a notification: never answered.
        let Some(id) = request.get("id").cloned() else {
            tracing::debug!(method = %method, "MCP server: notification");
            return None;
        };

        tracing::debug!(method = %method, "MCP server: incoming request");

        let response = match method {
            "initialize" => handle_initialize(&id, &self.catalog),
            "ping" => json_rpc_result(&id, json!({})),
            "tools/list" => json_rpc_result(&id, json!({ "tools": self.catalog.tool_list() })),
            "prompts/list" => json_rpc_result(&id, json!({ "prompts": self.catalog.prompt_list() })),
            "tools/call" => self.handle_tools_call(&request, &id).await,
            "prompts/get" => self.handle_prompts_get(&request, &id).await,
            _ => json_rpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {}", method)),
        };
        Some(response)
    }

    // ── tools/call ──────────────────────────────────────────────────────────

    async fn handle_tools_call(&self, request: &Value, id: &Value) -> Value {
        let (name, arguments) = match call_params(request) {
            Ok(p) => p,
            Err(msg) => return json_rpc_error(id.clone(), INVALID_PARAMS, msg),
        };

        let Some(tool) = self.catalog.tool(name) else {
            return json_rpc_error(id.clone(), INVALID_PARAMS, &format!("Unknown tool: {}", name));
        };

        tracing::info!(tool = %name, "MCP server: tools/call");

        let result = self
            .relay
            .relay(&tool.binding.remote_name, tool.binding.method, arguments)
            .await;
        json_rpc_result(id, result.into_value())
    }

    // ── prompts/get ─────────────────────────────────────────────────────────

    async fn handle_prompts_get(&self, request: &Value, id: &Value) -> Value {
        let (name, arguments) = match call_params(request) {
            Ok(p) => p,
            Err(msg) => return json_rpc_error(id.clone(), INVALID_PARAMS, msg),
        };

        let Some(prompt) = self.catalog.prompt(name) else {
            return json_rpc_error(id.clone(), INVALID_PARAMS, &format!("Unknown prompt: {}", name));
        };

        tracing::info!(prompt = %name, "MCP server: prompts/get");

        let result = self
            .relay
            .relay(&prompt.binding.remote_name, prompt.binding.method, arguments)
            .await;
        json_rpc_result(id, result.into_value())
    }
}

/// Pull `(name, arguments)` out of `params`. Missing arguments become `{}`.
fn call_params(request: &Value) -> Result<(&str, Value), &'static str> {
    let name = request
        .pointer("/params/name")
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .ok_or("Missing 'name' in params")?;
    let arguments = request
        .pointer("/params/arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));
    Ok((name, arguments))
}

// ── initialize ──────────────────────────────────────────────────────────────

fn handle_initialize(id: &Value, catalog: &Catalog) -> Value {
    json_rpc_result(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": format!(
                "Google Workspace relay: {} tools and {} prompts for Docs, Sheets, Slides, Drive, Gmail, Calendar, Classroom, People, Maps and Analytics.",
                catalog.tools().len(),
                catalog.prompts().len()
            )
        }),
    )
}

// ── JSON-RPC helpers ────────────────────────────────────────────────────────

pub fn json_rpc_result(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn json_rpc_error(id: Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}
