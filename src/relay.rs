// Jaskier Shared Pattern -- mcp/client
//! Relay dispatcher: one local invocation in, one HTTP POST out.
//!
//! Every catalog entry funnels through [`RelayDispatcher::relay`]. It wraps
//! the caller's arguments in a JSON-RPC 2.0 envelope (with the configured
//! credential injected), posts it to the Apps Script Web App, and sniffs the
//! reply into one of three [`RelayResult`] shapes. It never returns an
//! error: failures come back as results with `isError: true`.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::catalog::RpcMethod;
use crate::config::RelayConfig;

pub const JSONRPC_VERSION: &str = "2.0";
/// Each relay is a single synchronous round trip, so the id never varies.
pub const RELAY_REQUEST_ID: u64 = 1;
/// Argument key carrying the injected credential.
pub const CREDENTIAL_FIELD: &str = "apiKey";

/// Longest slice of an error body echoed back to the caller.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("arguments must be a JSON object (got {0})")]
    InvalidArguments(&'static str),

    #[error("request to Apps Script endpoint failed")]
    Send(#[source] reqwest::Error),

    #[error("failed to read Apps Script response body")]
    Body(#[source] reqwest::Error),
}

// ── Envelope ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayEnvelope {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: RpcMethod,
    pub params: RelayParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayParams {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Build the outbound envelope. The credential is written last so a caller
/// supplying its own `apiKey` cannot override it.
pub fn build_envelope(
    operation: &str,
    method: RpcMethod,
    arguments: Value,
    api_key: &str,
) -> Result<RelayEnvelope, RelayError> {
    let mut merged = match arguments {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(RelayError::InvalidArguments(json_kind(&other))),
    };
    merged.insert(CREDENTIAL_FIELD.to_string(), Value::String(api_key.to_string()));

    Ok(RelayEnvelope {
        jsonrpc: JSONRPC_VERSION,
        id: RELAY_REQUEST_ID,
        method,
        params: RelayParams {
            name: operation.to_string(),
            arguments: merged,
        },
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Normalized outcome of one relay. Exactly one per invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayResult {
    /// `{content, isError, ..}` from the remote, passed through untouched.
    Tool(Value),
    /// `{messages, ..}` from the remote, passed through untouched.
    Prompt(Value),
    /// Anything else, wrapped as a single text content block.
    Text { text: String, is_error: bool },
}

impl RelayResult {
    pub fn text(text: impl Into<String>) -> Self {
        RelayResult::Text { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        RelayResult::Text { text: text.into(), is_error: true }
    }

    pub fn is_error(&self) -> bool {
        match self {
            RelayResult::Tool(v) => v.get("isError").and_then(Value::as_bool).unwrap_or(false),
            RelayResult::Prompt(_) => false,
            RelayResult::Text { is_error, .. } => *is_error,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            RelayResult::Tool(v) | RelayResult::Prompt(v) => v,
            RelayResult::Text { text, is_error } => json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error,
            }),
        }
    }
}

impl Serialize for RelayResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().into_value().serialize(serializer)
    }
}

/// Sniff a remote response into a [`RelayResult`].
///
/// Priority is fixed: tool shape (`result.content` plus an explicit
/// `result.isError`), then prompt shape (`result.messages`), then an error
/// for non-success statuses, then the raw body as text.
pub fn classify(status: StatusCode, body: &str) -> RelayResult {
    if let Ok(Value::Object(mut root)) = serde_json::from_str::<Value>(body) {
        if let Some(result) = root.remove("result") {
            if result.get("content").is_some() && result.get("isError").is_some() {
                return RelayResult::Tool(result);
            }
            if result.get("messages").is_some() {
                return RelayResult::Prompt(result);
            }
        }
    }

    if !status.is_success() {
        let detail = body.trim();
        return if detail.is_empty() {
            RelayResult::error(format!("Apps Script returned HTTP {}", status))
        } else {
            RelayResult::error(format!(
                "Apps Script returned HTTP {}: {}",
                status,
                truncate_str(detail, MAX_ERROR_BODY)
            ))
        };
    }

    RelayResult::text(body)
}

// ── Dispatcher ──────────────────────────────────────────────────────────────

/// Stateless apart from the immutable config and a pooled HTTP client, so
/// clones are cheap and concurrent relays never contend.
#[derive(Clone)]
pub struct RelayDispatcher {
    client: Client,
    config: Arc<RelayConfig>,
}

impl RelayDispatcher {
    pub fn new(config: Arc<RelayConfig>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(10)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, config))
    }

    pub fn with_client(client: Client, config: Arc<RelayConfig>) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relay one invocation. Never fails; see [`RelayResult`].
    pub async fn relay(&self, operation: &str, method: RpcMethod, arguments: Value) -> RelayResult {
        match self.try_relay(operation, method, arguments).await {
            Ok(result) => {
                if result.is_error() {
                    tracing::debug!(operation = %operation, "relay: remote reported an error");
                }
                result
            }
            Err(e) => {
                // `{:#}` renders the whole source chain on one line.
                let diagnostic = format!("{:#}", anyhow::Error::new(e));
                tracing::warn!(operation = %operation, "relay failed: {}", diagnostic);
                RelayResult::error(diagnostic)
            }
        }
    }

    async fn try_relay(
        &self,
        operation: &str,
        method: RpcMethod,
        arguments: Value,
    ) -> Result<RelayResult, RelayError> {
        let envelope = build_envelope(operation, method, arguments, &self.config.api_key)?;

        tracing::debug!(
            operation = %operation,
            method = method.as_str(),
            endpoint = %self.config.endpoint_display(),
            "relay: POST"
        );

        // reqwest errors embed the URL, which carries the access key.
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| RelayError::Send(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Body(e.without_url()))?;

        Ok(classify(status, &body))
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_len);
        format!("{}...", &s[..boundary])
    }
}
