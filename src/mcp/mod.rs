// Jaskier Shared Pattern -- mcp
//! MCP (Model Context Protocol) surface of the relay.
//!
//! **Server** (`server`): JSON-RPC 2.0 method router over the catalog.
//! `tools/call` and `prompts/get` are forwarded through the relay.
//!
//! **Transports**: `stdio` (newline-delimited frames, the default) and
//! `http` (`POST /mcp`, optional).
//!
//! Protocol revision: <https://spec.modelcontextprotocol.io/2024-11-05/>

pub mod http;
pub mod server;
pub mod stdio;
