//! Google Workspace MCP relay.
//!
//! Serves a static catalog of Workspace tools and prompts over MCP and
//! forwards every invocation to a Google Apps Script Web App, which does
//! the actual API work.

pub mod catalog;
pub mod config;
pub mod mcp;
pub mod relay;
pub mod state;

pub use catalog::{Catalog, RpcMethod};
pub use config::RelayConfig;
pub use relay::{RelayDispatcher, RelayResult};
pub use state::AppState;
