// Jaskier Shared Pattern -- state
// gworkspace-mcp-relay - Application state

use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{Catalog, CatalogError};
use crate::config::RelayConfig;
use crate::mcp::server::McpServer;
use crate::relay::RelayDispatcher;

/// Anything that stops the process before it can serve.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// Central application state. Clone-friendly; everything inside is Arc'd.
#[derive(Clone)]
pub struct AppState {
    pub server: McpServer,
    pub start_time: Instant,
}

impl AppState {
    /// Load the catalog and build the dispatcher. The config is frozen here.
    pub fn new(config: RelayConfig) -> Result<Self, StartupError> {
        let catalog = Catalog::load(config.catalog_path.as_deref())?;
        let config = Arc::new(config);
        let relay = RelayDispatcher::new(config.clone()).map_err(StartupError::HttpClient)?;

        tracing::info!(
            "AppState initialised: {} tools, {} prompts, endpoint {}",
            catalog.tools().len(),
            catalog.prompts().len(),
            config.endpoint_display()
        );

        Ok(Self::with_server(McpServer::new(Arc::new(catalog), relay)))
    }

    pub fn with_server(server: McpServer) -> Self {
        Self {
            server,
            start_time: Instant::now(),
        }
    }
}
