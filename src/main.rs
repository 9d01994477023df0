use anyhow::Context;

use gworkspace_mcp_relay::config::{RelayConfig, Transport};
use gworkspace_mcp_relay::mcp;
use gworkspace_mcp_relay::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("startup: {}", e);
            return Err(e).context("invalid relay configuration");
        }
    };
    let transport = config.transport;
    let state = AppState::new(config).context("failed to initialise relay")?;

    match transport {
        Transport::Stdio => {
            tracing::info!("gworkspace-mcp-relay serving MCP on stdio");
            mcp::stdio::serve(state.server.clone(), tokio::io::stdin(), tokio::io::stdout())
                .await
                .context("stdio transport failed")?;
        }
        Transport::Http { port } => {
            let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
            tracing::info!("gworkspace-mcp-relay listening on http://{}/mcp", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, mcp::http::router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

/// Logs go to stderr: on the stdio transport stdout is the protocol channel.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
