//! Stdio transport for the MCP server.
//!
//! Reads JSON-RPC messages from stdin and writes responses to stdout, the
//! standard mode for CLI-based MCP integrations.

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::signal;
use tracing::info;

use crate::error::{GateError, GateResult};
use crate::mcp::GateService;
use crate::tools::GateContext;
use crate::transport::Transport;

pub struct StdioTransport {
    ctx: Arc<GateContext>,
}

impl StdioTransport {
    pub fn new(ctx: Arc<GateContext>) -> Self {
        Self { ctx }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> GateResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = GateService::new(self.ctx.clone());
        let running_service = service.serve(stdio()).await.map_err(|e| {
            GateError::internal(format!("Failed to start stdio transport: {}", e))
        })?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => {
                        info!("Stdio transport completed normally");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Stdio transport error");
                        return Err(GateError::internal(format!(
                            "Stdio transport error: {}",
                            e
                        )));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                tracing::warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Closing database connection pool");
        self.ctx.pool.close().await;

        if shutdown_requested {
            // tokio::select! cannot interrupt blocking stdin reads, so the
            // process must exit explicitly
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
