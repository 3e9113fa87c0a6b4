//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::authn::AccessTokenProvider;
use crate::errors::ForgeError;
use crate::http::{GitHubClient, GitHubGateway};
use crate::server::{serve, ServerState};
use crate::services::WorkflowService;
use crate::template::WorkflowRenderer;

/// Build the service from `options`
pub fn init_service(options: &AppOptions) -> Result<WorkflowService, ForgeError> {
    let gateway: Arc<dyn GitHubGateway> = Arc::new(GitHubClient::new(&options.github)?);
    info!("Using GitHub API at {}", options.github.api_base_url);

    Ok(WorkflowService::new(
        gateway,
        WorkflowRenderer::new(options.github.reusable_workflows.clone()),
        options.operation_timeout(),
    ))
}

/// Run Workflow Forge until `shutdown_signal` resolves or the server fails
pub async fn run(
    options: AppOptions,
    tokens: Arc<dyn AccessTokenProvider>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ForgeError> {
    info!("Initializing Workflow Forge...");

    let service = init_service(&options)?;

    // Cancelling stops the server and every in-flight publish
    let shutdown = CancellationToken::new();
    let state = Arc::new(ServerState::new(service, tokens, shutdown.clone()));

    let server_shutdown = shutdown.clone();
    let mut server_handle = serve(&options.server, state, async move {
        server_shutdown.cancelled().await;
    })
    .await?;

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
        result = &mut server_handle => {
            shutdown.cancel();
            let result = result.map_err(|e| ForgeError::ServerError(e.to_string()))?;
            if let Err(e) = &result {
                error!("HTTP server stopped: {}", e);
            }
            return result;
        }
    }

    shutdown.cancel();
    match tokio::time::timeout(options.max_shutdown_delay, server_handle).await {
        Ok(joined) => joined.map_err(|e| ForgeError::ServerError(e.to_string()))??,
        Err(_) => {
            error!(
                "Shutdown timed out after {:?}, forcing shutdown...",
                options.max_shutdown_delay
            );
            return Err(ForgeError::ServerError("shutdown timed out".to_string()));
        }
    }

    info!("Shutdown complete");
    Ok(())
}
