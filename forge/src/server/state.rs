//! Server state

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::authn::AccessTokenProvider;
use crate::services::WorkflowService;

/// Server state shared across handlers
pub struct ServerState {
    pub service: WorkflowService,
    pub tokens: Arc<dyn AccessTokenProvider>,
    /// Cancelled on shutdown; every publish runs under a child token
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(
        service: WorkflowService,
        tokens: Arc<dyn AccessTokenProvider>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            tokens,
            shutdown,
        }
    }
}
