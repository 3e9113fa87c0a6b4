//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use tracing::{error, warn};

use forge_api::{
    ApiResponse, FileQuery, HealthResponse, PreviewResponse, VersionResponse,
    WorkflowListResponse,
};

use crate::errors::{ForgeError, ValidationError};
use crate::models::{DeploymentRequest, UpdateWorkflowRequest};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// User id assumed when the header is absent
pub const ANONYMOUS_USER: &str = "anonymous";

/// Error rendered as a failure envelope
#[derive(Debug)]
pub struct ApiError {
    message: &'static str,
    error: ForgeError,
}

impl ApiError {
    pub fn new(message: &'static str, error: impl Into<ForgeError>) -> Self {
        Self {
            message,
            error: error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        if status.is_server_error() {
            error!("{}: {}", self.message, self.error);
        } else {
            warn!("{}: {}", self.message, self.error);
        }

        let body = ApiResponse::<()>::failure(self.message, self.error.to_string());
        (status, Json(body)).into_response()
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "workflow-forge".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Render a workflow without publishing it
pub async fn preview_handler(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<DeploymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|e| invalid_body("Failed to generate workflow", e))?;

    let yaml = state
        .service
        .generate_workflow(&request)
        .map_err(|e| ApiError::new("Failed to generate workflow", e))?;

    Ok(Json(ApiResponse::ok(
        "Workflow generated successfully",
        PreviewResponse {
            workflow_name: request.workflow_name,
            deployment_type: request.deployment_type.to_string(),
            yaml_content: yaml,
        },
    )))
}

/// Render a workflow and open a pull request adding it
pub async fn create_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Json<DeploymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    const MESSAGE: &str = "Failed to create workflow";

    let Json(request) = body.map_err(|e| invalid_body(MESSAGE, e))?;
    let token = access_token(&state, &headers, MESSAGE).await?;
    let cancel = state.shutdown.child_token();

    let result = state
        .service
        .create_workflow(&token, &request, &cancel)
        .await
        .map_err(|e| ApiError::new(MESSAGE, e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Workflow created successfully", result)),
    ))
}

/// List workflow files of a repository
pub async fn list_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    const MESSAGE: &str = "Failed to list workflows";

    let token = access_token(&state, &headers, MESSAGE).await?;
    let workflows = state
        .service
        .list_workflows(&token, &owner, &repo)
        .await
        .map_err(|e| ApiError::new(MESSAGE, e))?;

    let count = workflows.len();
    Ok(Json(ApiResponse::ok(
        format!("Successfully retrieved {} workflow(s)", count),
        WorkflowListResponse {
            owner,
            repository: repo,
            workflows,
            count,
        },
    )))
}

/// Read one workflow file
pub async fn get_file_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path((owner, repo)): Path<(String, String)>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    const MESSAGE: &str = "Failed to get workflow content";

    let Query(query) = query
        .map_err(|e| ApiError::new(MESSAGE, ForgeError::InvalidRequest(e.body_text())))?;

    let token = access_token(&state, &headers, MESSAGE).await?;
    let content = state
        .service
        .get_workflow_content(&token, &owner, &repo, &query.path)
        .await
        .map_err(|e| ApiError::new(MESSAGE, e))?;

    Ok(Json(ApiResponse::ok(
        "Workflow content retrieved successfully",
        content,
    )))
}

/// Replace a workflow file through a pull request
pub async fn update_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path((owner, repo)): Path<(String, String)>,
    body: Result<Json<UpdateWorkflowRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    const MESSAGE: &str = "Failed to update workflow";

    let Json(request) = body.map_err(|e| invalid_body(MESSAGE, e))?;
    if request.owner != owner || request.repository != repo {
        return Err(ApiError::new(MESSAGE, ValidationError::PathMismatch));
    }

    let token = access_token(&state, &headers, MESSAGE).await?;
    let cancel = state.shutdown.child_token();

    let result = state
        .service
        .update_workflow(&token, &request, &cancel)
        .await
        .map_err(|e| ApiError::new(MESSAGE, e))?;

    Ok(Json(ApiResponse::ok("Workflow updated successfully", result)))
}

/// `X-User-Id`, or the anonymous user when absent.
///
/// The header is taken on trust and selects whose GitHub token is used, so the
/// API must only be reachable locally (the default host is `127.0.0.1`). Put an
/// authenticating proxy in front before binding any other address.
pub fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

async fn access_token(
    state: &ServerState,
    headers: &HeaderMap,
    message: &'static str,
) -> Result<SecretString, ApiError> {
    state
        .tokens
        .access_token(&user_id(headers))
        .await
        .map_err(|e| ApiError::new(message, e))
}

fn invalid_body(message: &'static str, rejection: JsonRejection) -> ApiError {
    ApiError::new(message, ForgeError::InvalidRequest(rejection.body_text()))
}
