//! Error types for Workflow Forge

use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Malformed user input, always detected before any network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("workflow name must be 1-255 characters and contain only alphanumeric characters, hyphens, and underscores")]
    InvalidWorkflowName,

    #[error("deployment type must be either 'ec2' or 'kubernetes'")]
    InvalidDeploymentType,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid owner '{0}': must contain only alphanumeric characters and hyphens")]
    InvalidOwner(String),

    #[error("invalid repository name '{0}': must contain only alphanumeric characters, hyphens, underscores, and periods")]
    InvalidRepositoryName(String),

    #[error("at least one project is required")]
    ProjectsRequired,

    #[error("ec2CommonFields is required for EC2 deployment type")]
    Ec2CommonFieldsRequired,

    #[error("ec2Projects is required for EC2 deployment type")]
    Ec2ProjectsRequired,

    #[error("kubernetesCommonFields is required for Kubernetes deployment type")]
    KubernetesCommonFieldsRequired,

    #[error("kubernetesProjects is required for Kubernetes deployment type")]
    KubernetesProjectsRequired,

    #[error("invalid workflow file path '{0}': must be in .github/workflows/")]
    InvalidWorkflowPath(String),

    #[error("invalid workflow file '{0}': must be a .yml or .yaml file")]
    InvalidWorkflowExtension(String),

    #[error("path parameters must match request body")]
    PathMismatch,
}

/// Internal renderer defect, never the caller's fault
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("failed to generate workflow template '{template}': {reason}")]
    TemplateGenerationFailed {
        template: &'static str,
        reason: String,
    },
}

/// Failure reported by the GitHub gateway, classified by HTTP status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("unauthorized: invalid or expired token")]
    Unauthorized,

    #[error("forbidden: insufficient permissions")]
    Forbidden,

    #[error("not found: resource does not exist or no access")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable request: {0}")]
    Unprocessable(String),

    #[error("github api request failed with status {status}: {body}")]
    ApiFailed { status: u16, body: String },

    #[error("github api request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode github response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Step of the publishing sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    VerifyRepository,
    ResolveDefaultBranch,
    ResolveBaseSha,
    CreateBranch,
    WriteFile,
    OpenPullRequest,
}

impl PublishStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStep::VerifyRepository => "verify_repository",
            PublishStep::ResolveDefaultBranch => "resolve_default_branch",
            PublishStep::ResolveBaseSha => "resolve_base_sha",
            PublishStep::CreateBranch => "create_branch",
            PublishStep::WriteFile => "write_file",
            PublishStep::OpenPullRequest => "open_pull_request",
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a publish step failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishErrorKind {
    #[error("repository '{0}' not found or you don't have access to it")]
    RepositoryNotFound(String),

    #[error("unauthorized: invalid or expired token")]
    Unauthorized,

    #[error("insufficient permissions to access repository '{0}'")]
    Forbidden(String),

    #[error("repository has no default branch")]
    MissingDefaultBranch,

    #[error("repository '{0}' is empty: push an initial commit to its default branch first")]
    EmptyRepository(String),

    #[error("branch '{0}' already exists")]
    BranchAlreadyExists(String),

    #[error("workflow file '{0}' already exists in repository")]
    WorkflowAlreadyExists(String),

    #[error("workflow file '{0}' was changed upstream: reload it and retry with the current sha")]
    Conflict(String),

    #[error("'{0}' not found, or the token lacks the 'workflow' scope")]
    NotFoundOrMissingScope(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out")]
    TimedOut,

    #[error(transparent)]
    Gateway(GatewayError),
}

/// Publishing failure enriched with the step it happened at
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("publish failed at {step}: {kind}")]
pub struct PublishError {
    pub step: PublishStep,
    pub kind: PublishErrorKind,
    /// Branch left behind by the failed sequence, if one was created
    pub branch: Option<String>,
}

impl PublishError {
    pub fn new(step: PublishStep, kind: PublishErrorKind) -> Self {
        Self {
            step,
            kind,
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }
}

/// Main error type for Workflow Forge
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Publish(#[from] PublishError),

    #[error("GitHub error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Access token not found for user '{0}'. Please login again.")]
    TokenNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ForgeError {
    fn from(err: anyhow::Error) -> Self {
        ForgeError::Internal(err.to_string())
    }
}

impl ForgeError {
    /// HTTP status the handler layer reports for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ForgeError::Validation(_) | ForgeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ForgeError::TokenNotFound(_) => StatusCode::UNAUTHORIZED,
            ForgeError::Gateway(err) => gateway_status(err),
            ForgeError::Publish(err) => match &err.kind {
                PublishErrorKind::RepositoryNotFound(_)
                | PublishErrorKind::NotFoundOrMissingScope(_) => StatusCode::NOT_FOUND,
                PublishErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                PublishErrorKind::Forbidden(_) => StatusCode::FORBIDDEN,
                PublishErrorKind::EmptyRepository(_) | PublishErrorKind::MissingDefaultBranch => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PublishErrorKind::BranchAlreadyExists(_)
                | PublishErrorKind::WorkflowAlreadyExists(_)
                | PublishErrorKind::Conflict(_) => StatusCode::CONFLICT,
                PublishErrorKind::TimedOut => StatusCode::GATEWAY_TIMEOUT,
                // nginx's "client closed request"
                PublishErrorKind::Cancelled => {
                    StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
                }
                PublishErrorKind::Gateway(err) => gateway_status(err),
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
        GatewayError::Forbidden => StatusCode::FORBIDDEN,
        GatewayError::NotFound => StatusCode::NOT_FOUND,
        GatewayError::Conflict(_) => StatusCode::CONFLICT,
        GatewayError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::ApiFailed { .. }
        | GatewayError::Transport(_)
        | GatewayError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}
