//! Forge HTTP API models

use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Envelope wrapping every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying data
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Failed response with an error description
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Workflow preview response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub workflow_name: String,
    pub deployment_type: String,
    pub yaml_content: String,
}

/// Workflow list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowListResponse<T> {
    pub owner: String,
    pub repository: String,
    pub workflows: Vec<T>,
    pub count: usize,
}

/// Query string of the workflow file endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileQuery {
    pub path: String,
}
