//! Published workflow models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use github_models::ContentEntry;

use crate::errors::ValidationError;
use crate::models::request::validate_workflow_name;

/// Directory GitHub Actions reads workflows from
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// Outcome of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub owner: String,
    pub repository: String,
    pub workflow_name: String,
    pub file_path: String,
    /// HTML URL of the opened pull request
    pub file_url: String,
    pub pull_request_number: u64,
    pub branch: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Workflow file found in a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowFile {
    pub name: String,
    pub path: String,
    pub sha: String,
    pub size: u64,
    pub url: String,
    pub download_url: String,
}

impl WorkflowFile {
    /// Only regular files ending in `.yml` or `.yaml` are workflows
    pub fn from_entry(entry: ContentEntry) -> Option<Self> {
        if !entry.is_file() || !has_workflow_extension(&entry.name) {
            return None;
        }

        Some(Self {
            name: entry.name,
            path: entry.path,
            sha: entry.sha,
            size: entry.size,
            url: entry.html_url.unwrap_or_default(),
            download_url: entry.download_url.unwrap_or_default(),
        })
    }
}

/// Decoded content of a workflow file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContent {
    pub name: String,
    pub path: String,
    /// Blob SHA, required to update the file later
    pub sha: String,
    pub size: usize,
    pub content: String,
}

/// Replace an existing workflow file through a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowRequest {
    pub owner: String,
    pub repository: String,
    pub file_path: String,
    pub content: String,
    /// Blob SHA the caller last read; a stale value fails the update
    pub sha: String,
    #[serde(default)]
    pub commit_message: Option<String>,
}

impl UpdateWorkflowRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner.trim().is_empty() {
            return Err(ValidationError::MissingField("owner"));
        }
        if self.repository.trim().is_empty() {
            return Err(ValidationError::MissingField("repository"));
        }
        validate_workflow_path(&self.file_path)?;
        // The file name becomes part of the update branch name
        validate_workflow_name(&self.workflow_name())?;
        if self.content.is_empty() {
            return Err(ValidationError::MissingField("content"));
        }
        if self.sha.trim().is_empty() {
            return Err(ValidationError::MissingField("sha"));
        }
        Ok(())
    }

    /// File name without its `.yml`/`.yaml` extension
    pub fn workflow_name(&self) -> String {
        workflow_name_from_path(&self.file_path)
    }

    /// Commit message, falling back to `Update workflow: {name}`
    pub fn commit_message(&self) -> String {
        match self.commit_message.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => format!("Update workflow: {}", self.workflow_name()),
        }
    }
}

pub fn has_workflow_extension(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

/// Reject anything that is not a YAML file under `.github/workflows/`
pub fn validate_workflow_path(path: &str) -> Result<(), ValidationError> {
    let Some(rest) = path.strip_prefix(".github/workflows/") else {
        return Err(ValidationError::InvalidWorkflowPath(path.to_string()));
    };

    if rest
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        || path.contains('\\')
    {
        return Err(ValidationError::InvalidWorkflowPath(path.to_string()));
    }

    if !has_workflow_extension(path) {
        return Err(ValidationError::InvalidWorkflowExtension(path.to_string()));
    }

    Ok(())
}

/// `.github/workflows/deploy.yml` -> `deploy`
pub fn workflow_name_from_path(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name
        .strip_suffix(".yml")
        .or_else(|| file_name.strip_suffix(".yaml"))
        .unwrap_or(file_name)
        .to_string()
}

/// Last path segment
pub fn file_name_from_path(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
