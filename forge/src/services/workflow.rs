//! Workflow operations exposed to the handler layer

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{ForgeError, GatewayError, ValidationError};
use crate::http::gateway::GitHubGateway;
use crate::models::request::{validate_workflow_name, DeploymentRequest};
use crate::models::workflow::{
    file_name_from_path, validate_workflow_path, PublishResult, UpdateWorkflowRequest,
    WorkflowContent, WorkflowFile, WORKFLOWS_DIR,
};
use crate::publish::{PublishPlan, Publisher};
use crate::template::WorkflowRenderer;

/// Generates, publishes and reads workflow files
#[derive(Clone)]
pub struct WorkflowService {
    gateway: Arc<dyn GitHubGateway>,
    renderer: WorkflowRenderer,
    publisher: Publisher,
}

impl WorkflowService {
    pub fn new(
        gateway: Arc<dyn GitHubGateway>,
        renderer: WorkflowRenderer,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            publisher: Publisher::new(gateway.clone(), operation_timeout),
            gateway,
            renderer,
        }
    }

    /// Validate the request and render its workflow YAML. No network access.
    pub fn generate_workflow(&self, request: &DeploymentRequest) -> Result<String, ForgeError> {
        request.validate()?;
        let yaml = self.renderer.render(request)?;
        debug!(
            "Generated {} workflow {} ({} bytes)",
            request.deployment_type,
            request.workflow_name,
            yaml.len()
        );
        Ok(yaml)
    }

    /// Commit `yaml` as `.github/workflows/{workflow_name}.yml` on a new branch
    /// and open a pull request for it
    pub async fn publish_workflow(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        workflow_name: &str,
        yaml: &str,
        cancel: &CancellationToken,
    ) -> Result<PublishResult, ForgeError> {
        require("owner", owner)?;
        require("repository", repo)?;
        validate_workflow_name(workflow_name)?;
        if yaml.is_empty() {
            return Err(ValidationError::MissingField("yaml").into());
        }

        let plan = PublishPlan::create(owner, repo, workflow_name, yaml);
        let result = self.publisher.publish(token, &plan, cancel).await?;
        info!("{}", result.message);
        Ok(result)
    }

    /// Generate the workflow for `request` and publish it
    pub async fn create_workflow(
        &self,
        token: &SecretString,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> Result<PublishResult, ForgeError> {
        let yaml = self.generate_workflow(request)?;
        self.publish_workflow(
            token,
            &request.owner,
            &request.repository,
            &request.workflow_name,
            &yaml,
            cancel,
        )
        .await
    }

    /// Replace an existing workflow file through a pull request. The request's
    /// SHA must match the file on the default branch.
    pub async fn update_workflow(
        &self,
        token: &SecretString,
        request: &UpdateWorkflowRequest,
        cancel: &CancellationToken,
    ) -> Result<PublishResult, ForgeError> {
        request.validate()?;

        let plan = PublishPlan::update(request);
        let result = self.publisher.publish(token, &plan, cancel).await?;
        info!("{}", result.message);
        Ok(result)
    }

    /// Workflow files in `.github/workflows`; a missing directory is an empty list
    pub async fn list_workflows(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<WorkflowFile>, ForgeError> {
        require("owner", owner)?;
        require("repository", repo)?;

        let entries = match self
            .gateway
            .list_directory(token, owner, repo, WORKFLOWS_DIR)
            .await
        {
            Ok(entries) => entries,
            Err(GatewayError::NotFound) => {
                debug!("{}/{} has no {} directory", owner, repo, WORKFLOWS_DIR);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .into_iter()
            .filter_map(WorkflowFile::from_entry)
            .collect())
    }

    /// Decoded content and blob SHA of one workflow file
    pub async fn get_workflow_content(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<WorkflowContent, ForgeError> {
        require("owner", owner)?;
        require("repository", repo)?;
        validate_workflow_path(path)?;

        let entry = self.gateway.get_file(token, owner, repo, path).await?;
        if !entry.is_file() {
            return Err(GatewayError::Decode(format!("'{}' is not a file", path)).into());
        }

        let content = decode_content(entry.encoding.as_deref(), entry.content.as_deref())?;
        let name = if entry.name.is_empty() {
            file_name_from_path(path)
        } else {
            entry.name
        };

        Ok(WorkflowContent {
            name,
            path: entry.path,
            sha: entry.sha,
            size: content.len(),
            content,
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// GitHub wraps base64 content at 60 columns
fn decode_content(encoding: Option<&str>, content: Option<&str>) -> Result<String, GatewayError> {
    match encoding {
        None | Some("base64") => {}
        Some(other) => {
            return Err(GatewayError::Decode(format!(
                "unsupported content encoding '{}'",
                other
            )));
        }
    }

    let raw: String = content
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = BASE64
        .decode(raw)
        .map_err(|e| GatewayError::Decode(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| GatewayError::Decode(format!("content is not utf-8: {}", e)))
}
