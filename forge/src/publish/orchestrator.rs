//! Publishing a workflow file as a pull request
//!
//! The sequence is strictly serial: verify the repository, resolve its default
//! branch and tip commit, branch off it, commit the file and open the pull
//! request. Each step is attributed in the error when it fails.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use github_models::{CreatePullRequest, PutContentRequest};

use crate::errors::{GatewayError, PublishError, PublishErrorKind, PublishStep};
use crate::http::gateway::GitHubGateway;
use crate::models::request::workflow_file_path;
use crate::models::workflow::{workflow_name_from_path, PublishResult, UpdateWorkflowRequest};
use crate::publish::fsm::{PublishEvent, PublishFsm};
use crate::utils::unix_timestamp;

/// Default budget of a whole publish sequence
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Whether the file is new or replaces an existing one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishMode {
    Create,
    Update {
        /// Blob SHA the caller last read
        sha: String,
        commit_message: String,
    },
}

/// Everything needed to publish one workflow file
#[derive(Debug, Clone)]
pub struct PublishPlan {
    pub owner: String,
    pub repository: String,
    pub workflow_name: String,
    pub file_path: String,
    pub content: String,
    pub mode: PublishMode,
}

impl PublishPlan {
    /// New file at `.github/workflows/{workflow_name}.yml`
    pub fn create(
        owner: impl Into<String>,
        repository: impl Into<String>,
        workflow_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let workflow_name = workflow_name.into();
        Self {
            owner: owner.into(),
            repository: repository.into(),
            file_path: workflow_file_path(&workflow_name),
            workflow_name,
            content: content.into(),
            mode: PublishMode::Create,
        }
    }

    /// Replacement of an existing file
    pub fn update(request: &UpdateWorkflowRequest) -> Self {
        Self {
            owner: request.owner.clone(),
            repository: request.repository.clone(),
            workflow_name: workflow_name_from_path(&request.file_path),
            file_path: request.file_path.clone(),
            content: request.content.clone(),
            mode: PublishMode::Update {
                sha: request.sha.clone(),
                commit_message: request.commit_message(),
            },
        }
    }

    pub fn repo_full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    /// `workflow/{name}-{ts}` or `update-workflow/{name}-{ts}`
    pub fn branch_name(&self, timestamp: i64) -> String {
        let prefix = match self.mode {
            PublishMode::Create => "workflow",
            PublishMode::Update { .. } => "update-workflow",
        };
        format!("{}/{}-{}", prefix, self.workflow_name, timestamp)
    }

    pub fn commit_message(&self) -> String {
        match &self.mode {
            PublishMode::Create => format!("Add workflow: {}", self.workflow_name),
            PublishMode::Update { commit_message, .. } => commit_message.clone(),
        }
    }

    /// Fixed per mode; a caller's commit message never becomes the title
    pub fn pull_request_title(&self) -> String {
        match self.mode {
            PublishMode::Create => format!("Add workflow: {}", self.workflow_name),
            PublishMode::Update { .. } => format!("Update workflow: {}", self.workflow_name),
        }
    }

    pub fn pull_request_body(&self) -> String {
        match self.mode {
            PublishMode::Create => format!(
                "This PR adds the GitHub Actions workflow for `{}`.\n\nGenerated automatically by Workflow Forge.",
                self.workflow_name
            ),
            PublishMode::Update { .. } => format!(
                "This PR updates the GitHub Actions workflow `{}`.\n\nUpdated automatically by Workflow Forge.",
                self.workflow_name
            ),
        }
    }

    pub fn result_message(&self, pull_request_number: u64) -> String {
        match self.mode {
            PublishMode::Create => format!(
                "Pull request #{} created for workflow '{}'",
                pull_request_number, self.workflow_name
            ),
            PublishMode::Update { .. } => format!(
                "Pull request #{} created for workflow '{}' update",
                pull_request_number, self.workflow_name
            ),
        }
    }

    fn file_sha(&self) -> Option<String> {
        match &self.mode {
            PublishMode::Create => None,
            PublishMode::Update { sha, .. } => Some(sha.clone()),
        }
    }

    /// Map a gateway failure to what it means at `step`
    pub fn classify(&self, step: PublishStep, branch: &str, err: GatewayError) -> PublishErrorKind {
        match (step, err) {
            (_, GatewayError::Unauthorized) => PublishErrorKind::Unauthorized,
            (_, GatewayError::Forbidden) => PublishErrorKind::Forbidden(self.repo_full_name()),

            (PublishStep::VerifyRepository, GatewayError::NotFound) => {
                PublishErrorKind::RepositoryNotFound(self.repo_full_name())
            }

            // The repository was just verified, so a missing ref means no
            // commits. GitHub answers 409 "Git Repository is empty." for the same.
            (PublishStep::ResolveBaseSha, GatewayError::NotFound | GatewayError::Conflict(_)) => {
                PublishErrorKind::EmptyRepository(self.repo_full_name())
            }

            // GitHub also answers 422 for malformed ref names
            (PublishStep::CreateBranch, GatewayError::Unprocessable(message))
                if message.contains("already exists") =>
            {
                PublishErrorKind::BranchAlreadyExists(branch.to_string())
            }

            (PublishStep::WriteFile, GatewayError::NotFound) => {
                PublishErrorKind::NotFoundOrMissingScope(self.file_path.clone())
            }
            (PublishStep::WriteFile, GatewayError::Conflict(_)) => {
                PublishErrorKind::Conflict(self.file_path.clone())
            }
            (PublishStep::WriteFile, GatewayError::Unprocessable(message))
                if message.contains("sha") =>
            {
                match self.mode {
                    PublishMode::Create => {
                        PublishErrorKind::WorkflowAlreadyExists(self.file_path.clone())
                    }
                    PublishMode::Update { .. } => PublishErrorKind::Conflict(self.file_path.clone()),
                }
            }

            (_, err) => PublishErrorKind::Gateway(err),
        }
    }
}

/// Runs publish sequences against a [`GitHubGateway`]
#[derive(Clone)]
pub struct Publisher {
    gateway: Arc<dyn GitHubGateway>,
    operation_timeout: Duration,
}

impl Publisher {
    pub fn new(gateway: Arc<dyn GitHubGateway>, operation_timeout: Duration) -> Self {
        Self {
            gateway,
            operation_timeout,
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Run the whole sequence within the operation budget. Cancelling `cancel`
    /// aborts the in-flight call and skips the remaining steps.
    pub async fn publish(
        &self,
        token: &SecretString,
        plan: &PublishPlan,
        cancel: &CancellationToken,
    ) -> Result<PublishResult, PublishError> {
        let branch = plan.branch_name(unix_timestamp());
        let mut fsm = PublishFsm::new();

        info!(
            owner = %plan.owner,
            repository = %plan.repository,
            file_path = %plan.file_path,
            branch = %branch,
            "Publishing workflow {}", plan.workflow_name
        );

        let outcome = tokio::time::timeout(
            self.operation_timeout,
            self.run(token, plan, &branch, cancel, &mut fsm),
        )
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                let step = fsm.next_step().unwrap_or(PublishStep::OpenPullRequest);
                Err(fail(&mut fsm, plan, step, PublishErrorKind::TimedOut))
            }
        }
    }

    async fn run(
        &self,
        token: &SecretString,
        plan: &PublishPlan,
        branch: &str,
        cancel: &CancellationToken,
        fsm: &mut PublishFsm,
    ) -> Result<PublishResult, PublishError> {
        let owner = plan.owner.as_str();
        let repo = plan.repository.as_str();

        let repository = self
            .call(
                fsm,
                plan,
                branch,
                PublishStep::VerifyRepository,
                cancel,
                self.gateway.get_repository(token, owner, repo),
            )
            .await?;

        check_cancel(fsm, plan, PublishStep::ResolveDefaultBranch, cancel)?;
        let default_branch = repository.default_branch;
        if default_branch.is_empty() {
            return Err(fail(
                fsm,
                plan,
                PublishStep::ResolveDefaultBranch,
                PublishErrorKind::MissingDefaultBranch,
            ));
        }
        advance(
            fsm,
            PublishEvent::RepositoryVerified {
                default_branch: default_branch.clone(),
            },
        );
        info!(owner, repository = repo, "Default branch is {}", default_branch);

        let base_sha = self
            .call(
                fsm,
                plan,
                branch,
                PublishStep::ResolveBaseSha,
                cancel,
                self.gateway
                    .get_branch_sha(token, owner, repo, &default_branch),
            )
            .await?;
        advance(fsm, PublishEvent::BaseResolved { sha: base_sha.clone() });

        self.call(
            fsm,
            plan,
            branch,
            PublishStep::CreateBranch,
            cancel,
            self.gateway
                .create_branch(token, owner, repo, branch, &base_sha),
        )
        .await?;
        advance(
            fsm,
            PublishEvent::BranchCreated {
                branch: branch.to_string(),
            },
        );
        info!(owner, repository = repo, branch, "Created branch from {}", base_sha);

        let put = PutContentRequest {
            message: plan.commit_message(),
            content: BASE64.encode(plan.content.as_bytes()),
            branch: branch.to_string(),
            sha: plan.file_sha(),
        };
        self.call(
            fsm,
            plan,
            branch,
            PublishStep::WriteFile,
            cancel,
            self.gateway
                .put_file(token, owner, repo, &plan.file_path, &put),
        )
        .await?;
        advance(fsm, PublishEvent::FileWritten);
        info!(owner, repository = repo, branch, "Committed {}", plan.file_path);

        let pull_request = CreatePullRequest {
            title: plan.pull_request_title(),
            body: plan.pull_request_body(),
            head: branch.to_string(),
            base: default_branch,
        };
        let opened = self
            .call(
                fsm,
                plan,
                branch,
                PublishStep::OpenPullRequest,
                cancel,
                self.gateway
                    .create_pull_request(token, owner, repo, &pull_request),
            )
            .await?;
        advance(
            fsm,
            PublishEvent::PullRequestOpened {
                number: opened.number,
            },
        );
        info!(owner, repository = repo, branch, "Opened pull request #{}", opened.number);

        Ok(PublishResult {
            owner: plan.owner.clone(),
            repository: plan.repository.clone(),
            workflow_name: plan.workflow_name.clone(),
            file_path: plan.file_path.clone(),
            file_url: opened.html_url,
            pull_request_number: opened.number,
            branch: branch.to_string(),
            message: plan.result_message(opened.number),
            created_at: Utc::now(),
        })
    }

    /// Run one gateway call as `step`, racing it against cancellation
    async fn call<T, F>(
        &self,
        fsm: &mut PublishFsm,
        plan: &PublishPlan,
        branch: &str,
        step: PublishStep,
        cancel: &CancellationToken,
        request: F,
    ) -> Result<T, PublishError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        check_cancel(fsm, plan, step, cancel)?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(fail(fsm, plan, step, PublishErrorKind::Cancelled));
            }
            result = request => result,
        };

        result.map_err(|err| {
            let kind = plan.classify(step, branch, err);
            fail(fsm, plan, step, kind)
        })
    }
}

fn check_cancel(
    fsm: &mut PublishFsm,
    plan: &PublishPlan,
    step: PublishStep,
    cancel: &CancellationToken,
) -> Result<(), PublishError> {
    if cancel.is_cancelled() {
        return Err(fail(fsm, plan, step, PublishErrorKind::Cancelled));
    }
    Ok(())
}

fn advance(fsm: &mut PublishFsm, event: PublishEvent) {
    if let Err(e) = fsm.process(event) {
        warn!("Publish state machine rejected event: {}", e);
    }
}

/// Move the FSM to `Failed` and build the error reported to the caller
fn fail(
    fsm: &mut PublishFsm,
    plan: &PublishPlan,
    step: PublishStep,
    kind: PublishErrorKind,
) -> PublishError {
    advance(
        fsm,
        PublishEvent::StepFailed {
            step,
            reason: kind.to_string(),
        },
    );

    let branch = fsm.branch().map(str::to_string);
    error!(
        owner = %plan.owner,
        repository = %plan.repository,
        step = %step,
        branch = branch.as_deref().unwrap_or("-"),
        "Failed to publish workflow {}: {}", plan.workflow_name, kind
    );

    PublishError::new(step, kind).with_branch(branch)
}
