//! Finite State Machine for publishing a workflow through a pull request

use serde::{Deserialize, Serialize};

use crate::errors::PublishStep;

/// Publish state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    /// Nothing has been sent yet
    Idle,

    /// Repository exists, is reachable and has a default branch
    Verified,

    /// Commit SHA of the default branch is known
    BranchPointResolved,

    /// Working branch exists on GitHub
    BranchCreated,

    /// Workflow file committed on the working branch
    FileWritten,

    /// Terminal success
    PullRequestOpened,

    /// Terminal failure
    Failed,
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishState::PullRequestOpened | PublishState::Failed)
    }
}

/// Publish event
#[derive(Debug, Clone)]
pub enum PublishEvent {
    RepositoryVerified { default_branch: String },
    BaseResolved { sha: String },
    BranchCreated { branch: String },
    FileWritten,
    PullRequestOpened { number: u64 },
    StepFailed { step: PublishStep, reason: String },
}

/// Publish FSM. Transitions only move forward; there is no retry and no
/// rollback, so a failure after `BranchCreated` leaves the branch behind.
#[derive(Debug, Clone)]
pub struct PublishFsm {
    state: PublishState,
    default_branch: Option<String>,
    base_sha: Option<String>,
    branch: Option<String>,
    pull_request: Option<u64>,
    failure: Option<(PublishStep, String)>,
}

impl PublishFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: PublishState::Idle,
            default_branch: None,
            base_sha: None,
            branch: None,
            pull_request: None,
            failure: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> PublishState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|(_, reason)| reason.as_str())
    }

    /// Step the sequence failed at
    pub fn failed_step(&self) -> Option<PublishStep> {
        self.failure.as_ref().map(|(step, _)| *step)
    }

    pub fn default_branch(&self) -> Option<&str> {
        self.default_branch.as_deref()
    }

    pub fn base_sha(&self) -> Option<&str> {
        self.base_sha.as_deref()
    }

    /// Working branch, once created
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn pull_request(&self) -> Option<u64> {
        self.pull_request
    }

    /// Network step that moves the FSM out of its current state
    pub fn next_step(&self) -> Option<PublishStep> {
        match self.state {
            PublishState::Idle => Some(PublishStep::VerifyRepository),
            PublishState::Verified => Some(PublishStep::ResolveBaseSha),
            PublishState::BranchPointResolved => Some(PublishStep::CreateBranch),
            PublishState::BranchCreated => Some(PublishStep::WriteFile),
            PublishState::FileWritten => Some(PublishStep::OpenPullRequest),
            PublishState::PullRequestOpened | PublishState::Failed => None,
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PublishEvent) -> Result<(), String> {
        let new_state = match (self.state, event) {
            (PublishState::Idle, PublishEvent::RepositoryVerified { default_branch }) => {
                self.default_branch = Some(default_branch);
                PublishState::Verified
            }
            (PublishState::Verified, PublishEvent::BaseResolved { sha }) => {
                self.base_sha = Some(sha);
                PublishState::BranchPointResolved
            }
            (PublishState::BranchPointResolved, PublishEvent::BranchCreated { branch }) => {
                self.branch = Some(branch);
                PublishState::BranchCreated
            }
            (PublishState::BranchCreated, PublishEvent::FileWritten) => PublishState::FileWritten,
            (PublishState::FileWritten, PublishEvent::PullRequestOpened { number }) => {
                self.pull_request = Some(number);
                PublishState::PullRequestOpened
            }

            (state, PublishEvent::StepFailed { step, reason }) if !state.is_terminal() => {
                self.failure = Some((step, reason));
                PublishState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for PublishFsm {
    fn default() -> Self {
        Self::new()
    }
}
