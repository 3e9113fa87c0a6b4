//! GitHub gateway abstraction

use async_trait::async_trait;
use secrecy::SecretString;

use github_models::{ContentEntry, CreatePullRequest, PullRequest, PutContentRequest, Repository};

use crate::errors::GatewayError;

/// The GitHub REST operations publishing depends on.
///
/// Every call carries the caller's access token; implementations hold no
/// per-user state. Failures come back classified by HTTP status.
#[async_trait]
pub trait GitHubGateway: Send + Sync {
    /// `GET /repos/{owner}/{repo}`
    async fn get_repository(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<Repository, GatewayError>;

    /// Commit SHA at the tip of `branch`
    async fn get_branch_sha(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<String, GatewayError>;

    /// Create `refs/heads/{branch}` pointing at `sha`
    async fn create_branch(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), GatewayError>;

    /// Create or replace a file. `request.sha` must be the current blob SHA
    /// when replacing.
    async fn put_file(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        path: &str,
        request: &PutContentRequest,
    ) -> Result<(), GatewayError>;

    async fn create_pull_request(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        request: &CreatePullRequest,
    ) -> Result<PullRequest, GatewayError>;

    /// Entries of a directory on the default branch
    async fn list_directory(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, GatewayError>;

    /// A single file on the default branch, content still base64 encoded
    async fn get_file(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentEntry, GatewayError>;
}
