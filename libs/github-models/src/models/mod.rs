//! GitHub REST API models

use serde::{Deserialize, Serialize};

/// Repository owner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default, rename = "type")]
    pub owner_type: String,
}

/// Repository metadata (`GET /repos/{owner}/{repo}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: String,
    /// Empty when the API omits it
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub owner: Owner,
}

/// Object a git reference points to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefObject {
    pub sha: String,
    #[serde(default, rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub url: String,
}

/// Git reference (`GET /repos/{owner}/{repo}/git/refs/heads/{branch}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub url: String,
    pub object: RefObject,
}

/// Body of `POST /repos/{owner}/{repo}/git/refs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: String,
}

/// Entry of the contents API, either a directory listing item or a single file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub git_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl ContentEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == "file"
    }
}

/// Body of `PUT /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutContentRequest {
    pub message: String,
    /// Base64 encoded file content
    pub content: String,
    pub branch: String,
    /// Blob SHA of the file being replaced, required for updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Commit summary returned by the contents API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Response of `PUT /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutContentResponse {
    #[serde(default)]
    pub content: Option<ContentEntry>,
    #[serde(default)]
    pub commit: Option<CommitSummary>,
}

/// Body of `POST /repos/{owner}/{repo}/pulls`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Branch tip of a pull request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub sha: String,
}

/// Pull request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub id: i64,
    pub number: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub head: PullRequestRef,
    #[serde(default)]
    pub base: PullRequestRef,
}

/// Error body returned by the GitHub API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default)]
    pub documentation_url: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}
