//! GitHub REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use github_models::{
    ApiErrorBody, ContentEntry, CreatePullRequest, CreateRefRequest, GitRef, PullRequest,
    PutContentRequest, PutContentResponse, Repository,
};

use crate::errors::{ForgeError, GatewayError};
use crate::http::gateway::GitHubGateway;
use crate::storage::settings::GitHubSettings;
use crate::utils::truncate;

/// Media type GitHub recommends for REST calls
pub const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Longest error body kept in errors and logs
const MAX_ERROR_BODY: usize = 512;

/// reqwest-backed [`GitHubGateway`]
pub struct GitHubClient {
    client: Client,
    base_url: Url,
}

impl GitHubClient {
    /// Create a new client. Every request gets the API version and media type
    /// headers plus the configured timeout.
    pub fn new(settings: &GitHubSettings) -> Result<Self, ForgeError> {
        let base_url = parse_base_url(&settings.api_base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_str(&settings.api_version).map_err(|e| {
                ForgeError::ConfigError(format!("invalid api version '{}': {}", settings.api_version, e))
            })?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| ForgeError::ConfigError(format!("failed to build http client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL. Segments containing `/` are split
    /// so repository file paths can be passed whole; each part is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(
                segments
                    .iter()
                    .flat_map(|segment| segment.split('/'))
                    .filter(|part| !part.is_empty()),
            );
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, token: &SecretString) -> Result<T, GatewayError> {
        debug!("GET {}", url);
        let response = self.send(self.client.get(url), token).await?;
        Ok(response.json().await?)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: Url,
        token: &SecretString,
        body: &B,
    ) -> Result<T, GatewayError> {
        debug!("POST {}", url);
        let response = self.send(self.client.post(url).json(body), token).await?;
        Ok(response.json().await?)
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        url: Url,
        token: &SecretString,
        body: &B,
    ) -> Result<T, GatewayError> {
        debug!("PUT {}", url);
        let response = self.send(self.client.put(url).json(body), token).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, request: RequestBuilder, token: &SecretString) -> Result<Response, GatewayError> {
        let response = request
            .header(header::AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        error!(
            "GitHub request {} failed: {} - {}",
            url,
            status,
            truncate(&body, MAX_ERROR_BODY)
        );
        Err(error_from_status(status, &body))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ForgeError> {
    let url = Url::parse(raw)
        .map_err(|e| ForgeError::ConfigError(format!("invalid api base url '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ForgeError::ConfigError(format!(
            "api base url must be an http(s) url, got '{}'",
            raw
        )));
    }
    Ok(url)
}

/// Classify a non-success response. Conflict and unprocessable errors keep
/// GitHub's message so callers can tell stale SHAs from other rejections.
pub fn error_from_status(status: StatusCode, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|parsed| parsed.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| truncate(body, MAX_ERROR_BODY));

    match status {
        StatusCode::UNAUTHORIZED => GatewayError::Unauthorized,
        StatusCode::FORBIDDEN => GatewayError::Forbidden,
        StatusCode::NOT_FOUND => GatewayError::NotFound,
        StatusCode::CONFLICT => GatewayError::Conflict(message),
        StatusCode::UNPROCESSABLE_ENTITY => GatewayError::Unprocessable(message),
        _ => GatewayError::ApiFailed {
            status: status.as_u16(),
            body: truncate(body, MAX_ERROR_BODY),
        },
    }
}

#[async_trait]
impl GitHubGateway for GitHubClient {
    async fn get_repository(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<Repository, GatewayError> {
        let url = self.endpoint(&["repos", owner, repo])?;
        self.get(url, token).await
    }

    async fn get_branch_sha(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<String, GatewayError> {
        let url = self.endpoint(&["repos", owner, repo, "git", "refs", "heads", branch])?;
        let git_ref: GitRef = self.get(url, token).await?;
        Ok(git_ref.object.sha)
    }

    async fn create_branch(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["repos", owner, repo, "git", "refs"])?;
        let body = CreateRefRequest {
            reference: format!("refs/heads/{}", branch),
            sha: sha.to_string(),
        };
        let _: GitRef = self.post(url, token, &body).await?;
        Ok(())
    }

    async fn put_file(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        path: &str,
        request: &PutContentRequest,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["repos", owner, repo, "contents", path])?;
        let _: PutContentResponse = self.put(url, token, request).await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        request: &CreatePullRequest,
    ) -> Result<PullRequest, GatewayError> {
        let url = self.endpoint(&["repos", owner, repo, "pulls"])?;
        self.post(url, token, request).await
    }

    async fn list_directory(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, GatewayError> {
        let url = self.endpoint(&["repos", owner, repo, "contents", path])?;
        self.get(url, token).await
    }

    async fn get_file(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentEntry, GatewayError> {
        let url = self.endpoint(&["repos", owner, repo, "contents", path])?;
        self.get(url, token).await
    }
}
