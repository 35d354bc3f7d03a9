//! Git references API (`/repos/{owner}/{repo}/git/...`).

use branchout_core::secret::Secret;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::GitHubError;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = concat!("branchout/", env!("CARGO_PKG_VERSION"));

/// HTTP client for one GitHub API host, authenticated with a personal
/// access token.
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: Secret,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

/// What [`GitHubClient::create_branch`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The branch was created at `sha`.
    Created { sha: String },
    /// The branch was already there; nothing was changed.
    AlreadyExists,
}

impl GitHubClient {
    /// Create a client for `api_url`, e.g. `https://api.github.com` or a
    /// GitHub Enterprise `https://host/api/v3`.
    pub fn new(api_url: impl Into<String>, token: Secret) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>, token: Secret) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Whether `refs/heads/{branch}` exists.
    ///
    /// Only a 404 counts as absent; any other non-200 status is an error
    /// so a failed lookup never leads to a duplicate create attempt.
    pub async fn branch_exists(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<bool, GitHubError> {
        Ok(self.branch_sha(owner, repo, branch).await?.is_some())
    }

    /// Head commit of `branch`, or `None` if the branch does not exist.
    pub async fn branch_sha(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubError> {
        let url = format!("{}/repos/{owner}/{repo}/git/ref/heads/{branch}", self.api_url);
        let response = self.client.get(&url).headers(self.headers()).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let git_ref: GitRef = response.json().await?;
                Ok(Some(git_ref.object.sha))
            }
            status => Err(GitHubError::ApiError {
                status: status.as_u16(),
                body: body_text(response).await,
            }),
        }
    }

    /// Create `new_branch` from the head of `base_branch`.
    ///
    /// Skips creation when `new_branch` already exists. A missing base
    /// branch is [`GitHubError::BaseNotFound`].
    pub async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        base_branch: &str,
        new_branch: &str,
    ) -> Result<BranchOutcome, GitHubError> {
        if self.token.is_empty() {
            return Err(GitHubError::MissingToken);
        }

        if self.branch_exists(owner, repo, new_branch).await? {
            tracing::info!(branch = new_branch, "GitHub branch already exists, skipping creation");
            return Ok(BranchOutcome::AlreadyExists);
        }

        tracing::info!(branch = base_branch, "Retrieving base branch SHA");
        let Some(sha) = self.branch_sha(owner, repo, base_branch).await? else {
            tracing::error!(branch = base_branch, owner, repo, "Base branch not found");
            return Err(GitHubError::BaseNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
                branch: base_branch.to_string(),
            });
        };
        tracing::info!(branch = base_branch, sha = %sha, "Found base SHA");

        tracing::info!(branch = new_branch, base = base_branch, "Creating GitHub branch");
        let response = self
            .client
            .post(format!("{}/repos/{owner}/{repo}/git/refs", self.api_url))
            .headers(self.headers())
            .json(&CreateRefRequest {
                reference: format!("refs/heads/{new_branch}"),
                sha: &sha,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response).await;
            tracing::error!(status = status.as_u16(), body = %body, "Error creating GitHub branch");
            return Err(GitHubError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(branch = new_branch, "GitHub branch created");
        Ok(BranchOutcome::Created { sha })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Ok(mut auth) = HeaderValue::from_str(&format!("Bearer {}", self.token.expose())) {
            auth.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, auth);
        }
        headers
    }
}

async fn body_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}
