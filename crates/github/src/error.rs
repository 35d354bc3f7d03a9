/// Errors from the GitHub REST layer.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// GitHub returned an unexpected status code.
    #[error("GitHub API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The branch to fork from does not exist.
    #[error("Could not find base branch '{branch}' in repo '{owner}/{repo}'")]
    BaseNotFound {
        owner: String,
        repo: String,
        branch: String,
    },

    #[error("GitHub PAT token is required to create branches")]
    MissingToken,
}
